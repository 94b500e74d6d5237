//! Configuration resolution for the build driver.
//!
//! `BuildOptions` is the raw, type-checked option bag as the command line (or a test)
//! supplies it. Nothing outside this module consumes it: `finalizer::resolve_build_plan`
//! normalizes and validates it into the immutable `BuildPlan`.
//!
//! # Module Structure
//!
//! - `validator`: Per-option precondition checks (paths, parallelism, defines, targets)
//! - `finalizer`: Normalization passes followed by validation, producing the `BuildPlan`

pub mod finalizer;
pub mod validator;

pub use finalizer::{normalize_options, resolve_build_plan};

use crate::error::ConfigError;
use crate::models::{AndroidAbi, BuildVariant, Generator};
use crate::orchestrator::state::{Phase, PhaseRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw build options, as parsed from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    // Main options
    pub build_dir: Option<PathBuf>,
    pub source_dir: PathBuf,
    pub configs: Vec<BuildVariant>,
    pub update: bool,
    pub build: bool,
    pub test: bool,
    pub clean: bool,
    /// Explicit, ordered phase list; mutually exclusive with the individual phase flags.
    pub phases: Vec<Phase>,
    pub skip_submodule_sync: bool,
    pub skip_tests: bool,
    /// 1 by default, 0 for all cores; negative values are rejected.
    pub parallel: i64,
    /// Raw `NAME=value` strings.
    pub cmake_extra_defines: Vec<String>,

    // Test options
    pub enable_unit_tests: bool,
    pub onnxruntime_lib_dir: Option<PathBuf>,

    // Windows cross-compile options
    pub arm: bool,
    pub arm64: bool,
    pub arm64ec: bool,
    pub x86: bool,

    // Android options
    pub android: bool,
    pub android_abi: AndroidAbi,
    pub android_api: i64,
    pub android_home: Option<PathBuf>,
    pub android_ndk_path: Option<PathBuf>,

    // Apple options
    pub build_apple_framework: bool,
    pub ios: bool,
    pub ios_sysroot: String,
    pub ios_toolchain_file: Option<PathBuf>,
    pub xcode_code_signing_team_id: String,
    pub xcode_code_signing_identity: String,
    pub use_xcode: bool,
    pub osx_arch: Option<String>,
    pub apple_deploy_target: Option<String>,

    // WebAssembly options
    pub build_wasm: bool,
    pub build_wasm_static_lib: bool,
    pub enable_wasm_simd: bool,
    pub enable_wasm_threads: bool,
    pub disable_wasm_exception_catching: bool,
    pub enable_wasm_exception_throwing_override: bool,
    pub enable_wasm_debug_info: bool,
    pub emsdk_version: String,
    pub emscripten_settings: Vec<String>,

    // Tools
    pub cmake_path: PathBuf,
    /// Empty or absent runs the test binaries directly.
    pub ctest_path: Option<PathBuf>,
    pub cmake_generator: Option<Generator>,
    pub python: Option<PathBuf>,

    // Binary size reduction
    pub include_ops_by_config: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            build_dir: None,
            source_dir: PathBuf::from("."),
            configs: vec![BuildVariant::Debug],
            update: false,
            build: false,
            test: false,
            clean: false,
            phases: Vec::new(),
            skip_submodule_sync: false,
            skip_tests: false,
            parallel: 1,
            cmake_extra_defines: Vec::new(),
            enable_unit_tests: false,
            onnxruntime_lib_dir: None,
            arm: false,
            arm64: false,
            arm64ec: false,
            x86: false,
            android: false,
            android_abi: AndroidAbi::Arm64V8a,
            android_api: 27,
            android_home: None,
            android_ndk_path: None,
            build_apple_framework: false,
            ios: false,
            ios_sysroot: String::new(),
            ios_toolchain_file: None,
            xcode_code_signing_team_id: String::new(),
            xcode_code_signing_identity: String::new(),
            use_xcode: false,
            osx_arch: None,
            apple_deploy_target: None,
            build_wasm: false,
            build_wasm_static_lib: false,
            enable_wasm_simd: false,
            enable_wasm_threads: false,
            disable_wasm_exception_catching: false,
            enable_wasm_exception_throwing_override: false,
            enable_wasm_debug_info: false,
            emsdk_version: "3.1.19".to_string(),
            emscripten_settings: Vec::new(),
            cmake_path: PathBuf::from("cmake"),
            ctest_path: Some(PathBuf::from("ctest")),
            cmake_generator: None,
            python: None,
            include_ops_by_config: None,
        }
    }
}

impl BuildOptions {
    /// Cross-compile target flags that are set, by option name.
    pub fn cross_compile_flags(&self) -> Vec<&'static str> {
        [
            ("android", self.android),
            ("ios", self.ios),
            ("arm", self.arm),
            ("arm64", self.arm64),
            ("arm64ec", self.arm64ec),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// The phase selection, from either the individual flags or the ordered `phases` list.
    ///
    /// Flags are taken in pipeline order; the list is passed on as given so the scheduler can
    /// refuse a bad order.
    pub fn phase_request(&self) -> Result<PhaseRequest, ConfigError> {
        let flagged: Vec<Phase> = [
            (Phase::Update, self.update),
            (Phase::Clean, self.clean),
            (Phase::Build, self.build),
            (Phase::Test, self.test),
        ]
        .into_iter()
        .filter_map(|(phase, set)| set.then_some(phase))
        .collect();

        if !flagged.is_empty() && !self.phases.is_empty() {
            let mut options: Vec<&str> = flagged.iter().map(Phase::as_str).collect();
            options.push("phases");
            return Err(ConfigError::conflict(
                &options,
                "select phases either with the individual flags or with --phases, not both",
            ));
        }

        let explicit = if self.phases.is_empty() {
            flagged
        } else {
            self.phases.clone()
        };
        Ok(PhaseRequest::explicit(explicit).skip_tests(self.skip_tests))
    }
}
