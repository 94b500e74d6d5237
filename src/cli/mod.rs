//! Command-line surface.
//!
//! `Cli` maps one-to-one onto `config::BuildOptions`; every decision about what the flags mean
//! is left to the resolver. Long flags keep the snake_case names existing build scripts pass.
//! Arguments of the form `@file` are expanded by `argfile::expand_args` before parsing.

pub mod argfile;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{validator, BuildOptions};
use crate::error::ConfigError;
use crate::models::{AndroidAbi, BuildVariant, Generator};
use crate::orchestrator::state::Phase;
use crate::orchestrator::xcframework::{XcframeworkRequest, XcframeworkTarget};

pub use argfile::{expand_args, utf8_args};

#[derive(Parser, Debug)]
#[command(
    name = "ortext-build",
    version,
    about = "Configure, build and test the extensions library for every supported platform",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub build: BuildArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the Apple static framework for each platform/arch and pack them into an xcframework
    Xcframework(XcframeworkArgs),
}

/// Flags of the main build pipeline.
#[derive(Args, Debug, Clone)]
#[command(rename_all = "snake_case")]
pub struct BuildArgs {
    /// Path to the build directory
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Root of the source tree
    #[arg(long, default_value = ".")]
    pub source_dir: PathBuf,

    /// Configuration(s) to build
    #[arg(long, num_args = 1.., default_values_t = [BuildVariant::Debug])]
    pub config: Vec<BuildVariant>,

    /// Update makefiles
    #[arg(long)]
    pub update: bool,

    /// Build
    #[arg(long)]
    pub build: bool,

    /// Run unit tests
    #[arg(long)]
    pub test: bool,

    /// Run the 'clean' target of the build tool
    #[arg(long)]
    pub clean: bool,

    /// Comma-separated phase list, in pipeline order
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["update", "build", "test", "clean"])]
    pub phases: Vec<Phase>,

    /// Skip 'git submodule update'
    #[arg(long)]
    pub skip_submodule_sync: bool,

    /// Skip all tests
    #[arg(long)]
    pub skip_tests: bool,

    /// Use parallel build. Optional value is the number of jobs; 0 or no value uses every core
    #[arg(long, num_args = 0..=1, default_value_t = 1, default_missing_value = "0", allow_negative_numbers = true)]
    pub parallel: i64,

    /// Extra definitions to pass to the configure step, as NAME=value
    #[arg(long, num_args = 1..)]
    pub cmake_extra_defines: Vec<String>,

    /// Build and run the unit tests
    #[arg(long)]
    pub enable_unit_tests: bool,

    /// Directory holding the runtime library the unit tests link against
    #[arg(long)]
    pub onnxruntime_lib_dir: Option<PathBuf>,

    /// Cross-compile for Windows ARM
    #[arg(long)]
    pub arm: bool,

    /// Cross-compile for Windows ARM64
    #[arg(long)]
    pub arm64: bool,

    /// Cross-compile for Windows ARM64EC
    #[arg(long)]
    pub arm64ec: bool,

    /// Build a 32-bit x86 library on Windows
    #[arg(long)]
    pub x86: bool,

    /// Build for Android
    #[arg(long)]
    pub android: bool,

    #[arg(long, default_value = "arm64-v8a")]
    pub android_abi: AndroidAbi,

    /// Android API level, e.g. 21
    #[arg(long, default_value_t = 27, allow_negative_numbers = true)]
    pub android_api: i64,

    /// Path to the Android SDK
    #[arg(long, env = "ANDROID_HOME")]
    pub android_home: Option<PathBuf>,

    /// Path to the Android NDK
    #[arg(long, env = "ANDROID_NDK_HOME")]
    pub android_ndk_path: Option<PathBuf>,

    /// Build a static library as an Apple framework
    #[arg(long)]
    pub build_apple_framework: bool,

    /// Build for iOS
    #[arg(long)]
    pub ios: bool,

    /// iOS sysroot: "iphoneos" or "iphonesimulator"
    #[arg(long, default_value = "")]
    pub ios_sysroot: String,

    /// Toolchain file for the iOS build
    #[arg(long)]
    pub ios_toolchain_file: Option<PathBuf>,

    /// Development team ID used for code signing
    #[arg(long, default_value = "")]
    pub xcode_code_signing_team_id: String,

    /// Code signing identity
    #[arg(long, default_value = "")]
    pub xcode_code_signing_identity: String,

    /// Use Xcode as the generator on macOS
    #[arg(long)]
    pub use_xcode: bool,

    /// Target architecture on macOS: x86_64 or arm64
    #[arg(long)]
    pub osx_arch: Option<String>,

    /// Minimum Apple OS version to deploy to
    #[arg(long)]
    pub apple_deploy_target: Option<String>,

    /// Build for WebAssembly
    #[arg(long)]
    pub build_wasm: bool,

    /// Build a static WebAssembly library
    #[arg(long)]
    pub build_wasm_static_lib: bool,

    #[arg(long)]
    pub enable_wasm_simd: bool,

    #[arg(long)]
    pub enable_wasm_threads: bool,

    #[arg(long)]
    pub disable_wasm_exception_catching: bool,

    /// Allow throwing exceptions even when catching is disabled
    #[arg(long)]
    pub enable_wasm_exception_throwing_override: bool,

    #[arg(long)]
    pub enable_wasm_debug_info: bool,

    /// Emscripten SDK version
    #[arg(long, default_value = "3.1.19")]
    pub emsdk_version: String,

    /// Extra emscripten settings, each KEY=VALUE
    #[arg(long, num_args = 1..)]
    pub emscripten_settings: Vec<String>,

    /// Path to the configure tool
    #[arg(long, default_value = "cmake")]
    pub cmake_path: PathBuf,

    /// Path to the test runner; empty runs the test binaries directly
    #[arg(long, default_value = "ctest")]
    pub ctest_path: PathBuf,

    /// Generator for the configure step
    #[arg(long)]
    pub cmake_generator: Option<Generator>,

    /// Python interpreter handed to the configure step and code generation
    #[arg(long)]
    pub python: Option<PathBuf>,

    /// Build only the operators listed in this config file
    #[arg(long)]
    pub include_ops_by_config: Option<PathBuf>,

    /// Print the commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Debug-level logging
    #[arg(long)]
    pub verbose: bool,

    /// Session log file (default: <build_dir>/logs/build_<timestamp>.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl BuildArgs {
    pub fn to_options(&self) -> BuildOptions {
        BuildOptions {
            build_dir: self.build_dir.clone(),
            source_dir: self.source_dir.clone(),
            configs: self.config.clone(),
            update: self.update,
            build: self.build,
            test: self.test,
            clean: self.clean,
            phases: self.phases.clone(),
            skip_submodule_sync: self.skip_submodule_sync,
            skip_tests: self.skip_tests,
            parallel: self.parallel,
            cmake_extra_defines: self.cmake_extra_defines.clone(),
            enable_unit_tests: self.enable_unit_tests,
            onnxruntime_lib_dir: self.onnxruntime_lib_dir.clone(),
            arm: self.arm,
            arm64: self.arm64,
            arm64ec: self.arm64ec,
            x86: self.x86,
            android: self.android,
            android_abi: self.android_abi,
            android_api: self.android_api,
            android_home: self.android_home.clone(),
            android_ndk_path: self.android_ndk_path.clone(),
            build_apple_framework: self.build_apple_framework,
            ios: self.ios,
            ios_sysroot: self.ios_sysroot.clone(),
            ios_toolchain_file: self.ios_toolchain_file.clone(),
            xcode_code_signing_team_id: self.xcode_code_signing_team_id.clone(),
            xcode_code_signing_identity: self.xcode_code_signing_identity.clone(),
            use_xcode: self.use_xcode,
            osx_arch: self.osx_arch.clone(),
            apple_deploy_target: self.apple_deploy_target.clone(),
            build_wasm: self.build_wasm,
            build_wasm_static_lib: self.build_wasm_static_lib,
            enable_wasm_simd: self.enable_wasm_simd,
            enable_wasm_threads: self.enable_wasm_threads,
            disable_wasm_exception_catching: self.disable_wasm_exception_catching,
            enable_wasm_exception_throwing_override: self.enable_wasm_exception_throwing_override,
            enable_wasm_debug_info: self.enable_wasm_debug_info,
            emsdk_version: self.emsdk_version.clone(),
            emscripten_settings: self.emscripten_settings.clone(),
            cmake_path: self.cmake_path.clone(),
            ctest_path: Some(self.ctest_path.clone()),
            cmake_generator: self.cmake_generator,
            python: self.python.clone(),
            include_ops_by_config: self.include_ops_by_config.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTargetArg {
    /// Per-platform libraries only
    #[value(name = "lib")]
    Lib,
    /// Libraries and the xcframework
    #[value(name = "xcframework")]
    Xcframework,
    /// Pack previously built libraries into the xcframework
    #[value(name = "pack_xcframework")]
    PackXcframework,
}

impl From<BuildTargetArg> for XcframeworkTarget {
    fn from(arg: BuildTargetArg) -> Self {
        match arg {
            BuildTargetArg::Lib => XcframeworkTarget::Lib,
            BuildTargetArg::Xcframework => XcframeworkTarget::Xcframework,
            BuildTargetArg::PackXcframework => XcframeworkTarget::PackXcframework,
        }
    }
}

/// Flags of the `xcframework` subcommand.
#[derive(Args, Debug, Clone)]
#[command(rename_all = "snake_case")]
pub struct XcframeworkArgs {
    /// Directory the framework and its intermediates are written to
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value = "xcframework")]
    pub build_target: BuildTargetArg,

    #[arg(long, default_value = "Debug")]
    pub config: BuildVariant,

    #[arg(long, default_value = "11.0")]
    pub ios_deployment_target: String,

    /// Platform and architecture pair, e.g. `--platform_arch iphonesimulator x86_64`. Repeatable
    #[arg(long, num_args = 2, value_names = ["PLATFORM", "ARCH"], action = clap::ArgAction::Append)]
    pub platform_arch: Vec<String>,

    /// Extra definitions to pass to the configure step, as NAME=value
    #[arg(long, num_args = 1..)]
    pub cmake_extra_defines: Vec<String>,

    #[arg(long, default_value = ".")]
    pub source_dir: PathBuf,

    #[arg(long, default_value = "cmake")]
    pub cmake_path: PathBuf,

    /// Print the steps instead of running them
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub verbose: bool,

    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl XcframeworkArgs {
    /// Relative directories are anchored at `cwd`.
    pub fn to_request(&self, cwd: &std::path::Path) -> Result<XcframeworkRequest, ConfigError> {
        let mut request = XcframeworkRequest::new(cwd.join(&self.source_dir), cwd.join(&self.output_dir));
        request.config = self.config;
        request.deployment_target = self.ios_deployment_target.clone();
        request.platform_archs = self
            .platform_arch
            .chunks(2)
            .filter_map(|pair| match pair {
                [platform, arch] => Some((platform.clone(), arch.clone())),
                _ => None,
            })
            .collect();
        request.extra_defines = validator::validate_extra_defines(&self.cmake_extra_defines)?;
        request.target = self.build_target.into();
        request.cmake = self.cmake_path.clone();
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Parallelism;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["ortext-build"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        let options = cli.build.to_options();
        assert_eq!(options.configs, vec![BuildVariant::Debug]);
        assert_eq!(options.parallel, 1);
        assert_eq!(options.android_api, 27);
        assert_eq!(options.emsdk_version, "3.1.19");
        assert_eq!(options.ctest_path, Some(PathBuf::from("ctest")));
    }

    #[test]
    fn test_parallel_forms() {
        assert_eq!(parse(&["--parallel"]).build.parallel, 0);
        assert_eq!(parse(&["--parallel", "8"]).build.parallel, 8);
        assert_eq!(parse(&["--parallel", "-2"]).build.parallel, -2);
        assert!(validator::validate_parallelism(parse(&["--parallel"]).build.parallel).is_ok());
        assert_eq!(
            validator::validate_parallelism(parse(&["--parallel", "8"]).build.parallel).unwrap(),
            Parallelism::Jobs(8)
        );
    }

    #[test]
    fn test_multiple_configs_and_defines() {
        let cli = parse(&[
            "--config",
            "Release",
            "RelWithDebInfo",
            "--cmake_extra_defines",
            "A=1",
            "B=two",
            "--build",
        ]);
        let options = cli.build.to_options();
        assert_eq!(options.configs, vec![BuildVariant::Release, BuildVariant::RelWithDebInfo]);
        assert_eq!(options.cmake_extra_defines, vec!["A=1", "B=two"]);
        assert!(options.build);
    }

    #[test]
    fn test_phases_list() {
        let cli = parse(&["--phases", "update,build"]);
        assert_eq!(cli.build.phases, vec![Phase::Update, Phase::Build]);
        assert!(Cli::try_parse_from(["ortext-build", "--phases", "build", "--test"]).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["ortext-build", "--config", "Fast"]).is_err());
        assert!(Cli::try_parse_from(["ortext-build", "--android_abi", "mips"]).is_err());
        assert!(Cli::try_parse_from(["ortext-build", "--cmake_generator", "Unix Makefiles"]).is_err());
    }

    #[test]
    fn test_xcframework_subcommand() {
        let cli = parse(&[
            "xcframework",
            "out",
            "--platform_arch",
            "iphoneos",
            "arm64",
            "--platform_arch",
            "iphonesimulator",
            "x86_64",
            "--build_target",
            "pack_xcframework",
            "--config",
            "Release",
        ]);
        let Some(Command::Xcframework(args)) = cli.command else {
            panic!("expected the xcframework subcommand");
        };
        let request = args.to_request(std::path::Path::new("/work")).unwrap();
        assert_eq!(request.output_dir, PathBuf::from("/work/out"));
        assert_eq!(request.config, BuildVariant::Release);
        assert_eq!(request.target, XcframeworkTarget::PackXcframework);
        assert_eq!(
            request.platform_archs,
            vec![
                ("iphoneos".to_string(), "arm64".to_string()),
                ("iphonesimulator".to_string(), "x86_64".to_string()),
            ]
        );
    }
}
