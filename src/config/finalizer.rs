//! Build plan finalizer - the single point where raw options become a `BuildPlan`.
//!
//! # Flow
//!
//! ```text
//! BuildOptions + HostInfo
//!         ↓
//!  normalize_options()        (implicit enablement, defaults that depend on other options)
//!         ↓
//!  1. Select the target platform (at most one cross-compile target)
//!  2. Derive the build directory
//!  3. Unit-test precondition
//!  4. Apple / iOS precondition
//!  5. Android precondition
//!  6. Parallelism, extra defines, generator, tool paths
//!         ↓
//!  BuildPlan (immutable)
//! ```
//!
//! Normalization always runs before validation, so validation sees a fully normalized
//! option set.

use super::validator;
use super::BuildOptions;
use crate::error::ConfigError;
use crate::models::{
    AndroidToolchain, AppleSettings, BuildPlan, BuildVariant, Generator, HostInfo, HostOs,
    IosToolchain, TargetPlatform, ToolPaths, WasmFeatures,
};
use std::path::{Path, PathBuf};

/// Apply the implicit cross-option defaults.
///
/// - A static-library WebAssembly build implies the general WebAssembly build.
/// - The Windows generator defaults to Visual Studio 2022 when none was requested.
/// - `osx_arch` defaults to the host machine architecture.
/// - An empty test-runner path means "run test binaries directly".
pub fn normalize_options(options: &BuildOptions, host: &HostInfo) -> BuildOptions {
    let mut normalized = options.clone();

    if normalized.build_wasm_static_lib && !normalized.build_wasm {
        log::debug!("[Resolver] build_wasm_static_lib implies build_wasm");
        normalized.build_wasm = true;
    }

    if host.os == HostOs::Windows && normalized.cmake_generator.is_none() {
        normalized.cmake_generator = Some(Generator::VisualStudio2022);
    }

    if normalized.osx_arch.is_none() {
        let arch = if host.machine == "arm64" || host.machine == "aarch64" {
            "arm64"
        } else {
            "x86_64"
        };
        normalized.osx_arch = Some(arch.to_string());
    }

    if normalized
        .ctest_path
        .as_ref()
        .map_or(false, |p| p.as_os_str().is_empty())
    {
        normalized.ctest_path = None;
    }

    normalized
}

/// Resolve raw options into a validated, immutable `BuildPlan`.
///
/// Performs no I/O other than read-only existence checks on supplied paths. Build and
/// source directories come back absolute, anchored to the current directory.
pub fn resolve_build_plan(options: &BuildOptions, host: &HostInfo) -> Result<BuildPlan, ConfigError> {
    let options = normalize_options(options, host);

    // =========================================================================
    // STEP 1: Target platform
    // =========================================================================
    let target = select_target(&options)?;
    log::debug!("[Resolver] Target platform: {}", target);

    // =========================================================================
    // STEP 2: Build directory
    // =========================================================================
    let build_dir = options
        .build_dir
        .clone()
        .unwrap_or_else(|| default_build_dir(host.os, target));
    let build_dir = validator::absolute_path("build_dir", &build_dir)?;
    let source_dir = validator::absolute_path("source_dir", &options.source_dir)?;

    // =========================================================================
    // STEP 3: Unit tests
    // =========================================================================
    let unit_test_lib_dir = if options.enable_unit_tests {
        Some(validator::validate_unit_test_dir(
            options.onnxruntime_lib_dir.as_deref(),
        )?)
    } else {
        None
    };

    // =========================================================================
    // STEP 4: Apple / iOS
    // =========================================================================
    let ios = if target == TargetPlatform::Ios {
        Some(resolve_ios(&options)?)
    } else {
        None
    };

    let generator = resolve_generator(&options, host)?;
    let osx_arch = options.osx_arch.clone().unwrap_or_default();
    validator::validate_osx_arch(&osx_arch)?;

    let apple = AppleSettings {
        osx_arch,
        build_framework: options.build_apple_framework,
        code_signing_team_id: non_empty(&options.xcode_code_signing_team_id),
        code_signing_identity: non_empty(&options.xcode_code_signing_identity),
    };

    // =========================================================================
    // STEP 5: Android
    // =========================================================================
    let android = if target == TargetPlatform::Android {
        let paths = validator::validate_android_paths(
            options.android_home.as_deref(),
            options.android_ndk_path.as_deref(),
        )?;
        let api_level = validator::validate_android_api(options.android_api)?;
        log::debug!(
            "[Resolver] Android NDK {} (API {}, ABI {})",
            paths.ndk_version,
            api_level,
            options.android_abi
        );
        Some(AndroidToolchain {
            sdk_root: paths.sdk_root,
            ndk_root: paths.ndk_root,
            ndk_version: paths.ndk_version,
            toolchain_file: paths.toolchain_file,
            api_level,
            abi: options.android_abi,
        })
    } else {
        None
    };

    // =========================================================================
    // STEP 6: Parallelism, defines, reduced-ops config, tools
    // =========================================================================
    let parallelism = validator::validate_parallelism(options.parallel)?;
    let extra_defines = validator::validate_extra_defines(&options.cmake_extra_defines)?;

    let selected_ops_config = options
        .include_ops_by_config
        .as_deref()
        .map(|path| validator::validate_existing_file("include_ops_by_config", path))
        .transpose()?;

    let wasm = if options.build_wasm {
        Some(WasmFeatures {
            static_lib: options.build_wasm_static_lib,
            simd: options.enable_wasm_simd,
            threads: options.enable_wasm_threads,
            exception_catching: !options.disable_wasm_exception_catching,
            exception_throwing: options.enable_wasm_exception_throwing_override,
            debug_info: options.enable_wasm_debug_info,
            emsdk_version: options.emsdk_version.clone(),
            emscripten_settings: options.emscripten_settings.clone(),
        })
    } else {
        None
    };

    let tools = ToolPaths {
        cmake: options.cmake_path.clone(),
        ctest: options.ctest_path.clone(),
        python: options
            .python
            .clone()
            .unwrap_or_else(|| default_python(host.os)),
        git: PathBuf::from("git"),
    };

    let plan = BuildPlan {
        host: host.clone(),
        target,
        variants: dedup_variants(&options.configs),
        source_dir,
        build_dir,
        generator,
        parallelism,
        extra_defines,
        unit_test_lib_dir,
        selected_ops_config,
        submodule_sync: !options.skip_submodule_sync,
        wasm,
        android,
        ios,
        apple,
        tools,
    };

    if let Ok(json) = serde_json::to_string_pretty(&plan) {
        log::debug!("[Resolver] Resolved build plan:\n{}", json);
    }
    Ok(plan)
}

/// Pick the one target platform the options describe.
fn select_target(options: &BuildOptions) -> Result<TargetPlatform, ConfigError> {
    let cross = options.cross_compile_flags();
    validator::validate_single_cross_target(&cross)?;

    let mut selected: Vec<&str> = cross.clone();
    if options.build_wasm {
        selected.push("build_wasm");
    }
    if options.x86 {
        selected.push("x86");
    }
    if selected.len() > 1 {
        return Err(ConfigError::conflict(
            &selected,
            "a build can only target one platform",
        ));
    }

    let target = match selected.first().copied() {
        Some("android") => TargetPlatform::Android,
        Some("ios") => TargetPlatform::Ios,
        Some("arm") => TargetPlatform::Arm,
        Some("arm64") => TargetPlatform::Arm64,
        Some("arm64ec") => TargetPlatform::Arm64Ec,
        Some("build_wasm") => TargetPlatform::WebAssembly,
        Some("x86") => TargetPlatform::X86,
        _ => TargetPlatform::Native,
    };
    Ok(target)
}

/// `build/<host>` natively, `build/<target>` when cross-compiling.
pub fn default_build_dir(host: HostOs, target: TargetPlatform) -> PathBuf {
    let subdir = target.default_build_subdir().unwrap_or(host.as_str());
    Path::new("build").join(subdir)
}

/// Generator requested by the operator, checked against the host.
fn resolve_generator(options: &BuildOptions, host: &HostInfo) -> Result<Option<Generator>, ConfigError> {
    let wants_xcode = options.use_xcode || options.cmake_generator == Some(Generator::Xcode);
    if wants_xcode && host.os != HostOs::MacOs {
        let option = if options.use_xcode {
            "use_xcode"
        } else {
            "cmake_generator"
        };
        return Err(ConfigError::conflict(
            &[option],
            format!("the Xcode generator is only supported on macOS, host is {}", host.os),
        ));
    }

    if options.use_xcode {
        return Ok(Some(Generator::Xcode));
    }

    if let Some(generator) = options.cmake_generator {
        if generator.is_visual_studio() && host.os != HostOs::Windows {
            return Err(ConfigError::conflict(
                &["cmake_generator"],
                format!("{} is only supported on Windows", generator),
            ));
        }
    }
    Ok(options.cmake_generator)
}

fn resolve_ios(options: &BuildOptions) -> Result<IosToolchain, ConfigError> {
    validator::validate_ios_requirements(
        options.use_xcode,
        &options.ios_sysroot,
        options.apple_deploy_target.as_deref(),
    )?;

    let toolchain = options.ios_toolchain_file.clone().unwrap_or_else(|| {
        options
            .source_dir
            .join("cmake")
            .join("ortext_ios.toolchain.cmake")
    });
    let toolchain_file = validator::validate_existing_file("ios_toolchain_file", &toolchain)?;

    Ok(IosToolchain {
        sysroot: options.ios_sysroot.clone(),
        deploy_target: options.apple_deploy_target.clone().unwrap_or_default(),
        toolchain_file,
    })
}

fn dedup_variants(configs: &[BuildVariant]) -> Vec<BuildVariant> {
    let mut variants = Vec::with_capacity(configs.len());
    for variant in configs {
        if !variants.contains(variant) {
            variants.push(*variant);
        }
    }
    if variants.is_empty() {
        variants.push(BuildVariant::Debug);
    }
    variants
}

fn default_python(host: HostOs) -> PathBuf {
    match host {
        HostOs::Windows => PathBuf::from("python"),
        HostOs::Linux | HostOs::MacOs => PathBuf::from("python3"),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
