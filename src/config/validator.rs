//! Option validation.
//!
//! Every check here is either pure or a read-only existence check on a supplied path.

use crate::error::ConfigError;
use crate::models::{Define, Parallelism};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve a supplied path that must exist and be a directory.
///
/// Symlinks are followed, so the returned path is canonical.
pub fn validate_existing_dir(option: &str, path: &Path) -> Result<PathBuf, ConfigError> {
    let resolved = fs::canonicalize(path)
        .map_err(|e| ConfigError::invalid_path(option, path, format!("cannot be resolved ({})", e)))?;
    if !resolved.is_dir() {
        return Err(ConfigError::invalid_path(option, path, "must be a directory"));
    }
    Ok(resolved)
}

/// Resolve a supplied path that must exist and be a regular file.
pub fn validate_existing_file(option: &str, path: &Path) -> Result<PathBuf, ConfigError> {
    let resolved = fs::canonicalize(path)
        .map_err(|e| ConfigError::invalid_path(option, path, format!("cannot be resolved ({})", e)))?;
    if !resolved.is_file() {
        return Err(ConfigError::invalid_path(option, path, "must be a file"));
    }
    Ok(resolved)
}

/// Anchor a path that may not exist yet to the current directory.
///
/// Tools run with their own working directory, so every path handed to them must be absolute.
pub fn absolute_path(option: &str, path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path)
        .map_err(|e| ConfigError::invalid_path(option, path, format!("cannot be made absolute ({})", e)))
}

/// Map the raw job count onto `Parallelism`.
///
/// Negative counts are rejected, 0 means every core, anything else is taken literally.
pub fn validate_parallelism(parallel: i64) -> Result<Parallelism, ConfigError> {
    match parallel {
        p if p < 0 => Err(ConfigError::invalid_value(
            "parallel",
            p,
            "job count cannot be negative",
        )),
        0 => Ok(Parallelism::AllCores),
        p => u32::try_from(p)
            .map(Parallelism::Jobs)
            .map_err(|_| ConfigError::invalid_value("parallel", p, "job count is too large")),
    }
}

/// Parse `NAME=value` strings, keeping their order.
pub fn validate_extra_defines(raw: &[String]) -> Result<Vec<Define>, ConfigError> {
    raw.iter()
        .map(|entry| {
            let define: Define = entry
                .parse()
                .map_err(|reason: String| ConfigError::invalid_value("cmake_extra_defines", entry, reason))?;
            if !define
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':')
            {
                return Err(ConfigError::invalid_value(
                    "cmake_extra_defines",
                    entry,
                    "name must be alphanumeric with '_', '-', '.' or ':' (optionally NAME:TYPE)",
                ));
            }
            Ok(define)
        })
        .collect()
}

/// At most one cross-compile target may be selected.
pub fn validate_single_cross_target(flags: &[&str]) -> Result<(), ConfigError> {
    if flags.len() > 1 {
        return Err(ConfigError::conflict(
            flags,
            "only one cross-compile target may be selected",
        ));
    }
    Ok(())
}

/// Unit tests need the prebuilt runtime library directory.
pub fn validate_unit_test_dir(lib_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let lib_dir = lib_dir.ok_or_else(|| {
        ConfigError::missing(
            "onnxruntime_lib_dir",
            "it must be specified if enable_unit_tests is set",
        )
    })?;
    validate_existing_dir("onnxruntime_lib_dir", lib_dir)
}

/// The iOS build needs all three of Xcode, sysroot and deployment target.
///
/// Every missing option is reported in one error.
pub fn validate_ios_requirements(
    use_xcode: bool,
    sysroot: &str,
    deploy_target: Option<&str>,
) -> Result<(), ConfigError> {
    let required = [
        ("use_xcode", use_xcode),
        ("ios_sysroot", !sysroot.trim().is_empty()),
        (
            "apple_deploy_target",
            deploy_target.map_or(false, |t| !t.trim().is_empty()),
        ),
    ];
    let missing: Vec<String> = required
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ConfigError::MissingOptions {
            context: "iOS build on macOS".to_string(),
            options: missing,
        });
    }
    Ok(())
}

/// SDK and NDK roots for an Android build, resolved against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidPaths {
    pub sdk_root: PathBuf,
    pub ndk_root: PathBuf,
    pub ndk_version: String,
    pub toolchain_file: PathBuf,
}

/// Both roots must be supplied and be directories; the NDK must carry its toolchain file.
pub fn validate_android_paths(
    sdk_root: Option<&Path>,
    ndk_root: Option<&Path>,
) -> Result<AndroidPaths, ConfigError> {
    let missing: Vec<String> = [("android_home", sdk_root), ("android_ndk_path", ndk_root)]
        .iter()
        .filter(|(_, path)| path.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    let (sdk_root, ndk_root) = match (sdk_root, ndk_root) {
        (Some(sdk), Some(ndk)) => (sdk, ndk),
        _ => {
            return Err(ConfigError::MissingOptions {
                context: "Android build".to_string(),
                options: missing,
            })
        }
    };

    let sdk_root = validate_existing_dir("android_home", sdk_root)?;
    let ndk_root = validate_existing_dir("android_ndk_path", ndk_root)?;

    let toolchain = ndk_root.join("build").join("cmake").join("android.toolchain.cmake");
    if !toolchain.is_file() {
        return Err(ConfigError::invalid_path(
            "android_ndk_path",
            &ndk_root,
            "NDK toolchain file build/cmake/android.toolchain.cmake not found",
        ));
    }

    let ndk_version = ndk_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ConfigError::invalid_path(
                "android_ndk_path",
                &ndk_root,
                "cannot infer the NDK version from the directory name",
            )
        })?;

    Ok(AndroidPaths {
        sdk_root,
        ndk_root,
        ndk_version,
        toolchain_file: toolchain,
    })
}

/// Android API level must be a positive number.
pub fn validate_android_api(api: i64) -> Result<u32, ConfigError> {
    u32::try_from(api)
        .ok()
        .filter(|level| *level > 0)
        .ok_or_else(|| ConfigError::invalid_value("android_api", api, "API level must be a positive number"))
}

/// macOS/iOS architecture selector.
pub fn validate_osx_arch(arch: &str) -> Result<(), ConfigError> {
    match arch {
        "arm64" | "arm64e" | "x86_64" => Ok(()),
        other => Err(ConfigError::invalid_value(
            "osx_arch",
            other,
            "expected one of arm64, arm64e, x86_64",
        )),
    }
}
