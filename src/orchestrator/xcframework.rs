//! Apple xcframework packaging.
//!
//! # Flow
//!
//! ```text
//! per platform:
//!   per arch:  configure (Xcode generator) → build
//!   assemble the platform framework (Headers, Info.plist) → lipo the arch libraries
//! copy public headers and framework_info.json to the output directory
//! xcodebuild -create-xcframework over every platform framework
//! ```
//!
//! `plan_xcframework` is pure; `execute_xcframework` performs the steps with a `ProcessRunner`.

use crate::error::{BuildError, ConfigError};
use crate::models::{BuildVariant, Define, HostOs, ToolInvocation};
use crate::orchestrator::executor::ProcessRunner;
use crate::system::{compose_environment, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FRAMEWORK_NAME: &str = "onnxruntime_extensions";

/// Platforms and the architectures each one can be built for.
pub const SUPPORTED_PLATFORM_ARCHS: &[(&str, &[&str])] = &[
    ("iphoneos", &["arm64"]),
    ("iphonesimulator", &["x86_64", "arm64"]),
];

/// How much of the package to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum XcframeworkTarget {
    /// Per-platform libraries only.
    Lib,
    /// Libraries and the xcframework.
    #[default]
    Xcframework,
    /// Only pack previously built libraries into the xcframework.
    PackXcframework,
}

/// Inputs of an xcframework build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcframeworkRequest {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: BuildVariant,
    pub deployment_target: String,
    /// (platform, arch) pairs; empty means every supported pair.
    pub platform_archs: Vec<(String, String)>,
    pub extra_defines: Vec<Define>,
    pub target: XcframeworkTarget,
    pub cmake: PathBuf,
}

impl XcframeworkRequest {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        XcframeworkRequest {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            config: BuildVariant::Debug,
            deployment_target: "11.0".to_string(),
            platform_archs: Vec::new(),
            extra_defines: Vec::new(),
            target: XcframeworkTarget::default(),
            cmake: PathBuf::from("cmake"),
        }
    }
}

/// One step of the packaging flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum XcframeworkStep {
    CreateDir(PathBuf),
    RemoveDir(PathBuf),
    Run(ToolInvocation),
    /// Fresh platform framework dir with Headers and Info.plist taken from one arch build.
    AssembleFramework {
        arch_framework: PathBuf,
        platform_framework: PathBuf,
    },
    /// Public headers and framework_info.json into the output directory.
    CopyPublicArtifacts {
        arch_framework: PathBuf,
        output_dir: PathBuf,
    },
}

impl fmt::Display for XcframeworkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XcframeworkStep::CreateDir(dir) => write!(f, "mkdir -p {}", dir.display()),
            XcframeworkStep::RemoveDir(dir) => write!(f, "rm -rf {}", dir.display()),
            XcframeworkStep::Run(inv) => write!(f, "{}", inv),
            XcframeworkStep::AssembleFramework {
                arch_framework,
                platform_framework,
            } => write!(
                f,
                "assemble {} from {}",
                platform_framework.display(),
                arch_framework.display()
            ),
            XcframeworkStep::CopyPublicArtifacts {
                arch_framework,
                output_dir,
            } => write!(
                f,
                "copy public headers from {} to {}",
                arch_framework.display(),
                output_dir.display()
            ),
        }
    }
}

/// Ordered packaging steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcframeworkPlan {
    pub steps: Vec<XcframeworkStep>,
    pub xcframework_dir: PathBuf,
}

/// Validate the requested pairs and lay out every step.
pub fn plan_xcframework(request: &XcframeworkRequest) -> Result<XcframeworkPlan, ConfigError> {
    let platform_archs = validate_platform_archs(&request.platform_archs)?;
    let intermediates = request.output_dir.join("intermediates");
    let framework_dir_name = format!("{}.framework", FRAMEWORK_NAME);

    let mut steps = vec![XcframeworkStep::CreateDir(intermediates.clone())];
    let mut platform_frameworks = Vec::new();
    let mut first_arch_framework: Option<PathBuf> = None;

    for (platform, archs) in &platform_archs {
        let platform_framework = intermediates.join(platform).join(&framework_dir_name);
        platform_frameworks.push(platform_framework.clone());

        if request.target == XcframeworkTarget::PackXcframework {
            continue;
        }

        let mut arch_frameworks = Vec::new();
        for arch in archs {
            let build_dir = intermediates
                .join(platform)
                .join(arch)
                .join(request.config.as_str());
            steps.push(XcframeworkStep::CreateDir(build_dir.clone()));
            steps.push(XcframeworkStep::Run(configure_invocation(
                request, platform, arch, &build_dir,
            )));
            steps.push(XcframeworkStep::Run(
                ToolInvocation::new(&request.cmake)
                    .arg("--build")
                    .arg(build_dir.to_string_lossy())
                    .arg(format!("--config={}", request.config))
                    .arg("--parallel"),
            ));
            arch_frameworks.push(build_dir.join("static_framework").join(&framework_dir_name));
        }

        let Some(first) = arch_frameworks.first().cloned() else {
            continue;
        };
        first_arch_framework.get_or_insert_with(|| first.clone());

        steps.push(XcframeworkStep::AssembleFramework {
            arch_framework: first,
            platform_framework: platform_framework.clone(),
        });
        steps.push(XcframeworkStep::Run(
            ToolInvocation::new("lipo")
                .args(["-create", "-output"])
                .arg(platform_framework.join(FRAMEWORK_NAME).to_string_lossy())
                .args(
                    arch_frameworks
                        .iter()
                        .map(|dir| dir.join(FRAMEWORK_NAME).to_string_lossy().into_owned()),
                ),
        ));
    }

    if let Some(arch_framework) = first_arch_framework {
        steps.push(XcframeworkStep::CopyPublicArtifacts {
            arch_framework,
            output_dir: request.output_dir.clone(),
        });
    }

    let xcframework_dir = request
        .output_dir
        .join(format!("{}.xcframework", FRAMEWORK_NAME));
    if request.target != XcframeworkTarget::Lib {
        steps.push(XcframeworkStep::RemoveDir(xcframework_dir.clone()));
        let mut create = ToolInvocation::new("xcrun")
            .args(["xcodebuild", "-create-xcframework", "-output"])
            .arg(xcframework_dir.to_string_lossy());
        for framework in &platform_frameworks {
            create = create.arg("-framework").arg(framework.to_string_lossy());
        }
        steps.push(XcframeworkStep::Run(create));
    }

    Ok(XcframeworkPlan {
        steps,
        xcframework_dir,
    })
}

/// Group pairs by platform in first-seen order, dropping duplicate archs.
fn validate_platform_archs(pairs: &[(String, String)]) -> Result<Vec<(String, Vec<String>)>, ConfigError> {
    if pairs.is_empty() {
        return Ok(SUPPORTED_PLATFORM_ARCHS
            .iter()
            .map(|(p, archs)| (p.to_string(), archs.iter().map(|a| a.to_string()).collect()))
            .collect());
    }

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (platform, arch) in pairs {
        let Some((_, supported)) = SUPPORTED_PLATFORM_ARCHS.iter().find(|(p, _)| *p == platform.as_str()) else {
            return Err(ConfigError::invalid_value(
                "platform_arch",
                platform,
                "supported platforms are iphoneos and iphonesimulator",
            ));
        };
        if !supported.contains(&arch.as_str()) {
            return Err(ConfigError::invalid_value(
                "platform_arch",
                format!("{} {}", platform, arch),
                format!("supported archs for {} are {}", platform, supported.join(", ")),
            ));
        }

        match grouped.iter_mut().find(|entry| entry.0 == *platform) {
            Some((_, archs)) if !archs.contains(arch) => archs.push(arch.clone()),
            Some(_) => {}
            None => grouped.push((platform.clone(), vec![arch.clone()])),
        }
    }
    Ok(grouped)
}

fn configure_invocation(
    request: &XcframeworkRequest,
    platform: &str,
    arch: &str,
    build_dir: &Path,
) -> ToolInvocation {
    let toolchain_name = if platform == "iphoneos" {
        "Toolchain-iPhoneOS_Xcode.cmake"
    } else {
        "Toolchain-iPhoneSimulator_Xcode.cmake"
    };
    let toolchain = request
        .source_dir
        .join("cmake")
        .join("externals")
        .join("opencv")
        .join("platforms")
        .join("ios")
        .join("cmake")
        .join("Toolchains")
        .join(toolchain_name);

    let defines = [
        Define::new("CMAKE_SYSTEM_NAME", "iOS"),
        Define::new("CMAKE_OSX_DEPLOYMENT_TARGET", request.deployment_target.clone()),
        Define::new("CMAKE_OSX_SYSROOT", platform),
        Define::new("CMAKE_OSX_ARCHITECTURES", arch),
        Define::switch("CMAKE_XCODE_ATTRIBUTE_CODE_SIGNING_ALLOWED", false),
        Define::switch("OCOS_BUILD_APPLE_FRAMEWORK", true),
        Define::new("CMAKE_TOOLCHAIN_FILE", toolchain.to_string_lossy().into_owned()),
        Define::new("IOS_ARCH", arch),
        Define::new("IPHONEOS_DEPLOYMENT_TARGET", request.deployment_target.clone()),
    ];

    ToolInvocation::new(&request.cmake)
        .arg("-G=Xcode")
        .arg(format!("-S={}", request.source_dir.display()))
        .arg(format!("-B={}", build_dir.display()))
        .args(request.extra_defines.iter().map(Define::to_arg))
        .args(defines.iter().map(Define::to_arg))
}

/// Perform every step in order, stopping at the first failure.
pub fn execute_xcframework(
    plan: &XcframeworkPlan,
    runner: &mut dyn ProcessRunner,
    ambient: &Environment,
) -> Result<(), BuildError> {
    for step in &plan.steps {
        log::info!("[Orchestrator] {}", step);
        match step {
            XcframeworkStep::CreateDir(dir) => fs::create_dir_all(dir)?,
            XcframeworkStep::RemoveDir(dir) => remove_dir_if_existing(dir)?,
            XcframeworkStep::Run(invocation) => {
                let env = compose_environment(ambient, &invocation.env, HostOs::MacOs);
                let result = runner.run(invocation, &env)?;
                if !result.success {
                    return Err(BuildError::InvocationFailed {
                        command: invocation.command_line(),
                        status: result
                            .exit_code
                            .map_or("termination by signal".to_string(), |c| format!("exit code {}", c)),
                    });
                }
            }
            XcframeworkStep::AssembleFramework {
                arch_framework,
                platform_framework,
            } => {
                remove_dir_if_existing(platform_framework)?;
                fs::create_dir_all(platform_framework)?;
                copy_dir(&arch_framework.join("Headers"), &platform_framework.join("Headers"))?;
                fs::copy(
                    arch_framework.join("Info.plist"),
                    platform_framework.join("Info.plist"),
                )?;
            }
            XcframeworkStep::CopyPublicArtifacts {
                arch_framework,
                output_dir,
            } => {
                let headers = output_dir.join("Headers");
                remove_dir_if_existing(&headers)?;
                copy_dir(&arch_framework.join("Headers"), &headers)?;
                // framework_info.json sits two levels above the arch framework
                if let Some(build_dir) = arch_framework.parent().and_then(Path::parent) {
                    fs::copy(
                        build_dir.join("framework_info.json"),
                        output_dir.join("framework_info.json"),
                    )?;
                }
            }
        }
    }
    log::info!("[Orchestrator] Packaged {}", plan.xcframework_dir.display());
    Ok(())
}

fn remove_dir_if_existing(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
