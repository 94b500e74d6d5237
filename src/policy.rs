//! Platform/toolchain policy engine.
//!
//! The host OS × target platform decision table is data: `TOOLCHAIN_MATRIX` lists rules
//! keyed on (host, target), each contributing generator selectors, target defines,
//! environment additions, setup steps or a test veto. Every matching rule is applied in
//! table order, so repeated derivations from the same plan are byte-identical.

use crate::error::ConfigError;
use crate::models::{
    BuildPlan, Define, EnvOverride, Generator, HostOs, TargetPlatform, ToolInvocation,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the build tool behind the generated files takes a job count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildBackend {
    /// Visual Studio solutions built through MSBuild.
    MsBuild,
    /// Xcode projects.
    Xcode,
    /// Makefile / Ninja style backends.
    Native,
}

/// Job-count flags for one backend; `{jobs}` is replaced with the concrete count.
struct ParallelFlagRule {
    backend: BuildBackend,
    /// Arguments for the configure tool's own `--build` driver.
    driver_args: &'static [&'static str],
    /// Arguments forwarded to the native build tool after `--`.
    tool_args: &'static [&'static str],
}

static PARALLEL_FLAGS: &[ParallelFlagRule] = &[
    ParallelFlagRule {
        backend: BuildBackend::MsBuild,
        driver_args: &[],
        // nodeReuse keeps msbuild processes alive after the build otherwise
        tool_args: &["/maxcpucount:{jobs}", "/nodeReuse:False"],
    },
    ParallelFlagRule {
        backend: BuildBackend::Xcode,
        driver_args: &["--parallel", "{jobs}"],
        tool_args: &[],
    },
    ParallelFlagRule {
        backend: BuildBackend::Native,
        driver_args: &[],
        tool_args: &["-j{jobs}"],
    },
];

impl BuildBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildBackend::MsBuild => "msbuild",
            BuildBackend::Xcode => "xcode",
            BuildBackend::Native => "native",
        }
    }

    /// Build-driver and native-tool arguments for `jobs` parallel jobs.
    ///
    /// A single job adds nothing.
    pub fn parallel_args(&self, jobs: usize) -> (Vec<String>, Vec<String>) {
        if jobs == 1 {
            return (Vec::new(), Vec::new());
        }
        let expand = |templates: &[&str]| -> Vec<String> {
            templates
                .iter()
                .map(|t| t.replace("{jobs}", &jobs.to_string()))
                .collect()
        };
        PARALLEL_FLAGS
            .iter()
            .find(|rule| rule.backend == *self)
            .map(|rule| (expand(rule.driver_args), expand(rule.tool_args)))
            .unwrap_or_default()
    }
}

/// Hosts a matrix rule applies to.
#[derive(Debug, Clone, Copy)]
pub enum HostMatch {
    Any,
    Only(HostOs),
    AnyOf(&'static [HostOs]),
}

impl HostMatch {
    fn matches(&self, host: HostOs) -> bool {
        match self {
            HostMatch::Any => true,
            HostMatch::Only(os) => *os == host,
            HostMatch::AnyOf(list) => list.contains(&host),
        }
    }
}

/// Targets a matrix rule applies to.
#[derive(Debug, Clone, Copy)]
pub enum TargetMatch {
    Any,
    Only(TargetPlatform),
    AnyOf(&'static [TargetPlatform]),
}

impl TargetMatch {
    fn matches(&self, target: TargetPlatform) -> bool {
        match self {
            TargetMatch::Any => true,
            TargetMatch::Only(t) => *t == target,
            TargetMatch::AnyOf(list) => list.contains(&target),
        }
    }
}

type RuleFn = fn(&BuildPlan, &mut ToolchainPolicy) -> Result<(), ConfigError>;

/// One row of the decision table.
pub struct MatrixRule {
    pub name: &'static str,
    pub host: HostMatch,
    pub target: TargetMatch,
    /// Generator-selection rules are exclusive: only the first matching one applies.
    pub selects_generator: bool,
    apply: RuleFn,
}

impl MatrixRule {
    pub fn matches(&self, host: HostOs, target: TargetPlatform) -> bool {
        self.host.matches(host) && self.target.matches(target)
    }
}

const WINDOWS_ARM: &[TargetPlatform] = &[
    TargetPlatform::Arm,
    TargetPlatform::Arm64,
    TargetPlatform::Arm64Ec,
];
const NON_APPLE_HOSTS: &[HostOs] = &[HostOs::Windows, HostOs::Linux];

/// The host × target decision table.
pub static TOOLCHAIN_MATRIX: &[MatrixRule] = &[
    // Generator selection
    MatrixRule {
        name: "windows-wasm-ninja",
        host: HostMatch::Only(HostOs::Windows),
        target: TargetMatch::Only(TargetPlatform::WebAssembly),
        selects_generator: true,
        apply: force_ninja,
    },
    MatrixRule {
        name: "windows-android-ninja",
        host: HostMatch::Only(HostOs::Windows),
        target: TargetMatch::Only(TargetPlatform::Android),
        selects_generator: true,
        apply: force_ninja,
    },
    MatrixRule {
        name: "windows-arm-cross",
        host: HostMatch::Only(HostOs::Windows),
        target: TargetMatch::AnyOf(WINDOWS_ARM),
        selects_generator: true,
        apply: windows_arm,
    },
    MatrixRule {
        name: "windows-desktop",
        host: HostMatch::Only(HostOs::Windows),
        target: TargetMatch::Any,
        selects_generator: true,
        apply: windows_desktop,
    },
    MatrixRule {
        name: "macos-generator",
        host: HostMatch::Only(HostOs::MacOs),
        target: TargetMatch::Any,
        selects_generator: true,
        apply: explicit_generator,
    },
    MatrixRule {
        name: "linux-generator",
        host: HostMatch::Only(HostOs::Linux),
        target: TargetMatch::Any,
        selects_generator: true,
        apply: explicit_generator,
    },
    // Target-specific additions
    MatrixRule {
        name: "macos-foreign-arch",
        host: HostMatch::Only(HostOs::MacOs),
        target: TargetMatch::Only(TargetPlatform::Native),
        selects_generator: false,
        apply: macos_foreign_arch,
    },
    MatrixRule {
        name: "ios-requires-macos",
        host: HostMatch::AnyOf(NON_APPLE_HOSTS),
        target: TargetMatch::Only(TargetPlatform::Ios),
        selects_generator: false,
        apply: ios_requires_macos,
    },
    MatrixRule {
        name: "android-ndk",
        host: HostMatch::Any,
        target: TargetMatch::Only(TargetPlatform::Android),
        selects_generator: false,
        apply: android_ndk,
    },
    MatrixRule {
        name: "ios-toolchain",
        host: HostMatch::Only(HostOs::MacOs),
        target: TargetMatch::Only(TargetPlatform::Ios),
        selects_generator: false,
        apply: ios_toolchain,
    },
    MatrixRule {
        name: "wasm-emsdk",
        host: HostMatch::Any,
        target: TargetMatch::Only(TargetPlatform::WebAssembly),
        selects_generator: false,
        apply: wasm_emsdk,
    },
];

/// Everything the matrix derives from a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainPolicy {
    /// Generator actually used (after overrides).
    pub generator: Option<Generator>,
    pub backend: BuildBackend,
    /// `-G`/`-A`/`-T` selectors, appended after all defines.
    pub generator_args: Vec<String>,
    /// Defines contributed by the target rules.
    pub target_defines: Vec<Define>,
    /// Environment for the configure and build steps.
    pub environment: Vec<(String, EnvOverride)>,
    /// Invocations that must run before configuring.
    pub setup_steps: Vec<ToolInvocation>,
    /// Reason the test phase cannot run, if any.
    pub test_veto: Option<String>,
    /// Informational notes (e.g. generator overrides).
    pub notes: Vec<String>,
    pub applied_rules: Vec<String>,
}

impl ToolchainPolicy {
    fn new(plan: &BuildPlan) -> Self {
        ToolchainPolicy {
            generator: plan.generator(),
            backend: BuildBackend::Native,
            generator_args: Vec::new(),
            target_defines: Vec::new(),
            environment: Vec::new(),
            setup_steps: Vec::new(),
            test_veto: None,
            notes: Vec::new(),
            applied_rules: Vec::new(),
        }
    }

    fn select_generator(&mut self, generator: Generator) {
        self.generator = Some(generator);
        self.generator_args.push("-G".to_string());
        self.generator_args.push(generator.cmake_name().to_string());
    }

    /// Ordered configure-step arguments, without the per-variant build type.
    pub fn configure_args(&self, plan: &BuildPlan) -> Vec<String> {
        let mut args = vec![plan.source_dir().to_string_lossy().into_owned()];
        args.extend(feature_defines(plan).iter().map(Define::to_arg));
        args.extend(self.target_defines.iter().map(Define::to_arg));
        args.extend(plan.extra_defines().iter().map(Define::to_arg));
        args.extend(self.generator_args.iter().cloned());
        args
    }
}

/// Derive the toolchain policy for a resolved plan.
///
/// Fails only for host/target/generator combinations the driver cannot set up itself.
pub fn derive_toolchain_policy(plan: &BuildPlan) -> Result<ToolchainPolicy, ConfigError> {
    let host = plan.host().os;
    let target = plan.target();
    let mut policy = ToolchainPolicy::new(plan);
    let mut generator_selected = false;

    for rule in TOOLCHAIN_MATRIX.iter().filter(|r| r.matches(host, target)) {
        if rule.selects_generator {
            if generator_selected {
                continue;
            }
            generator_selected = true;
        }
        (rule.apply)(plan, &mut policy)?;
        policy.applied_rules.push(rule.name.to_string());
        log::debug!("[Matrix] Applied rule '{}' for {} → {}", rule.name, host, target);
    }

    policy.backend = match (host, policy.generator) {
        (HostOs::Windows, Some(g)) if g.is_visual_studio() => BuildBackend::MsBuild,
        (_, Some(Generator::Xcode)) => BuildBackend::Xcode,
        _ => BuildBackend::Native,
    };

    for note in &policy.notes {
        log::info!("[Matrix] {}", note);
    }
    Ok(policy)
}

/// Feature defines every configure step receives, in fixed order.
pub fn feature_defines(plan: &BuildPlan) -> Vec<Define> {
    let python = plan.tools().python.to_string_lossy().into_owned();
    let mut defines = vec![
        Define::new("Python_EXECUTABLE", python.clone()),
        Define::new("PYTHON_EXECUTABLE", python),
        Define::switch("OCOS_BUILD_APPLE_FRAMEWORK", plan.apple().build_framework),
        Define::switch("OCOS_CROSS_COMPILING", plan.target().is_windows_arm()),
        Define::switch("OCOS_ENABLE_SELECTED_OPLIST", plan.is_reduced_ops_build()),
    ];

    if let Some(lib_dir) = plan.unit_test_lib_dir() {
        defines.push(Define::switch("OCOS_ENABLE_CTEST", true));
        defines.push(Define::new(
            "ONNXRUNTIME_LIB_DIR",
            lib_dir.to_string_lossy().into_owned(),
        ));
    }

    if let Some(wasm) = plan.wasm() {
        defines.extend([
            Define::switch("OCOS_BUILD_WEBASSEMBLY", true),
            Define::switch("OCOS_BUILD_WEBASSEMBLY_STATIC_LIB", wasm.static_lib),
            Define::switch("OCOS_ENABLE_WEBASSEMBLY_EXCEPTION_CATCHING", wasm.exception_catching),
            Define::switch("OCOS_ENABLE_WEBASSEMBLY_EXCEPTION_THROWING", wasm.exception_throwing),
            Define::switch("OCOS_ENABLE_WEBASSEMBLY_THREADS", wasm.threads),
            Define::switch("OCOS_ENABLE_WEBASSEMBLY_DEBUG_INFO", wasm.debug_info),
            Define::switch("OCOS_ENABLE_WEBASSEMBLY_SIMD", wasm.simd),
        ]);
    }
    defines
}

/// Directory of the vendored WebAssembly SDK.
pub fn emsdk_dir(plan: &BuildPlan) -> PathBuf {
    plan.source_dir().join("cmake").join("external").join("emsdk")
}

// ============================================================================
// RULES
// ============================================================================

fn force_ninja(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    if let Some(requested) = plan.generator() {
        if requested != Generator::Ninja {
            policy.notes.push(format!(
                "Setting generator to Ninja (was '{}'), which is required when building for {} on Windows",
                requested,
                plan.target()
            ));
        }
    }
    policy.select_generator(Generator::Ninja);
    Ok(())
}

fn windows_arm(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    let generator = plan.generator().unwrap_or(Generator::VisualStudio2022);
    if generator == Generator::Ninja {
        return Err(ConfigError::conflict(
            &["cmake_generator", plan.target().as_str()],
            "to cross-compile with Ninja, load the toolset environment for the target processor \
             (e.g. Cross Tools Command Prompt for VS)",
        ));
    }

    let arch = match plan.target() {
        TargetPlatform::Arm => "ARM",
        TargetPlatform::Arm64 => "ARM64",
        _ => "ARM64EC",
    };
    policy.generator_args.extend(["-A".to_string(), arch.to_string()]);
    policy.select_generator(generator);
    policy.test_veto = Some(format!(
        "Cannot test on host build machine for cross-compiled {} builds",
        arch
    ));
    Ok(())
}

fn windows_desktop(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    let generator = plan.generator().unwrap_or(Generator::VisualStudio2022);
    let wants_32bit = plan.host().is_32bit() || plan.target() == TargetPlatform::X86;

    if generator == Generator::Ninja {
        if wants_32bit {
            let option = if plan.target() == TargetPlatform::X86 {
                "x86"
            } else {
                "cmake_generator"
            };
            return Err(ConfigError::conflict(
                &["cmake_generator", option],
                "to build 32-bit binaries with Ninja, load the toolset environment for the target processor \
                 (e.g. Cross Tools Command Prompt for VS)",
            ));
        }
        policy.select_generator(generator);
        return Ok(());
    }

    let arch = if wants_32bit { "Win32" } else { "x64" };
    policy.generator_args.extend([
        "-A".to_string(),
        arch.to_string(),
        "-T".to_string(),
        "host=x64".to_string(),
    ]);
    policy.select_generator(generator);
    Ok(())
}

fn explicit_generator(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    if let Some(generator) = plan.generator() {
        policy.select_generator(generator);
    }
    Ok(())
}

fn macos_foreign_arch(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    let host_is_arm = matches!(plan.host().machine.as_str(), "arm64" | "aarch64");
    let target_is_arm = plan.apple().osx_arch.starts_with("arm64");
    if host_is_arm != target_is_arm {
        policy.test_veto = Some(format!(
            "Cannot test {} build on {} host",
            plan.apple().osx_arch,
            plan.host().machine
        ));
    }
    Ok(())
}

fn ios_requires_macos(plan: &BuildPlan, _policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    Err(ConfigError::conflict(
        &["ios"],
        format!("iOS builds require a macOS host, host is {}", plan.host().os),
    ))
}

fn android_ndk(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    let Some(android) = plan.android() else {
        return Err(ConfigError::missing("android_ndk_path", "required to build for Android"));
    };

    policy.target_defines.extend([
        Define::switch("OCOS_BUILD_ANDROID", true),
        Define::new(
            "CMAKE_TOOLCHAIN_FILE",
            android.toolchain_file.to_string_lossy().into_owned(),
        ),
        Define::new("ANDROID_NDK_VERSION", android.ndk_version.clone()),
        Define::new("ANDROID_PLATFORM", format!("android-{}", android.api_level)),
        Define::new("ANDROID_ABI", android.abi.as_str()),
    ]);
    policy.environment.extend([
        (
            "ANDROID_HOME".to_string(),
            EnvOverride::Set(android.sdk_root.to_string_lossy().into_owned()),
        ),
        (
            "ANDROID_NDK_HOME".to_string(),
            EnvOverride::Set(android.ndk_root.to_string_lossy().into_owned()),
        ),
    ]);
    Ok(())
}

fn ios_toolchain(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    let Some(ios) = plan.ios() else {
        return Err(ConfigError::missing("ios_sysroot", "required to build for iOS"));
    };

    policy.target_defines.extend([
        Define::new("CMAKE_SYSTEM_NAME", "iOS"),
        Define::new("CMAKE_OSX_SYSROOT", ios.sysroot.clone()),
        Define::new("CMAKE_OSX_DEPLOYMENT_TARGET", ios.deploy_target.clone()),
        Define::new(
            "CMAKE_TOOLCHAIN_FILE",
            ios.toolchain_file.to_string_lossy().into_owned(),
        ),
    ]);
    if let Some(team) = &plan.apple().code_signing_team_id {
        policy
            .target_defines
            .push(Define::new("CMAKE_XCODE_ATTRIBUTE_DEVELOPMENT_TEAM", team.clone()));
    }
    if let Some(identity) = &plan.apple().code_signing_identity {
        policy
            .target_defines
            .push(Define::new("CMAKE_XCODE_ATTRIBUTE_CODE_SIGN_IDENTITY", identity.clone()));
    }
    Ok(())
}

fn wasm_emsdk(plan: &BuildPlan, policy: &mut ToolchainPolicy) -> Result<(), ConfigError> {
    let Some(wasm) = plan.wasm() else {
        return Ok(());
    };

    let emsdk_dir = emsdk_dir(plan);
    let toolchain = emsdk_dir
        .join("upstream")
        .join("emscripten")
        .join("cmake")
        .join("Modules")
        .join("Platform")
        .join("Emscripten.cmake");
    policy.target_defines.push(Define::new(
        "CMAKE_TOOLCHAIN_FILE",
        toolchain.to_string_lossy().into_owned(),
    ));
    if !wasm.emscripten_settings.is_empty() {
        policy.target_defines.push(Define::new(
            "OCOS_EMSCRIPTEN_SETTINGS",
            wasm.emscripten_settings.join(";"),
        ));
    }

    let emsdk = match plan.host().os {
        HostOs::Windows => emsdk_dir.join("emsdk.bat"),
        HostOs::Linux | HostOs::MacOs => emsdk_dir.join("emsdk"),
    };
    for action in ["install", "activate"] {
        policy.setup_steps.push(
            ToolInvocation::new(&emsdk)
                .args([action, wasm.emsdk_version.as_str()])
                .current_dir(&emsdk_dir),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_build_plan, BuildOptions};
    use crate::models::HostInfo;

    fn windows() -> HostInfo {
        HostInfo::new(HostOs::Windows, "AMD64", 64)
    }

    fn plan_for(options: BuildOptions, host: &HostInfo) -> BuildPlan {
        resolve_build_plan(&options, host).unwrap()
    }

    #[test]
    fn test_parallel_flags_per_backend() {
        assert_eq!(
            BuildBackend::MsBuild.parallel_args(8),
            (
                vec![],
                vec!["/maxcpucount:8".to_string(), "/nodeReuse:False".to_string()]
            )
        );
        assert_eq!(
            BuildBackend::Xcode.parallel_args(4),
            (vec!["--parallel".to_string(), "4".to_string()], vec![])
        );
        assert_eq!(
            BuildBackend::Native.parallel_args(16),
            (vec![], vec!["-j16".to_string()])
        );
        assert_eq!(BuildBackend::Native.parallel_args(1), (vec![], vec![]));
    }

    #[test]
    fn test_every_backend_has_parallel_rule() {
        for backend in [BuildBackend::MsBuild, BuildBackend::Xcode, BuildBackend::Native] {
            assert!(PARALLEL_FLAGS.iter().any(|rule| rule.backend == backend));
        }
    }

    #[test]
    fn test_windows_native_x64_selectors() {
        let plan = plan_for(BuildOptions::default(), &windows());
        let policy = derive_toolchain_policy(&plan).unwrap();
        assert_eq!(
            policy.generator_args,
            vec!["-A", "x64", "-T", "host=x64", "-G", "Visual Studio 17 2022"]
        );
        assert_eq!(policy.backend, BuildBackend::MsBuild);
        assert!(policy.test_veto.is_none());
    }

    #[test]
    fn test_windows_32bit_host_uses_win32() {
        let host = HostInfo::new(HostOs::Windows, "x86", 32);
        let plan = plan_for(BuildOptions::default(), &host);
        let policy = derive_toolchain_policy(&plan).unwrap();
        assert_eq!(&policy.generator_args[..2], &["-A", "Win32"]);
    }

    #[test]
    fn test_windows_x86_flag_uses_win32() {
        let options = BuildOptions {
            x86: true,
            ..BuildOptions::default()
        };
        let policy = derive_toolchain_policy(&plan_for(options, &windows())).unwrap();
        assert_eq!(&policy.generator_args[..2], &["-A", "Win32"]);
    }

    #[test]
    fn test_windows_arm64_vetoes_tests() {
        let options = BuildOptions {
            arm64: true,
            ..BuildOptions::default()
        };
        let policy = derive_toolchain_policy(&plan_for(options, &windows())).unwrap();
        assert_eq!(
            policy.generator_args,
            vec!["-A", "ARM64", "-G", "Visual Studio 17 2022"]
        );
        assert!(policy.test_veto.is_some());
    }

    #[test]
    fn test_windows_ninja_with_arm_is_error() {
        let options = BuildOptions {
            arm: true,
            cmake_generator: Some(Generator::Ninja),
            ..BuildOptions::default()
        };
        let err = derive_toolchain_policy(&plan_for(options, &windows())).unwrap_err();
        assert_eq!(err.options(), vec!["cmake_generator", "arm"]);
    }

    #[test]
    fn test_windows_ninja_on_32bit_host_is_error() {
        let host = HostInfo::new(HostOs::Windows, "x86", 32);
        let options = BuildOptions {
            cmake_generator: Some(Generator::Ninja),
            ..BuildOptions::default()
        };
        assert!(derive_toolchain_policy(&plan_for(options, &host)).is_err());
    }

    #[test]
    fn test_windows_wasm_forces_ninja() {
        let options = BuildOptions {
            build_wasm: true,
            ..BuildOptions::default()
        };
        let policy = derive_toolchain_policy(&plan_for(options, &windows())).unwrap();
        assert_eq!(policy.generator, Some(Generator::Ninja));
        assert_eq!(policy.generator_args, vec!["-G", "Ninja"]);
        assert_eq!(policy.backend, BuildBackend::Native);
        assert_eq!(
            policy.notes,
            vec!["Setting generator to Ninja (was 'Visual Studio 17 2022'), which is required when building for wasm on Windows"]
        );
        assert_eq!(policy.setup_steps.len(), 2);
        assert!(policy.setup_steps[0].program.ends_with("emsdk.bat"));
        assert_eq!(policy.setup_steps[0].args, vec!["install", "3.1.19"]);
        assert_eq!(policy.setup_steps[1].args, vec!["activate", "3.1.19"]);
    }

    #[test]
    fn test_macos_xcode_and_foreign_arch() {
        let host = HostInfo::new(HostOs::MacOs, "x86_64", 64);
        let options = BuildOptions {
            use_xcode: true,
            osx_arch: Some("arm64".to_string()),
            ..BuildOptions::default()
        };
        let policy = derive_toolchain_policy(&plan_for(options, &host)).unwrap();
        assert_eq!(policy.generator_args, vec!["-G", "Xcode"]);
        assert_eq!(policy.backend, BuildBackend::Xcode);
        assert!(policy.test_veto.is_some());
    }

    #[test]
    fn test_macos_native_arch_keeps_tests() {
        let host = HostInfo::new(HostOs::MacOs, "arm64", 64);
        let policy = derive_toolchain_policy(&plan_for(BuildOptions::default(), &host)).unwrap();
        assert!(policy.generator_args.is_empty());
        assert!(policy.test_veto.is_none());
    }

    #[test]
    fn test_linux_explicit_ninja() {
        let host = HostInfo::new(HostOs::Linux, "x86_64", 64);
        let options = BuildOptions {
            cmake_generator: Some(Generator::Ninja),
            ..BuildOptions::default()
        };
        let policy = derive_toolchain_policy(&plan_for(options, &host)).unwrap();
        assert_eq!(policy.generator_args, vec!["-G", "Ninja"]);
    }

    #[test]
    fn test_feature_defines_order() {
        let host = HostInfo::new(HostOs::Linux, "x86_64", 64);
        let plan = plan_for(BuildOptions::default(), &host);
        let names: Vec<String> = feature_defines(&plan).into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "Python_EXECUTABLE",
                "PYTHON_EXECUTABLE",
                "OCOS_BUILD_APPLE_FRAMEWORK",
                "OCOS_CROSS_COMPILING",
                "OCOS_ENABLE_SELECTED_OPLIST",
            ]
        );
    }

    #[test]
    fn test_generator_rule_exclusive() {
        for host in [HostOs::Windows, HostOs::Linux, HostOs::MacOs] {
            for target in [
                TargetPlatform::Native,
                TargetPlatform::Android,
                TargetPlatform::Ios,
                TargetPlatform::WebAssembly,
                TargetPlatform::Arm,
                TargetPlatform::Arm64,
                TargetPlatform::Arm64Ec,
                TargetPlatform::X86,
            ] {
                let selecting = TOOLCHAIN_MATRIX
                    .iter()
                    .filter(|r| r.selects_generator && r.matches(host, target))
                    .count();
                assert!(selecting >= 1, "no generator rule for {} → {}", host, target);
            }
        }
    }
}
