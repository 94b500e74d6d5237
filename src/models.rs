//! Core data types for the build driver.
//!
//! `BuildPlan` is the single normalized configuration value. It is produced once per run
//! by `config::resolve_build_plan` and only ever handed out by shared reference, so every
//! downstream component reads it without being able to change it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Operating system of the machine running the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostOs {
    Windows,
    Linux,
    MacOs,
}

impl HostOs {
    /// Name used for the default build directory (matches `platform.system()` conventions).
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Windows => "Windows",
            HostOs::Linux => "Linux",
            HostOs::MacOs => "Darwin",
        }
    }

    /// Separator for path-list environment variables.
    pub fn path_list_separator(&self) -> char {
        match self {
            HostOs::Windows => ';',
            HostOs::Linux | HostOs::MacOs => ':',
        }
    }

    /// Variable the dynamic loader searches for shared libraries.
    pub fn library_search_var(&self) -> &'static str {
        match self {
            HostOs::Windows => "PATH",
            HostOs::Linux => "LD_LIBRARY_PATH",
            HostOs::MacOs => "DYLD_LIBRARY_PATH",
        }
    }

    /// Suffix appended to executables on this OS.
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            HostOs::Windows => ".exe",
            HostOs::Linux | HostOs::MacOs => "",
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host description: OS, machine architecture and pointer width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub os: HostOs,
    /// Machine name as reported by the OS, e.g. `x86_64` or `arm64`.
    pub machine: String,
    /// 32 or 64.
    pub pointer_width: u32,
}

impl HostInfo {
    pub fn new(os: HostOs, machine: impl Into<String>, pointer_width: u32) -> Self {
        HostInfo {
            os,
            machine: machine.into(),
            pointer_width,
        }
    }

    pub fn is_32bit(&self) -> bool {
        self.pointer_width == 32
    }
}

/// Platform the build produces binaries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetPlatform {
    Native,
    Android,
    Ios,
    WebAssembly,
    Arm,
    Arm64,
    Arm64Ec,
    X86,
}

impl TargetPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetPlatform::Native => "native",
            TargetPlatform::Android => "android",
            TargetPlatform::Ios => "ios",
            TargetPlatform::WebAssembly => "wasm",
            TargetPlatform::Arm => "arm",
            TargetPlatform::Arm64 => "arm64",
            TargetPlatform::Arm64Ec => "arm64ec",
            TargetPlatform::X86 => "x86",
        }
    }

    /// Targets whose binaries cannot run on the build host and that get their own build root.
    pub fn is_cross_compile(&self) -> bool {
        matches!(
            self,
            TargetPlatform::Android
                | TargetPlatform::Ios
                | TargetPlatform::Arm
                | TargetPlatform::Arm64
                | TargetPlatform::Arm64Ec
        )
    }

    /// Windows ARM family (cross-compiled through the IDE generator's architecture selector).
    pub fn is_windows_arm(&self) -> bool {
        matches!(
            self,
            TargetPlatform::Arm | TargetPlatform::Arm64 | TargetPlatform::Arm64Ec
        )
    }

    /// Subdirectory of `build/` used when no build directory is supplied.
    pub fn default_build_subdir(&self) -> Option<&'static str> {
        match self {
            TargetPlatform::Android => Some("Android"),
            TargetPlatform::Ios => Some("iOS"),
            TargetPlatform::Arm => Some("arm"),
            TargetPlatform::Arm64 => Some("arm64"),
            TargetPlatform::Arm64Ec => Some("arm64ec"),
            TargetPlatform::Native | TargetPlatform::WebAssembly | TargetPlatform::X86 => None,
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named build configuration, built into its own output subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildVariant {
    Debug,
    MinSizeRel,
    Release,
    RelWithDebInfo,
}

impl BuildVariant {
    pub const ALL: [BuildVariant; 4] = [
        BuildVariant::Debug,
        BuildVariant::MinSizeRel,
        BuildVariant::Release,
        BuildVariant::RelWithDebInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildVariant::Debug => "Debug",
            BuildVariant::MinSizeRel => "MinSizeRel",
            BuildVariant::Release => "Release",
            BuildVariant::RelWithDebInfo => "RelWithDebInfo",
        }
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildVariant::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown build configuration '{}', expected one of Debug, MinSizeRel, Release, RelWithDebInfo",
                    s
                )
            })
    }
}

/// Backend the configure step generates build files for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Generator {
    VisualStudio2019,
    VisualStudio2022,
    Ninja,
    Xcode,
}

impl Generator {
    /// Generator name as the configure tool expects it after `-G`.
    pub fn cmake_name(&self) -> &'static str {
        match self {
            Generator::VisualStudio2019 => "Visual Studio 16 2019",
            Generator::VisualStudio2022 => "Visual Studio 17 2022",
            Generator::Ninja => "Ninja",
            Generator::Xcode => "Xcode",
        }
    }

    pub fn is_visual_studio(&self) -> bool {
        matches!(
            self,
            Generator::VisualStudio2019 | Generator::VisualStudio2022
        )
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cmake_name())
    }
}

impl FromStr for Generator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Visual Studio 16 2019" => Ok(Generator::VisualStudio2019),
            "Visual Studio 17 2022" => Ok(Generator::VisualStudio2022),
            "Ninja" => Ok(Generator::Ninja),
            "Xcode" => Ok(Generator::Xcode),
            other => Err(format!(
                "unsupported generator '{}', expected 'Visual Studio 16 2019', 'Visual Studio 17 2022', 'Ninja' or 'Xcode'",
                other
            )),
        }
    }
}

/// Android application binary interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AndroidAbi {
    #[serde(rename = "armeabi-v7a")]
    ArmeabiV7a,
    #[serde(rename = "arm64-v8a")]
    Arm64V8a,
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl AndroidAbi {
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidAbi::ArmeabiV7a => "armeabi-v7a",
            AndroidAbi::Arm64V8a => "arm64-v8a",
            AndroidAbi::X86 => "x86",
            AndroidAbi::X86_64 => "x86_64",
        }
    }

    /// ABIs whose binaries can be exercised by the default test phase.
    pub fn is_test_capable(&self) -> bool {
        matches!(self, AndroidAbi::X86_64 | AndroidAbi::Arm64V8a)
    }
}

impl fmt::Display for AndroidAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AndroidAbi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "armeabi-v7a" => Ok(AndroidAbi::ArmeabiV7a),
            "arm64-v8a" => Ok(AndroidAbi::Arm64V8a),
            "x86" => Ok(AndroidAbi::X86),
            "x86_64" => Ok(AndroidAbi::X86_64),
            other => Err(format!("unsupported Android ABI '{}'", other)),
        }
    }
}

/// Number of jobs the build tool may run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parallelism {
    /// Use every logical core of the host.
    AllCores,
    /// Exactly this many jobs (always >= 1).
    Jobs(u32),
}

impl Parallelism {
    /// Concrete job count handed to the build tool.
    pub fn job_count(&self) -> usize {
        match self {
            Parallelism::AllCores => num_cpus::get().max(1),
            Parallelism::Jobs(n) => *n as usize,
        }
    }
}

/// One `NAME=value` definition passed verbatim to the configure step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Define {
    pub name: String,
    pub value: String,
}

impl Define {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `ON`/`OFF` switch.
    pub fn switch(name: impl Into<String>, on: bool) -> Self {
        Define::new(name, if on { "ON" } else { "OFF" })
    }

    pub fn to_arg(&self) -> String {
        format!("-D{}={}", self.name, self.value)
    }
}

impl FromStr for Define {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(Define::new(name, value)),
            _ => Err(format!("expected NAME=value, got '{}'", s)),
        }
    }
}

/// WebAssembly feature toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmFeatures {
    pub static_lib: bool,
    pub simd: bool,
    pub threads: bool,
    pub exception_catching: bool,
    pub exception_throwing: bool,
    pub debug_info: bool,
    pub emsdk_version: String,
    pub emscripten_settings: Vec<String>,
}

/// Android SDK/NDK description, validated against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidToolchain {
    pub sdk_root: PathBuf,
    pub ndk_root: PathBuf,
    /// Final path component of the NDK root.
    pub ndk_version: String,
    pub toolchain_file: PathBuf,
    pub api_level: u32,
    pub abi: AndroidAbi,
}

/// iOS cross-compile settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IosToolchain {
    pub sysroot: String,
    pub deploy_target: String,
    pub toolchain_file: PathBuf,
}

/// Apple-specific settings that apply to both macOS and iOS builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppleSettings {
    /// Requested architecture (`arm64`, `arm64e`, `x86_64`).
    pub osx_arch: String,
    pub build_framework: bool,
    pub code_signing_team_id: Option<String>,
    pub code_signing_identity: Option<String>,
}

/// Executables the driver invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub cmake: PathBuf,
    /// `None` runs the test binaries directly.
    pub ctest: Option<PathBuf>,
    pub python: PathBuf,
    pub git: PathBuf,
}

/// The normalized, validated build configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub(crate) host: HostInfo,
    pub(crate) target: TargetPlatform,
    pub(crate) variants: Vec<BuildVariant>,
    pub(crate) source_dir: PathBuf,
    pub(crate) build_dir: PathBuf,
    pub(crate) generator: Option<Generator>,
    pub(crate) parallelism: Parallelism,
    pub(crate) extra_defines: Vec<Define>,
    pub(crate) unit_test_lib_dir: Option<PathBuf>,
    pub(crate) selected_ops_config: Option<PathBuf>,
    pub(crate) submodule_sync: bool,
    pub(crate) wasm: Option<WasmFeatures>,
    pub(crate) android: Option<AndroidToolchain>,
    pub(crate) ios: Option<IosToolchain>,
    pub(crate) apple: AppleSettings,
    pub(crate) tools: ToolPaths,
}

impl BuildPlan {
    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    pub fn target(&self) -> TargetPlatform {
        self.target
    }

    /// Build variants in first-requested order, without duplicates.
    pub fn variants(&self) -> &[BuildVariant] {
        &self.variants
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Output directory of one build variant.
    pub fn variant_dir(&self, variant: BuildVariant) -> PathBuf {
        self.build_dir.join(variant.as_str())
    }

    /// Generator requested by the operator (before any matrix override).
    pub fn generator(&self) -> Option<Generator> {
        self.generator
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    pub fn extra_defines(&self) -> &[Define] {
        &self.extra_defines
    }

    pub fn unit_tests_enabled(&self) -> bool {
        self.unit_test_lib_dir.is_some()
    }

    /// Prebuilt runtime library directory; present iff unit tests are enabled.
    pub fn unit_test_lib_dir(&self) -> Option<&Path> {
        self.unit_test_lib_dir.as_deref()
    }

    /// Allow-list file of a reduced-operator build.
    pub fn selected_ops_config(&self) -> Option<&Path> {
        self.selected_ops_config.as_deref()
    }

    pub fn is_reduced_ops_build(&self) -> bool {
        self.selected_ops_config.is_some()
    }

    pub fn submodule_sync(&self) -> bool {
        self.submodule_sync
    }

    pub fn wasm(&self) -> Option<&WasmFeatures> {
        self.wasm.as_ref()
    }

    pub fn android(&self) -> Option<&AndroidToolchain> {
        self.android.as_ref()
    }

    pub fn ios(&self) -> Option<&IosToolchain> {
        self.ios.as_ref()
    }

    pub fn apple(&self) -> &AppleSettings {
        &self.apple
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    pub fn is_cross_compiling(&self) -> bool {
        self.target.is_cross_compile()
    }
}

/// How an invocation changes one environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvOverride {
    /// Replace the value outright.
    Set(String),
    /// Put this entry in front of the existing path list.
    Prepend(String),
    /// Put this entry after the existing path list.
    Append(String),
}

/// A single external process call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Applied in order on top of the ambient environment.
    pub env: Vec<(String, EnvOverride)>,
    pub capture_output: bool,
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ToolInvocation {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            capture_output: false,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: EnvOverride) -> Self {
        self.env.push((name.into(), value));
        self
    }

    pub fn envs(mut self, overrides: &[(String, EnvOverride)]) -> Self {
        self.env.extend(overrides.iter().cloned());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture_output = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Shell-quoted command line, for logs and diagnostics.
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        std::iter::once(program.as_ref())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_word)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Plain words (including `NAME=value` and comma lists) stay unquoted.
fn quote_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@+=,%".contains(c));
    if plain {
        return word.to_string();
    }
    shlex::try_quote(word)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| word.to_string())
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub invocation: ToolInvocation,
    pub success: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured stdout, when capture was requested.
    pub output: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(invocation: ToolInvocation, output: Option<String>) -> Self {
        ExecutionResult {
            invocation,
            success: true,
            exit_code: Some(0),
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_compile_targets() {
        assert!(TargetPlatform::Android.is_cross_compile());
        assert!(TargetPlatform::Arm64Ec.is_cross_compile());
        assert!(!TargetPlatform::WebAssembly.is_cross_compile());
        assert!(!TargetPlatform::X86.is_cross_compile());
        assert!(!TargetPlatform::Native.is_cross_compile());
    }

    #[test]
    fn test_variant_round_trip_names() {
        assert_eq!("RelWithDebInfo".parse::<BuildVariant>(), Ok(BuildVariant::RelWithDebInfo));
        assert!("release".parse::<BuildVariant>().is_err());
    }

    #[test]
    fn test_define_parsing() {
        let define: Define = "Name1=the value".parse().unwrap();
        assert_eq!(define.to_arg(), "-DName1=the value");
        let empty_value: Define = "FLAG=".parse().unwrap();
        assert_eq!(empty_value.value, "");
        assert!("=value".parse::<Define>().is_err());
        assert!("novalue".parse::<Define>().is_err());
    }

    #[test]
    fn test_command_line_quotes_arguments() {
        let inv = ToolInvocation::new("cmake")
            .arg("-G")
            .arg("Visual Studio 17 2022");
        let line = inv.command_line();
        assert!(line.starts_with("cmake -G "));
        assert_ne!(line, "cmake -G Visual Studio 17 2022");
        assert!(line.contains("Visual Studio 17 2022"));

        let defines = ToolInvocation::new("cmake").args(["-DCMAKE_BUILD_TYPE=Debug", "a;b"]);
        assert_eq!(defines.command_line(), "cmake -DCMAKE_BUILD_TYPE=Debug 'a;b'");
    }

    #[test]
    fn test_android_test_capable_abis() {
        assert!(AndroidAbi::X86_64.is_test_capable());
        assert!(AndroidAbi::Arm64V8a.is_test_capable());
        assert!(!AndroidAbi::ArmeabiV7a.is_test_capable());
        assert!(!AndroidAbi::X86.is_test_capable());
    }

    #[test]
    fn test_explicit_job_count() {
        assert_eq!(Parallelism::Jobs(6).job_count(), 6);
        assert!(Parallelism::AllCores.job_count() >= 1);
    }
}
