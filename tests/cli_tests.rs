//! Command-line integration: `@file` expansion → clap parsing → options → dry-run pipeline.

use clap::Parser;
use ortext_build::cli::{expand_args, Cli, Command};
use ortext_build::models::{BuildVariant, HostInfo, HostOs};
use ortext_build::orchestrator::xcframework::{plan_xcframework, XcframeworkStep};
use ortext_build::orchestrator::{run_pipeline, Phase, RecordingRunner};
use ortext_build::system::Environment;
use std::fs;
use tempfile::TempDir;

fn argv(args: &[&str]) -> Vec<String> {
    std::iter::once("ortext-build")
        .chain(args.iter().copied())
        .map(String::from)
        .collect()
}

// ============================================================================
// ARGUMENT FILES
// ============================================================================

#[test]
fn test_argfile_drives_a_dry_run() {
    let temp = TempDir::new().unwrap();
    let build_dir = temp.path().join("out");
    let args_file = temp.path().join("release.args");
    fs::write(
        &args_file,
        format!(
            "--build_dir \"{}\"\n--config Release\n--parallel 3\n--build --skip_submodule_sync\n",
            build_dir.display()
        ),
    )
    .unwrap();

    let args = expand_args(argv(&[&format!("@{}", args_file.display())])).unwrap();
    let cli = Cli::try_parse_from(args).unwrap();
    let options = cli.build.to_options();
    assert_eq!(options.configs, vec![BuildVariant::Release]);
    assert_eq!(options.build_dir.as_deref(), Some(build_dir.as_path()));

    let host = HostInfo::new(HostOs::Linux, "x86_64", 64);
    let mut runner = RecordingRunner::new();
    let report = run_pipeline(&options, &host, Environment::new(), &mut runner).unwrap();
    assert_eq!(report.phases, vec![Phase::Build]);
    assert_eq!(
        runner.command_lines(),
        vec![format!("cmake --build {}/Release --config Release -- -j3", build_dir.display())]
    );
}

#[test]
fn test_argfile_with_unbalanced_quote_is_rejected() {
    let temp = TempDir::new().unwrap();
    let args_file = temp.path().join("bad.args");
    fs::write(&args_file, "--cmake_extra_defines \"FOO=bar\n").unwrap();
    let err = expand_args(argv(&[&format!("@{}", args_file.display())])).unwrap_err();
    assert!(err.to_string().contains("bad.args"));
}

// ============================================================================
// FLAG MAPPING
// ============================================================================

#[test]
fn test_bare_parallel_means_all_cores() {
    let cli = Cli::try_parse_from(argv(&["--parallel", "--build"])).unwrap();
    assert_eq!(cli.build.parallel, 0);
    assert!(cli.build.build);
}

#[test]
fn test_empty_ctest_path_runs_binaries_directly() {
    let temp = TempDir::new().unwrap();
    let lib_dir = temp.path().join("lib");
    fs::create_dir_all(&lib_dir).unwrap();
    let cli = Cli::try_parse_from(argv(&[
        "--build_dir",
        &temp.path().join("b").to_string_lossy(),
        "--test",
        "--enable_unit_tests",
        "--onnxruntime_lib_dir",
        &lib_dir.to_string_lossy(),
        "--ctest_path",
        "",
    ]))
    .unwrap();

    let host = HostInfo::new(HostOs::Linux, "x86_64", 64);
    let mut runner = RecordingRunner::new();
    run_pipeline(&cli.build.to_options(), &host, Environment::new(), &mut runner).unwrap();
    let programs: Vec<String> = runner
        .invocations()
        .iter()
        .map(|inv| inv.program.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(programs, vec!["extensions_test", "ocos_test"]);
}

#[test]
fn test_xcframework_dry_plan_from_cli() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("xcf");
    let cli = Cli::try_parse_from(argv(&[
        "xcframework",
        &out.to_string_lossy(),
        "--platform_arch",
        "iphonesimulator",
        "arm64",
    ]))
    .unwrap();
    let Some(Command::Xcframework(args)) = cli.command else {
        panic!("expected the xcframework subcommand");
    };

    let request = args.to_request(temp.path()).unwrap();
    let plan = plan_xcframework(&request).unwrap();
    let runs: Vec<String> = plan
        .steps
        .iter()
        .filter_map(|step| match step {
            XcframeworkStep::Run(inv) => Some(inv.command_line()),
            _ => None,
        })
        .collect();
    assert!(runs.iter().any(|l| l.contains("-G=Xcode")));
    assert!(runs.iter().any(|l| l.starts_with("lipo -create")));
    assert!(runs.last().unwrap().contains("-create-xcframework"));
}

#[test]
fn test_xcframework_unsupported_pair_rejected() {
    let cli = Cli::try_parse_from(argv(&["xcframework", "out", "--platform_arch", "iphoneos", "x86_64"])).unwrap();
    let Some(Command::Xcframework(args)) = cli.command else {
        panic!("expected the xcframework subcommand");
    };
    let request = args.to_request(std::path::Path::new("/work")).unwrap();
    let err = plan_xcframework(&request).unwrap_err();
    assert_eq!(err.options(), vec!["platform_arch"]);
}
