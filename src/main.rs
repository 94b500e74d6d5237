use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::{Path, PathBuf};

use ortext_build::cli::{self, BuildArgs, Cli, Command, XcframeworkArgs};
use ortext_build::error::AppError;
use ortext_build::log_collector::{init_logging, session_log_path};
use ortext_build::orchestrator::xcframework::{execute_xcframework, plan_xcframework};
use ortext_build::orchestrator::{run_pipeline, ProcessRunner, RecordingRunner, SystemRunner};
use ortext_build::system::{ambient_environment, detect_host};

fn main() {
    let code = match run() {
        Ok(()) => 0,
        Err(err) => {
            report(&err);
            err.downcast_ref::<AppError>().map_or(1, AppError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<()> {
    let args = cli::utf8_args(std::env::args_os()).map_err(AppError::from)?;
    let args = cli::expand_args(args).map_err(AppError::from)?;
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    match &cli.command {
        Some(Command::Xcframework(args)) => run_xcframework(args),
        None => run_build(&cli.build),
    }
}

fn run_build(args: &BuildArgs) -> anyhow::Result<()> {
    let log_dir = args
        .build_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("build"))
        .join("logs");
    start_logging(args.verbose, args.log_file.as_deref(), &log_dir)?;

    let host = detect_host();
    log::info!(
        "[Main] ortext-build {} on {} ({}, {}-bit)",
        ortext_build::VERSION,
        host.os,
        host.machine,
        host.pointer_width
    );

    let options = args.to_options();
    let ambient = ambient_environment();

    let report = if args.dry_run {
        let mut runner = RecordingRunner::new();
        let report = run_pipeline(&options, &host, ambient, &mut runner)?;
        for line in runner.command_lines() {
            println!("{}", line);
        }
        report
    } else {
        let mut runner = SystemRunner::new().map_err(AppError::from)?;
        run_pipeline(&options, &host, ambient, &mut runner)?
    };

    if !report.warnings.is_empty() {
        log::warn!("[Main] Completed with {} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            log::warn!("[Main]   {}", warning);
        }
    }
    log::info!(
        "[Main] Build complete: {} command(s) across phases [{}]",
        report.executed.len(),
        report
            .phases
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

fn run_xcframework(args: &XcframeworkArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    let request = args.to_request(&cwd).map_err(AppError::from)?;
    start_logging(args.verbose, args.log_file.as_deref(), &request.output_dir.join("logs"))?;

    let plan = plan_xcframework(&request).map_err(AppError::from)?;
    if args.dry_run {
        for step in &plan.steps {
            println!("{}", step);
        }
        return Ok(());
    }

    let mut runner = SystemRunner::new().map_err(AppError::from)?;
    let runner: &mut dyn ProcessRunner = &mut runner;
    execute_xcframework(&plan, runner, &ambient_environment()).map_err(AppError::from)?;
    log::info!("[Main] xcframework written to {}", plan.xcframework_dir.display());
    Ok(())
}

fn start_logging(verbose: bool, log_file: Option<&Path>, default_dir: &Path) -> anyhow::Result<()> {
    let path = log_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| session_log_path(default_dir));
    if let Some(path) = init_logging(verbose, Some(&path))
        .with_context(|| format!("cannot open log file {}", path.display()))?
    {
        log::debug!("[Main] Logging to {}", path.display());
    }
    Ok(())
}

/// One line on stderr; through the logger when it is installed so the session file has it too.
fn report(err: &anyhow::Error) {
    let message = match err.downcast_ref::<AppError>() {
        Some(app) => app.user_message(),
        None => format!("{:#}", err),
    };
    if log::max_level() == log::LevelFilter::Off {
        eprintln!("[ERROR] {}", message);
    } else {
        log::error!("{}", message);
    }
}
