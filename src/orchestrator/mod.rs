//! Build orchestration: Update → Clean → Build → Test over every build variant.
//!
//! Phases and variants run strictly one after another, one external process at a time.
//! The first invocation that fails ends the run; nothing is retried.

pub mod executor;
pub mod phases;
pub mod state;
pub mod xcframework;

pub use executor::{ProcessRunner, RecordingRunner, SystemRunner};
pub use state::{schedule_phases, Phase, PhaseRequest, PhaseSchedule};

use crate::config::{resolve_build_plan, BuildOptions};
use crate::error::{AppError, BuildError};
use crate::models::{BuildPlan, ExecutionResult, HostInfo};
use crate::policy::{derive_toolchain_policy, ToolchainPolicy};
use crate::system::{compose_environment, Environment};
use serde::Serialize;
use std::fs;

/// What a completed run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub phases: Vec<Phase>,
    pub executed: Vec<ExecutionResult>,
    /// Every warning emitted during the run, in order.
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn command_lines(&self) -> Vec<String> {
        self.executed
            .iter()
            .map(|r| r.invocation.command_line())
            .collect()
    }
}

/// Executes a phase schedule for one plan.
pub struct Orchestrator<'a> {
    plan: &'a BuildPlan,
    policy: &'a ToolchainPolicy,
    /// Snapshot every invocation's environment is composed from.
    ambient: Environment,
    runner: &'a mut dyn ProcessRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        plan: &'a BuildPlan,
        policy: &'a ToolchainPolicy,
        ambient: Environment,
        runner: &'a mut dyn ProcessRunner,
    ) -> Self {
        Orchestrator {
            plan,
            policy,
            ambient,
            runner,
        }
    }

    /// Run every scheduled phase in order, stopping at the first failure.
    pub fn run(&mut self, schedule: &PhaseSchedule) -> Result<RunReport, BuildError> {
        let mut report = RunReport {
            phases: schedule.phases.clone(),
            executed: Vec::new(),
            warnings: schedule.warnings.clone(),
        };

        if schedule
            .phases
            .iter()
            .any(|p| matches!(p, Phase::Update | Phase::Clean | Phase::Build))
        {
            self.create_variant_dirs()?;
        }

        log::info!("[Orchestrator] Build started");
        for phase in &schedule.phases {
            log::info!("[Orchestrator] Phase '{}' starting", phase);

            let test_runner = if *phase == Phase::Test {
                self.resolve_test_runner(&mut report)
            } else {
                None
            };

            let steps = phases::phase_steps(*phase, self.plan, self.policy, test_runner.as_deref());
            for warning in steps.warnings {
                log::warn!("[Orchestrator] {}", warning);
                report.warnings.push(warning);
            }

            for invocation in &steps.invocations {
                let env = compose_environment(&self.ambient, &invocation.env, self.plan.host().os);
                let result = self.runner.run(invocation, &env)?;
                if !result.success {
                    let status = match result.exit_code {
                        Some(code) => format!("exit code {}", code),
                        None => "termination by signal".to_string(),
                    };
                    log::error!("[Orchestrator] Phase '{}' failed", phase);
                    return Err(BuildError::InvocationFailed {
                        command: invocation.command_line(),
                        status,
                    });
                }
                report.executed.push(result);
            }
            log::info!("[Orchestrator] Phase '{}' complete", phase);
        }
        log::info!("[Orchestrator] Build complete");
        Ok(report)
    }

    /// One output directory per variant; existing directories are left alone.
    fn create_variant_dirs(&self) -> Result<(), BuildError> {
        for variant in self.plan.variants() {
            let dir = self.plan.variant_dir(*variant);
            fs::create_dir_all(&dir)?;
            log::debug!("[Orchestrator] Build directory ready: {}", dir.display());
        }
        Ok(())
    }

    /// The configured test runner, if it can be located. Falls back to direct execution otherwise.
    fn resolve_test_runner(&self, report: &mut RunReport) -> Option<std::path::PathBuf> {
        let configured = self.plan.tools().ctest.as_deref()?;
        let resolved = self.runner.resolve(configured);
        if resolved.is_none() && self.plan.unit_tests_enabled() {
            let warning = format!(
                "Test runner '{}' not found, running test binaries directly",
                configured.display()
            );
            log::warn!("[Orchestrator] {}", warning);
            report.warnings.push(warning);
        }
        resolved
    }
}

/// Resolve, derive, schedule and run, in that order.
///
/// Every configuration error surfaces before the first process is started.
pub fn run_pipeline(
    options: &BuildOptions,
    host: &HostInfo,
    ambient: Environment,
    runner: &mut dyn ProcessRunner,
) -> Result<RunReport, AppError> {
    let plan = resolve_build_plan(options, host)?;
    let policy = derive_toolchain_policy(&plan)?;
    let request = options.phase_request()?;
    let schedule = schedule_phases(&request, &plan, policy.test_veto.as_deref())?;

    let mut orchestrator = Orchestrator::new(&plan, &policy, ambient, runner);
    let mut report = orchestrator.run(&schedule)?;

    let mut warnings = policy.notes.clone();
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    Ok(report)
}
