//! Orchestrator phases: one invocation builder per pipeline stage.
//!
//! - **Update** (`update`) - submodule sync, code generation, SDK setup and the configure step
//! - **Clean** (`clean`) - build with target=clean, per variant
//! - **Build** (`build`) - one build-tool invocation per variant
//! - **Test** (`test`) - test runner, or the test binaries directly
//!
//! Builders are pure: they turn a plan and policy into ordered `ToolInvocation`s and never
//! touch the filesystem or spawn anything.

pub mod build;
pub mod clean;
pub mod update;

use crate::models::{BuildPlan, ToolInvocation};
use crate::orchestrator::state::Phase;
use crate::policy::ToolchainPolicy;
use std::path::Path;

/// Ordered invocations of one phase, plus warnings about work that was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseSteps {
    pub invocations: Vec<ToolInvocation>,
    pub warnings: Vec<String>,
}

impl PhaseSteps {
    pub fn new(invocations: Vec<ToolInvocation>) -> Self {
        PhaseSteps {
            invocations,
            warnings: Vec::new(),
        }
    }
}

/// Build the steps of `phase`.
///
/// `test_runner` is the resolved test-runner executable, if one was found.
pub fn phase_steps(
    phase: Phase,
    plan: &BuildPlan,
    policy: &ToolchainPolicy,
    test_runner: Option<&Path>,
) -> PhaseSteps {
    match phase {
        Phase::Update => PhaseSteps::new(update::update_invocations(plan, policy)),
        Phase::Clean => PhaseSteps::new(clean::clean_invocations(plan)),
        Phase::Build => PhaseSteps::new(build::build_invocations(plan, policy)),
        Phase::Test => test::test_steps(plan, test_runner),
    }
}
