//! Phase state machine.
//!
//! **Architecture**:
//! - `Phase`: the four units of orchestrated work
//! - `PhaseRequest`: what the operator asked for (nothing, or an explicit phase set)
//! - `schedule_phases`: applies the implicit default, the skip-tests override and the
//!   matrix veto, producing the finalized `PhaseSchedule`
//!
//! The finalized order is always Update → Clean → Build → Test. A caller-supplied order that
//! violates it is refused rather than reordered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::{BuildPlan, TargetPlatform};

/// One phase of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Source sync, code generation and the configure step
    Update,

    /// Build with target=clean
    Clean,

    /// Compile every variant
    Build,

    /// Run the unit tests of every variant
    Test,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Update, Phase::Clean, Phase::Build, Phase::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Update => "update",
            Phase::Clean => "clean",
            Phase::Build => "build",
            Phase::Test => "test",
        }
    }

    /// Phases allowed to run directly after this one.
    pub fn valid_next_phases(&self) -> Vec<Phase> {
        match self {
            Phase::Update => vec![Phase::Clean, Phase::Build, Phase::Test],
            Phase::Clean => vec![Phase::Build, Phase::Test],
            Phase::Build => vec![Phase::Test],
            Phase::Test => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Phase) -> bool {
        self.valid_next_phases().contains(&next)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown phase '{}', expected update, clean, build or test", s))
    }
}

/// Phases the operator asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRequest {
    /// Empty means "nothing explicit": the implicit default applies.
    pub explicit: Vec<Phase>,
    /// Removes Test regardless of anything else.
    pub skip_tests: bool,
}

impl PhaseRequest {
    pub fn implicit() -> Self {
        PhaseRequest::default()
    }

    pub fn explicit(phases: impl IntoIterator<Item = Phase>) -> Self {
        PhaseRequest {
            explicit: phases.into_iter().collect(),
            skip_tests: false,
        }
    }

    pub fn skip_tests(mut self, skip: bool) -> Self {
        self.skip_tests = skip;
        self
    }
}

/// The finalized, ordered phase list for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSchedule {
    pub phases: Vec<Phase>,
    /// Non-fatal notes about phases that were dropped.
    pub warnings: Vec<String>,
}

impl PhaseSchedule {
    pub fn contains(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

/// Finalize the phase list.
///
/// `test_veto` is the matrix's reason the host cannot run the produced binaries, if any.
pub fn schedule_phases(
    request: &PhaseRequest,
    plan: &BuildPlan,
    test_veto: Option<&str>,
) -> Result<PhaseSchedule, ConfigError> {
    let mut warnings = Vec::new();

    let mut phases = if request.explicit.is_empty() {
        let mut phases = vec![Phase::Update, Phase::Build];
        if implicit_test_allowed(plan) {
            phases.push(Phase::Test);
        } else if !request.skip_tests {
            warnings.push(format!(
                "Test phase not scheduled: binaries cross-compiled for {} cannot run on this host",
                plan.target()
            ));
        }
        phases
    } else {
        validate_order(&request.explicit)?;
        request.explicit.clone()
    };

    if request.skip_tests && phases.contains(&Phase::Test) {
        log::debug!("[Scheduler] skip_tests removes the test phase");
        phases.retain(|p| *p != Phase::Test);
    }

    if let Some(reason) = test_veto {
        if phases.contains(&Phase::Test) {
            phases.retain(|p| *p != Phase::Test);
            warnings.push(format!("Test phase disabled: {}", reason));
        }
    }

    for warning in &warnings {
        log::warn!("[Scheduler] {}", warning);
    }
    log::info!(
        "[Scheduler] Phases: [{}]",
        phases.iter().map(Phase::as_str).collect::<Vec<_>>().join(", ")
    );

    Ok(PhaseSchedule { phases, warnings })
}

/// Native and WebAssembly builds test by default; Android only for ABIs the test runner handles.
fn implicit_test_allowed(plan: &BuildPlan) -> bool {
    match plan.target() {
        TargetPlatform::Android => plan.android().map_or(false, |a| a.abi.is_test_capable()),
        target => !target.is_cross_compile(),
    }
}

fn validate_order(phases: &[Phase]) -> Result<(), ConfigError> {
    for pair in phases.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev == next {
            return Err(ConfigError::PhaseOrder(format!(
                "phase '{}' requested more than once",
                prev
            )));
        }
        if !prev.can_transition_to(next) {
            return Err(ConfigError::PhaseOrder(format!(
                "'{}' cannot run after '{}' (required order: update, clean, build, test)",
                next, prev
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_build_plan, BuildOptions};
    use crate::models::{HostInfo, HostOs};

    fn plan(options: BuildOptions, host: HostOs) -> BuildPlan {
        let host = HostInfo::new(host, "x86_64", 64);
        resolve_build_plan(&options, &host).unwrap()
    }

    #[test]
    fn test_phase_transitions() {
        assert!(Phase::Update.can_transition_to(Phase::Build));
        assert!(Phase::Clean.can_transition_to(Phase::Build));
        assert!(!Phase::Build.can_transition_to(Phase::Clean));
        assert!(!Phase::Test.can_transition_to(Phase::Build));
        assert!(Phase::Test.valid_next_phases().is_empty());
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!("Build".parse::<Phase>(), Ok(Phase::Build));
        assert!("install".parse::<Phase>().is_err());
    }

    #[test]
    fn test_implicit_native_default() {
        let plan = plan(BuildOptions::default(), HostOs::Linux);
        let schedule = schedule_phases(&PhaseRequest::implicit(), &plan, None).unwrap();
        assert_eq!(schedule.phases, vec![Phase::Update, Phase::Build, Phase::Test]);
        assert!(schedule.warnings.is_empty());
    }

    #[test]
    fn test_implicit_arm64_excludes_test_with_warning() {
        let options = BuildOptions {
            arm64: true,
            ..BuildOptions::default()
        };
        let plan = plan(options, HostOs::Windows);
        let schedule = schedule_phases(&PhaseRequest::implicit(), &plan, None).unwrap();
        assert_eq!(schedule.phases, vec![Phase::Update, Phase::Build]);
        assert_eq!(schedule.warnings.len(), 1);
    }

    #[test]
    fn test_explicit_phases_get_no_additions() {
        let plan = plan(BuildOptions::default(), HostOs::Linux);
        let request = PhaseRequest::explicit([Phase::Build]);
        let schedule = schedule_phases(&request, &plan, None).unwrap();
        assert_eq!(schedule.phases, vec![Phase::Build]);
    }

    #[test]
    fn test_skip_tests_always_wins() {
        let plan = plan(BuildOptions::default(), HostOs::Linux);
        let request = PhaseRequest::explicit([Phase::Build, Phase::Test]).skip_tests(true);
        let schedule = schedule_phases(&request, &plan, None).unwrap();
        assert_eq!(schedule.phases, vec![Phase::Build]);
        assert!(schedule.warnings.is_empty());

        let schedule = schedule_phases(&PhaseRequest::implicit().skip_tests(true), &plan, None).unwrap();
        assert_eq!(schedule.phases, vec![Phase::Update, Phase::Build]);
    }

    #[test]
    fn test_veto_removes_test_with_warning() {
        let plan = plan(BuildOptions::default(), HostOs::Linux);
        let schedule =
            schedule_phases(&PhaseRequest::implicit(), &plan, Some("foreign architecture")).unwrap();
        assert!(!schedule.contains(Phase::Test));
        assert_eq!(schedule.warnings, vec!["Test phase disabled: foreign architecture"]);
    }

    #[test]
    fn test_out_of_order_request_rejected() {
        let plan = plan(BuildOptions::default(), HostOs::Linux);
        for phases in [
            vec![Phase::Build, Phase::Update],
            vec![Phase::Build, Phase::Clean],
            vec![Phase::Test, Phase::Build],
            vec![Phase::Build, Phase::Build],
        ] {
            let err = schedule_phases(&PhaseRequest::explicit(phases), &plan, None).unwrap_err();
            assert!(matches!(err, ConfigError::PhaseOrder(_)));
        }
    }

    #[test]
    fn test_full_ordered_request_accepted() {
        let plan = plan(BuildOptions::default(), HostOs::Linux);
        let request = PhaseRequest::explicit(Phase::ALL);
        let schedule = schedule_phases(&request, &plan, None).unwrap();
        assert_eq!(schedule.phases, Phase::ALL.to_vec());
    }
}
