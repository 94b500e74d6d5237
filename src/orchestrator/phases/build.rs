//! Build phase.

use crate::models::{BuildPlan, ToolInvocation};
use crate::policy::ToolchainPolicy;

/// One build invocation per variant, with the job count in the backend's own syntax.
pub fn build_invocations(plan: &BuildPlan, policy: &ToolchainPolicy) -> Vec<ToolInvocation> {
    let jobs = plan.parallelism().job_count();
    let (driver_args, tool_args) = policy.backend.parallel_args(jobs);
    log::debug!(
        "[Orchestrator] {} parallel job(s) for the {} backend",
        jobs,
        policy.backend.as_str()
    );

    plan.variants()
        .iter()
        .map(|variant| {
            let mut inv = ToolInvocation::new(&plan.tools().cmake)
                .arg("--build")
                .arg(plan.variant_dir(*variant).to_string_lossy())
                .args(["--config", variant.as_str()])
                .args(driver_args.iter().cloned());
            if !tool_args.is_empty() {
                inv = inv.arg("--").args(tool_args.iter().cloned());
            }
            inv.envs(&policy.environment)
        })
        .collect()
}
