//! Clean phase.

use crate::models::{BuildPlan, ToolInvocation};

/// `--target clean` for every variant.
pub fn clean_invocations(plan: &BuildPlan) -> Vec<ToolInvocation> {
    plan.variants()
        .iter()
        .map(|variant| {
            ToolInvocation::new(&plan.tools().cmake)
                .arg("--build")
                .arg(plan.variant_dir(*variant).to_string_lossy())
                .args(["--config", variant.as_str(), "--target", "clean"])
        })
        .collect()
}
