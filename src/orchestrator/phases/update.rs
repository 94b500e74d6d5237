//! Update phase: sources, generated code, SDK setup, configure.
//!
//! Order: selected-ops generation, submodule sync, WebAssembly SDK install/activate, then
//! one configure invocation per variant.

use crate::models::{BuildPlan, BuildVariant, Define, EnvOverride, ToolInvocation};
use crate::policy::ToolchainPolicy;

pub fn update_invocations(plan: &BuildPlan, policy: &ToolchainPolicy) -> Vec<ToolInvocation> {
    let mut invocations = Vec::new();

    if let Some(inv) = selected_ops_invocation(plan) {
        invocations.push(inv);
    }
    if plan.submodule_sync() {
        invocations.extend(submodule_invocations(plan));
    }
    invocations.extend(policy.setup_steps.iter().cloned());
    invocations.extend(
        plan.variants()
            .iter()
            .map(|variant| configure_invocation(plan, policy, *variant)),
    );
    invocations
}

/// `git submodule sync` followed by `git submodule update --init`, both recursive.
pub fn submodule_invocations(plan: &BuildPlan) -> Vec<ToolInvocation> {
    let git = &plan.tools().git;
    vec![
        ToolInvocation::new(git)
            .args(["submodule", "sync", "--recursive"])
            .current_dir(plan.source_dir()),
        ToolInvocation::new(git)
            .args(["submodule", "update", "--init", "--recursive"])
            .current_dir(plan.source_dir()),
    ]
}

/// Operator-list code generation for reduced-operator builds.
pub fn selected_ops_invocation(plan: &BuildPlan) -> Option<ToolInvocation> {
    let config = plan.selected_ops_config()?;
    let tools_dir = plan.source_dir().join("tools");
    let script = tools_dir.join("gen_selectedops.py");

    Some(
        ToolInvocation::new(&plan.tools().python)
            .arg(script.to_string_lossy())
            .arg(config.to_string_lossy())
            .current_dir(plan.source_dir())
            .env(
                "PYTHONPATH",
                EnvOverride::Append(tools_dir.to_string_lossy().into_owned()),
            ),
    )
}

/// Configure step for one variant, run inside the variant's output directory.
pub fn configure_invocation(
    plan: &BuildPlan,
    policy: &ToolchainPolicy,
    variant: BuildVariant,
) -> ToolInvocation {
    ToolInvocation::new(&plan.tools().cmake)
        .args(policy.configure_args(plan))
        .arg(Define::new("CMAKE_BUILD_TYPE", variant.as_str()).to_arg())
        .current_dir(plan.variant_dir(variant))
        .envs(&policy.environment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_build_plan, BuildOptions};
    use crate::models::{HostInfo, HostOs};
    use crate::policy::derive_toolchain_policy;
    use std::fs;
    use tempfile::TempDir;

    fn linux() -> HostInfo {
        HostInfo::new(HostOs::Linux, "x86_64", 64)
    }

    #[test]
    fn test_native_update_sequence() {
        let options = BuildOptions {
            configs: vec![BuildVariant::Debug, BuildVariant::Release],
            ..BuildOptions::default()
        };
        let plan = resolve_build_plan(&options, &linux()).unwrap();
        let policy = derive_toolchain_policy(&plan).unwrap();
        let invocations = update_invocations(&plan, &policy);

        assert_eq!(invocations.len(), 4);
        assert_eq!(invocations[0].args, vec!["submodule", "sync", "--recursive"]);
        assert_eq!(invocations[1].args[..2], ["submodule", "update"]);
        assert_eq!(invocations[2].args.last().unwrap(), "-DCMAKE_BUILD_TYPE=Debug");
        assert_eq!(invocations[3].args.last().unwrap(), "-DCMAKE_BUILD_TYPE=Release");
        assert_eq!(invocations[3].cwd.as_deref(), Some(plan.variant_dir(BuildVariant::Release).as_path()));
    }

    #[test]
    fn test_skip_submodule_sync() {
        let options = BuildOptions {
            skip_submodule_sync: true,
            ..BuildOptions::default()
        };
        let plan = resolve_build_plan(&options, &linux()).unwrap();
        let policy = derive_toolchain_policy(&plan).unwrap();
        let invocations = update_invocations(&plan, &policy);
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].program, plan.tools().cmake);
    }

    #[test]
    fn test_selected_ops_runs_first_with_pythonpath() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("ops.config");
        fs::write(&config, "ai.onnx.contrib;1;GaussianBlur\n").unwrap();

        let options = BuildOptions {
            include_ops_by_config: Some(config),
            source_dir: temp.path().to_path_buf(),
            ..BuildOptions::default()
        };
        let plan = resolve_build_plan(&options, &linux()).unwrap();
        let policy = derive_toolchain_policy(&plan).unwrap();
        let invocations = update_invocations(&plan, &policy);

        let gen = &invocations[0];
        assert!(gen.args[0].ends_with("gen_selectedops.py"));
        assert!(matches!(&gen.env[0], (name, EnvOverride::Append(_)) if name == "PYTHONPATH"));
        let configure = invocations.last().unwrap();
        assert!(configure.args.contains(&"-DOCOS_ENABLE_SELECTED_OPLIST=ON".to_string()));
    }

    #[test]
    fn test_extra_defines_precede_generator_args() {
        let options = BuildOptions {
            cmake_extra_defines: vec!["FOO=bar".to_string()],
            cmake_generator: Some(crate::models::Generator::Ninja),
            ..BuildOptions::default()
        };
        let plan = resolve_build_plan(&options, &linux()).unwrap();
        let policy = derive_toolchain_policy(&plan).unwrap();
        let configure = configure_invocation(&plan, &policy, BuildVariant::Debug);
        let define = configure.args.iter().position(|a| a == "-DFOO=bar").unwrap();
        let generator = configure.args.iter().position(|a| a == "-G").unwrap();
        assert!(define < generator);
    }
}
