//! Property tests for the resolver, the toolchain matrix and the phase scheduler.

use ortext_build::config::{resolve_build_plan, validator, BuildOptions};
use ortext_build::error::ConfigError;
use ortext_build::models::{AndroidAbi, EnvOverride, HostInfo, HostOs, Parallelism, TargetPlatform};
use ortext_build::orchestrator::{schedule_phases, Phase, PhaseRequest};
use ortext_build::policy::derive_toolchain_policy;
use ortext_build::system::{compose_environment, Environment};
use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn host_strategy() -> impl Strategy<Value = HostInfo> {
    prop_oneof![
        Just(HostInfo::new(HostOs::Windows, "AMD64", 64)),
        Just(HostInfo::new(HostOs::Windows, "x86", 32)),
        Just(HostInfo::new(HostOs::Linux, "x86_64", 64)),
        Just(HostInfo::new(HostOs::Linux, "aarch64", 64)),
        Just(HostInfo::new(HostOs::MacOs, "arm64", 64)),
        Just(HostInfo::new(HostOs::MacOs, "x86_64", 64)),
    ]
}

/// Target selection flags that need no files on disk.
#[derive(Debug, Clone, Copy)]
enum TargetFlag {
    None,
    Arm,
    Arm64,
    Arm64Ec,
    X86,
    Wasm,
}

fn target_flag_strategy() -> impl Strategy<Value = TargetFlag> {
    prop_oneof![
        Just(TargetFlag::None),
        Just(TargetFlag::Arm),
        Just(TargetFlag::Arm64),
        Just(TargetFlag::Arm64Ec),
        Just(TargetFlag::X86),
        Just(TargetFlag::Wasm),
    ]
}

fn options_for(flag: TargetFlag) -> BuildOptions {
    let mut options = BuildOptions {
        build_dir: Some(PathBuf::from("build-under-test")),
        ..BuildOptions::default()
    };
    match flag {
        TargetFlag::None => {}
        TargetFlag::Arm => options.arm = true,
        TargetFlag::Arm64 => options.arm64 = true,
        TargetFlag::Arm64Ec => options.arm64ec = true,
        TargetFlag::X86 => options.x86 = true,
        TargetFlag::Wasm => options.build_wasm = true,
    }
    options
}

fn abi_strategy() -> impl Strategy<Value = AndroidAbi> {
    prop_oneof![
        Just(AndroidAbi::ArmeabiV7a),
        Just(AndroidAbi::Arm64V8a),
        Just(AndroidAbi::X86),
        Just(AndroidAbi::X86_64),
    ]
}

fn phase_list_strategy() -> impl Strategy<Value = Vec<Phase>> {
    prop::collection::vec(
        prop_oneof![
            Just(Phase::Update),
            Just(Phase::Clean),
            Just(Phase::Build),
            Just(Phase::Test),
        ],
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_parallelism_mapping(p in -10_000i64..10_000) {
        let result = validator::validate_parallelism(p);
        match p {
            p if p < 0 => {
                let err = result.unwrap_err();
                prop_assert_eq!(err.options(), vec!["parallel"]);
            }
            0 => prop_assert_eq!(result.unwrap(), Parallelism::AllCores),
            p => prop_assert_eq!(result.unwrap(), Parallelism::Jobs(p as u32)),
        }
    }

    #[test]
    fn prop_policy_derivation_is_deterministic(host in host_strategy(), flag in target_flag_strategy()) {
        let Ok(plan) = resolve_build_plan(&options_for(flag), &host) else {
            return Ok(());
        };
        let first = derive_toolchain_policy(&plan);
        let second = derive_toolchain_policy(&plan);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.configure_args(&plan), b.configure_args(&plan));
                prop_assert_eq!(a, b);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            _ => prop_assert!(false, "derivation outcome changed between runs"),
        }
    }

    #[test]
    fn prop_cross_targets_never_test_implicitly(host in host_strategy(), flag in target_flag_strategy()) {
        let Ok(plan) = resolve_build_plan(&options_for(flag), &host) else {
            return Ok(());
        };
        let Ok(policy) = derive_toolchain_policy(&plan) else {
            return Ok(());
        };
        let schedule = schedule_phases(&PhaseRequest::implicit(), &plan, policy.test_veto.as_deref()).unwrap();

        prop_assert_eq!(&schedule.phases[..2], &[Phase::Update, Phase::Build][..]);
        if plan.target().is_cross_compile() {
            prop_assert!(!schedule.contains(Phase::Test));
            prop_assert!(!schedule.warnings.is_empty());
        }
        if schedule.contains(Phase::Test) {
            prop_assert!(policy.test_veto.is_none());
        }
    }

    #[test]
    fn prop_android_tests_only_for_capable_abis(abi in abi_strategy(), api in 21i64..35) {
        let temp = TempDir::new().unwrap();
        let sdk = temp.path().join("sdk");
        let ndk = sdk.join("ndk").join("26.1.10909125");
        fs::create_dir_all(ndk.join("build/cmake")).unwrap();
        fs::write(ndk.join("build/cmake/android.toolchain.cmake"), "").unwrap();

        let options = BuildOptions {
            android: true,
            android_abi: abi,
            android_api: api,
            android_home: Some(sdk),
            android_ndk_path: Some(ndk),
            ..options_for(TargetFlag::None)
        };
        let host = HostInfo::new(HostOs::Linux, "x86_64", 64);
        let plan = resolve_build_plan(&options, &host).unwrap();
        prop_assert_eq!(plan.target(), TargetPlatform::Android);

        let policy = derive_toolchain_policy(&plan).unwrap();
        let platform = format!("-DANDROID_PLATFORM=android-{}", api);
        prop_assert!(policy.configure_args(&plan).contains(&platform));

        let schedule = schedule_phases(&PhaseRequest::implicit(), &plan, policy.test_veto.as_deref()).unwrap();
        prop_assert_eq!(schedule.contains(Phase::Test), abi.is_test_capable());
    }

    #[test]
    fn prop_phase_lists_accepted_only_in_pipeline_order(phases in phase_list_strategy()) {
        let host = HostInfo::new(HostOs::Linux, "x86_64", 64);
        let plan = resolve_build_plan(&options_for(TargetFlag::None), &host).unwrap();
        let strictly_ordered = phases.windows(2).all(|w| w[0] < w[1]);

        match schedule_phases(&PhaseRequest::explicit(phases.clone()), &plan, None) {
            Ok(schedule) => {
                prop_assert!(strictly_ordered);
                prop_assert_eq!(schedule.phases, phases);
            }
            Err(err) => {
                prop_assert!(!strictly_ordered);
                prop_assert!(matches!(err, ConfigError::PhaseOrder(_)));
            }
        }
    }

    #[test]
    fn prop_prepend_keeps_existing_entries(existing in "[a-z/]{1,20}", added in "[a-z/]{1,20}") {
        let mut ambient = Environment::new();
        ambient.insert("LD_LIBRARY_PATH".to_string(), existing.clone());
        let overrides = vec![("LD_LIBRARY_PATH".to_string(), EnvOverride::Prepend(added.clone()))];

        let env = compose_environment(&ambient, &overrides, HostOs::Linux);
        prop_assert_eq!(env.get("LD_LIBRARY_PATH").cloned(), Some(format!("{}:{}", added, existing)));
        prop_assert_eq!(ambient.get("LD_LIBRARY_PATH").cloned(), Some(existing));
    }
}
