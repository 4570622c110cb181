//! Property-based tests for validation and derivation logic.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use cistack_cli::application::services::deploy::{DeployOptions, deploy};
use cistack_cli::domain::config::{
    FARGATE_CPU_UNITS, StackConfig, VALID_CONFIG_KEYS, valid_memory_for_cpu, validate_config_key,
    validate_parameter_name, validate_sizing,
};
use cistack_cli::domain::task_definition::{derive_with_volume, fingerprint, placeholder_descriptor};
use cistack_common::{AccessPointHandle, JENKINS_HOME_PATH, PosixIdentity, VolumeHandle};

use crate::helpers::{MemoryDeploymentStore, NullReporter, RecordingPlatform, target};

fn volume(access_point_id: &str, posix: PosixIdentity) -> VolumeHandle {
    VolumeHandle {
        file_system_id: "fs-0123456789abcdef0".to_string(),
        file_system_arn: "arn:aws:elasticfilesystem:us-east-1:123456789012:file-system/fs-0123456789abcdef0".to_string(),
        name: "jenkins-home".to_string(),
        encrypted: true,
        security_group_id: "sg-0000000000000000a".to_string(),
        access_point: AccessPointHandle {
            id: access_point_id.to_string(),
            arn: format!("arn:aws:elasticfilesystem:us-east-1:123456789012:access-point/{access_point_id}"),
            name: "jenkins-home-ap".to_string(),
            root_path: "/jenkins-home".to_string(),
            posix,
        },
    }
}

// ============================================================================
// Configuration validators
// ============================================================================

proptest! {
    /// Keys outside the whitelist are rejected.
    #[test]
    fn prop_arbitrary_keys_rejected(key in "[a-z_]{1,12}\\.[a-z_]{1,12}") {
        if !VALID_CONFIG_KEYS.contains(&key.as_str()) {
            prop_assert!(validate_config_key(&key).is_err(), "accepted invalid key: {key}");
        }
    }

    /// Every memory size listed for a CPU value validates, and nothing else does.
    #[test]
    fn prop_sizing_matches_table(
        cpu in proptest::sample::select(FARGATE_CPU_UNITS.to_vec()),
        memory in 0u32..32768,
    ) {
        let valid = valid_memory_for_cpu(cpu).expect("listed cpu");
        prop_assert_eq!(validate_sizing(cpu, memory).is_ok(), valid.contains(&memory));
    }

    /// Absolute slash-separated names are accepted.
    #[test]
    fn prop_absolute_parameter_names_accepted(
        segments in proptest::collection::vec("[a-zA-Z0-9_.-]{1,16}", 1..5),
    ) {
        let name = format!("/{}", segments.join("/"));
        prop_assert!(validate_parameter_name(&name).is_ok(), "rejected {name}");
    }

    /// Names without a leading slash are rejected.
    #[test]
    fn prop_relative_parameter_names_rejected(name in "[a-zA-Z0-9_.-][a-zA-Z0-9_./-]{0,30}") {
        prop_assert!(validate_parameter_name(&name).is_err(), "accepted {name}");
    }
}

// ============================================================================
// Derivation
// ============================================================================

proptest! {
    /// Derivation adds exactly the home volume and keeps everything else.
    #[test]
    fn prop_derivation_only_adds_home_volume(
        uid in 0u32..65535,
        gid in 0u32..65535,
        ap in "fsap-[0-9a-f]{17}",
    ) {
        let mut config = StackConfig::default();
        config.volume.posix = PosixIdentity { uid, gid, permissions: 0o755 };
        let placeholder = placeholder_descriptor(
            &config,
            "us-east-1",
            "arn:aws:iam::123456789012:role/jenkins-execution-role",
            "arn:aws:iam::123456789012:role/jenkins-task-role",
        );
        let derived = derive_with_volume(&placeholder, &volume(&ap, config.volume.posix))
            .expect("derivable");

        prop_assert!(derived.mounts(JENKINS_HOME_PATH));
        prop_assert_eq!(derived.volumes.len(), 1);
        prop_assert_eq!(&derived.family, &placeholder.family);
        prop_assert_eq!(derived.role_arns(), placeholder.role_arns());
        prop_assert_eq!(
            &derived.container_definitions[0].user,
            &Some(format!("{uid}:{gid}"))
        );
    }

    /// The fingerprint follows the access point, so a replaced access point
    /// always yields a new revision.
    #[test]
    fn prop_fingerprint_tracks_access_point(
        a in "fsap-[0-9a-f]{17}",
        b in "fsap-[0-9a-f]{17}",
    ) {
        let config = StackConfig::default();
        let placeholder = placeholder_descriptor(
            &config,
            "us-east-1",
            "arn:aws:iam::123456789012:role/jenkins-execution-role",
            "arn:aws:iam::123456789012:role/jenkins-task-role",
        );
        let posix = config.volume.posix;
        let first = fingerprint(&derive_with_volume(&placeholder, &volume(&a, posix)).expect("derive"))
            .expect("fingerprint");
        let again = fingerprint(&derive_with_volume(&placeholder, &volume(&a, posix)).expect("derive"))
            .expect("fingerprint");
        let other = fingerprint(&derive_with_volume(&placeholder, &volume(&b, posix)).expect("derive"))
            .expect("fingerprint");

        prop_assert_eq!(&first, &again);
        prop_assert_eq!(first == other, a == b);
    }
}

// ============================================================================
// Idempotent deploys
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Any number of repeated deploys leaves exactly the placeholder and one
    /// derived revision behind.
    #[test]
    fn prop_repeated_deploys_register_two_revisions(runs in 1usize..5) {
        let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
        rt.block_on(async {
            let platform = RecordingPlatform::seeded().await;
            let store = MemoryDeploymentStore::default();
            let config = StackConfig::default();
            for _ in 0..runs {
                deploy(&platform, &store, &config, &target(), DeployOptions::default(), &NullReporter)
                    .await
                    .expect("deploy");
            }
            let registrations = platform
                .calls()
                .into_iter()
                .filter(|c| *c == "register_task_definition")
                .count();
            prop_assert_eq!(registrations, 2);
            Ok(())
        })?;
    }
}
