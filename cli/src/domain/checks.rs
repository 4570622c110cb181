//! Stack verification types and pure check functions.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! The status service gathers observations from the platform; the functions
//! here turn each observation into a pass/fail check.

use cistack_common::{
    ACCESS_POINT_ROOT, AccessPointHandle, HEALTH_CHECK_PATH, HTTPS_PORT, JENKINS_HOME_PATH,
    PosixIdentity, TargetGroupHandle, TaskDefinitionDescriptor,
};
use serde::Serialize;

use crate::domain::permissions::NfsDirection;
use crate::domain::resources::ListenerDescription;
use crate::domain::target::DeployTarget;

// ── Types ─────────────────────────────────────────────────────────────────────

/// One verified invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackCheck {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl StackCheck {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Result of `cistack status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub target: DeployTarget,
    pub stack_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_task_definition: Option<String>,
    pub checks: Vec<StackCheck>,
}

impl StatusReport {
    /// Checks that failed.
    #[must_use]
    pub fn defects(&self) -> Vec<&StackCheck> {
        self.checks.iter().filter(|c| !c.ok).collect()
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }
}

// ── Checks ────────────────────────────────────────────────────────────────────

/// The service must reference the corrected revision, which must mount the
/// Jenkins home, and must not be the placeholder.
#[must_use]
pub fn check_override_applied(
    live_arn: Option<&str>,
    live_descriptor: Option<&TaskDefinitionDescriptor>,
    placeholder_arn: &str,
    recorded_arn: Option<&str>,
) -> StackCheck {
    const NAME: &str = "service uses corrected task definition";
    let Some(live) = live_arn else {
        return StackCheck::fail(NAME, "service not found");
    };
    if live == placeholder_arn {
        return StackCheck::fail(NAME, format!("service still references placeholder {live}"));
    }
    if let Some(recorded) = recorded_arn.filter(|r| *r != live) {
        return StackCheck::fail(
            NAME,
            format!("service references {live}, last override applied {recorded}"),
        );
    }
    match live_descriptor {
        Some(d) if d.mounts(JENKINS_HOME_PATH) => StackCheck::pass(NAME, live),
        Some(_) => StackCheck::fail(NAME, format!("{live} has no mount at {JENKINS_HOME_PATH}")),
        None => StackCheck::fail(NAME, format!("{live} is not registered")),
    }
}

/// Access point identity and root must match the configured values.
#[must_use]
pub fn check_access_point(
    access_point: Option<&AccessPointHandle>,
    expected: PosixIdentity,
) -> StackCheck {
    const NAME: &str = "access point identity";
    let Some(ap) = access_point else {
        return StackCheck::fail(NAME, "access point not found");
    };
    if ap.root_path != ACCESS_POINT_ROOT {
        return StackCheck::fail(NAME, format!("root is {}, expected {ACCESS_POINT_ROOT}", ap.root_path));
    }
    if ap.posix != expected {
        return StackCheck::fail(
            NAME,
            format!(
                "owner {}:{} mode {}, expected {}:{} mode {}",
                ap.posix.uid,
                ap.posix.gid,
                ap.posix.permissions_octal(),
                expected.uid,
                expected.gid,
                expected.permissions_octal()
            ),
        );
    }
    StackCheck::pass(
        NAME,
        format!(
            "{} uid/gid {}:{} mode {}",
            ap.root_path,
            ap.posix.uid,
            ap.posix.gid,
            ap.posix.permissions_octal()
        ),
    )
}

/// NFS must be open in both directions, or container mounts hang.
#[must_use]
pub fn check_nfs_reachability(missing: &[NfsDirection]) -> StackCheck {
    const NAME: &str = "nfs reachability (tcp/2049)";
    if missing.is_empty() {
        return StackCheck::pass(NAME, "open in both directions");
    }
    let closed: Vec<&str> = missing
        .iter()
        .map(|d| match d {
            NfsDirection::ServiceToVolume => "service → volume",
            NfsDirection::VolumeToService => "volume → service",
        })
        .collect();
    StackCheck::fail(NAME, format!("closed: {}", closed.join(", ")))
}

/// Every role must be passable by the deploying principal.
#[must_use]
pub fn check_pass_roles(principal: &str, roles: &[(String, bool)]) -> StackCheck {
    const NAME: &str = "pass-role grants";
    let missing: Vec<&str> = roles
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(role, _)| role.as_str())
        .collect();
    if roles.is_empty() {
        return StackCheck::fail(NAME, "task definition references no roles");
    }
    if missing.is_empty() {
        StackCheck::pass(NAME, format!("{principal} may pass {} roles", roles.len()))
    } else {
        StackCheck::fail(NAME, format!("{principal} may not pass {}", missing.join(", ")))
    }
}

/// A published discovery parameter must hold the expected value.
#[must_use]
pub fn check_published(name: &str, expected: &str, actual: Option<&str>) -> StackCheck {
    let check = format!("parameter {name}");
    match actual {
        Some(v) if v == expected => StackCheck::pass(&check, v),
        Some(v) => StackCheck::fail(&check, format!("holds {v}, expected {expected}")),
        None => StackCheck::fail(&check, "not published"),
    }
}

/// Target group health checks must hit the anonymous login page.
#[must_use]
pub fn check_health_check_path(target_group: Option<&TargetGroupHandle>) -> StackCheck {
    const NAME: &str = "health check path";
    match target_group {
        Some(tg) if tg.health_check_path == HEALTH_CHECK_PATH => {
            StackCheck::pass(NAME, tg.health_check_path.clone())
        }
        Some(tg) => StackCheck::fail(
            NAME,
            format!("{} checks {}, expected {HEALTH_CHECK_PATH}", tg.name, tg.health_check_path),
        ),
        None => StackCheck::fail(NAME, "target group not found"),
    }
}

/// The public listener terminates TLS on 443 with the configured
/// certificate and forwards to the service's target group.
#[must_use]
pub fn check_tls_listener(
    listener: Option<&ListenerDescription>,
    certificate_arn: Option<&str>,
    target_group_arn: &str,
) -> StackCheck {
    const NAME: &str = "https listener";
    let Some(observed) = listener else {
        return StackCheck::fail(NAME, "listener not found");
    };
    let handle = &observed.listener;
    if handle.port != HTTPS_PORT {
        return StackCheck::fail(
            NAME,
            format!("listening on {}, expected {HTTPS_PORT}", handle.port),
        );
    }
    match certificate_arn {
        Some(expected) if handle.certificate_arn == expected => {}
        Some(expected) => {
            return StackCheck::fail(
                NAME,
                format!("serves {}, configured certificate is {expected}", handle.certificate_arn),
            );
        }
        None => return StackCheck::fail(NAME, "certificate parameter is not set"),
    }
    if observed.target_group_arn != target_group_arn {
        return StackCheck::fail(
            NAME,
            format!("forwards to {}, expected {target_group_arn}", observed.target_group_arn),
        );
    }
    StackCheck::pass(NAME, format!("{HTTPS_PORT} with {}", handle.certificate_arn))
}
