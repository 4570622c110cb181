//! Provisioning stages and the dependency graph between them.
//!
//! The graph is static. [`deploy_waves`] groups stages whose dependencies are
//! all satisfied by earlier waves; stages inside one wave may run
//! concurrently. Teardown walks the same order backwards.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Environment,
    Cluster,
    Volume,
    ServiceTopology,
    TaskOverride,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::Environment,
        Self::Cluster,
        Self::Volume,
        Self::ServiceTopology,
        Self::TaskOverride,
    ];

    /// Stages that must complete before this one starts.
    #[must_use]
    pub fn dependencies(self) -> &'static [Self] {
        match self {
            Self::Environment => &[],
            Self::Cluster | Self::Volume => &[Self::Environment],
            Self::ServiceTopology => &[Self::Environment, Self::Cluster],
            Self::TaskOverride => &[Self::Volume, Self::ServiceTopology],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Environment => "environment",
            Self::Cluster => "cluster",
            Self::Volume => "volume",
            Self::ServiceTopology => "service topology",
            Self::TaskOverride => "task definition override",
        };
        f.write_str(s)
    }
}

/// Layered topological order (Kahn's algorithm over [`Stage::ALL`]).
///
/// Returns `None` if the graph has a cycle.
#[must_use]
pub fn deploy_waves() -> Option<Vec<Vec<Stage>>> {
    let mut done: Vec<Stage> = Vec::new();
    let mut waves = Vec::new();
    while done.len() < Stage::ALL.len() {
        let wave: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|s| !done.contains(s))
            .filter(|s| s.dependencies().iter().all(|d| done.contains(d)))
            .collect();
        if wave.is_empty() {
            return None;
        }
        done.extend(&wave);
        waves.push(wave);
    }
    Some(waves)
}

/// Reverse of the deploy order, one stage at a time.
#[must_use]
pub fn teardown_order() -> Vec<Stage> {
    let mut order: Vec<Stage> = deploy_waves()
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect();
    order.reverse();
    order
}
