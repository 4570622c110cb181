//! Cluster provisioning and publication of its identity.

use anyhow::{Context, Result};
use cistack_common::{ClusterHandle, NetworkHandle};
use tracing::info;

use crate::application::ports::{ClusterApi, ParameterStore, ProgressReporter};
use crate::domain::config::StackConfig;
use crate::domain::error::PlatformError;
use crate::domain::resources::{Change, ResourceChange, StageOutput};

/// Create the cluster if absent, then publish its ARN and name.
///
/// # Errors
///
/// Returns `PlatformError::Conflict` if a cluster with the configured name
/// already exists in another network, or any platform error unchanged.
pub async fn provision_cluster(
    platform: &(impl ClusterApi + ParameterStore),
    config: &StackConfig,
    network: &NetworkHandle,
    reporter: &impl ProgressReporter,
) -> Result<StageOutput<ClusterHandle>> {
    let name = &config.cluster.name;
    reporter.step(&format!("ensuring cluster {name}..."));

    let (cluster, change) = match platform.describe_cluster(name).await? {
        Some(existing) if existing.vpc_id == network.vpc_id => (existing, Change::Unchanged),
        Some(existing) => {
            return Err(PlatformError::Conflict {
                kind: "cluster",
                id: name.clone(),
                reason: format!(
                    "exists in {}, configured network is {}",
                    existing.vpc_id, network.vpc_id
                ),
            }
            .into());
        }
        None => {
            let created = platform
                .create_cluster(name, &network.vpc_id)
                .await
                .with_context(|| format!("creating cluster {name}"))?;
            (created, Change::Created)
        }
    };
    info!(cluster = %cluster.arn, %change, "cluster ready");

    let mut changes = vec![ResourceChange::new("cluster", &cluster.name, change)];
    for (parameter, value) in [
        (&config.cluster.arn_parameter, &cluster.arn),
        (&config.cluster.name_parameter, &cluster.name),
    ] {
        let published = platform
            .put_parameter(parameter, value)
            .await
            .with_context(|| format!("publishing {parameter}"))?;
        changes.push(ResourceChange::new("parameter", parameter.as_str(), published));
    }

    reporter.success(&format!("cluster {} ready", cluster.name));
    Ok(StageOutput::new(cluster, changes))
}
