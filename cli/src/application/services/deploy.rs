//! Deploy use-case: walk the stage graph wave by wave.
//!
//! Waves come from [`deploy_waves`]. Stages sharing a wave run concurrently.
//! The deployment record is saved after every wave that touched a resource,
//! so a failed run resumes from the physical identifiers already created.

use anyhow::Result;
use chrono::Utc;
use cistack_common::{ClusterHandle, ServiceTopology, VolumeHandle};
use serde::Serialize;
use tracing::{Instrument, info, info_span};

use crate::application::ports::{CloudPlatform, DeploymentStore, ProgressReporter};
use crate::application::services::environment::ResolvedEnvironment;
use crate::application::services::task_override::TaskDefinitionOverrideCoordinator;
use crate::application::services::{cluster, environment, service_topology, volume};
use crate::domain::config::{StackConfig, validate_stack_config};
use crate::domain::error::DeploymentError;
use crate::domain::record::{DeploymentRecord, TaskOverrideRecord};
use crate::domain::resources::{ResourceChange, StageOutput};
use crate::domain::stages::{Stage, deploy_waves};
use crate::domain::target::DeployTarget;

/// Options for a single deploy run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Allow destructive replacement of volume resources.
    pub allow_replacement: bool,
}

/// Outcome of a deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub target: DeployTarget,
    pub stack_name: String,
    pub service_task_definition: String,
    pub url: String,
    pub changes: Vec<ResourceChange>,
}

impl DeployReport {
    /// `true` if the run changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.iter().all(|c| !c.change.is_change())
    }
}

/// Deploy the stack described by `config` to `target`.
///
/// # Errors
///
/// Returns the first error of any stage. Waves already completed stay
/// recorded.
pub async fn deploy(
    platform: &impl CloudPlatform,
    store: &impl DeploymentStore,
    config: &StackConfig,
    target: &DeployTarget,
    options: DeployOptions,
    reporter: &impl ProgressReporter,
) -> Result<DeployReport> {
    validate_stack_config(config)?;

    let mut record = match store.load_async(target).await? {
        Some(r) if r.stack_name != config.stack_name => {
            return Err(DeploymentError::StackMismatch {
                recorded: r.stack_name,
                configured: config.stack_name.clone(),
            }
            .into());
        }
        Some(r) => r,
        None => DeploymentRecord::new(target.clone(), &config.stack_name),
    };
    let waves = deploy_waves().ok_or(DeploymentError::CyclicStages)?;
    let pass = Pass {
        platform,
        config,
        target,
        options,
        reporter,
    };
    let mut produced = Produced::default();
    let mut changes = Vec::new();

    for wave in waves {
        let finished = match wave.as_slice() {
            [stage] => vec![pass.run_stage(*stage, &produced, &record).await?],
            [a, b] => {
                let (x, y) = tokio::try_join!(
                    pass.run_stage(*a, &produced, &record),
                    pass.run_stage(*b, &produced, &record),
                )?;
                vec![x, y]
            }
            stages => {
                let mut out = Vec::with_capacity(stages.len());
                for stage in stages {
                    out.push(pass.run_stage(*stage, &produced, &record).await?);
                }
                out
            }
        };
        let mut touched = false;
        for output in finished {
            touched |= produced.absorb(output, &mut record, &mut changes);
        }
        if touched {
            save(store, &mut record).await?;
        }
    }

    let topology = needed(produced.topology.as_ref(), Stage::ServiceTopology)?;
    let service_task_definition = record
        .desired_task_definition()
        .unwrap_or_default()
        .to_string();
    info!(
        deploy_target = %target,
        changed = changes.iter().filter(|c| c.change.is_change()).count(),
        "deploy complete"
    );
    Ok(DeployReport {
        target: target.clone(),
        stack_name: config.stack_name.clone(),
        service_task_definition,
        url: format!("https://{}", topology.dns_record.name),
        changes,
    })
}

/// Everything a single stage needs besides the outputs of earlier waves.
struct Pass<'a, P, R> {
    platform: &'a P,
    config: &'a StackConfig,
    target: &'a DeployTarget,
    options: DeployOptions,
    reporter: &'a R,
}

/// Output of one stage, before it is folded into the record.
enum Finished {
    Environment(ResolvedEnvironment),
    Cluster(StageOutput<ClusterHandle>),
    Volume(StageOutput<VolumeHandle>),
    ServiceTopology(StageOutput<ServiceTopology>),
    TaskOverride(StageOutput<TaskOverrideRecord>),
}

/// Values produced by stages that already finished in this run.
#[derive(Default)]
struct Produced {
    environment: Option<ResolvedEnvironment>,
    cluster: Option<ClusterHandle>,
    volume: Option<VolumeHandle>,
    topology: Option<ServiceTopology>,
}

impl Produced {
    /// Fold a stage result in. Returns `true` if the record changed.
    fn absorb(
        &mut self,
        finished: Finished,
        record: &mut DeploymentRecord,
        changes: &mut Vec<ResourceChange>,
    ) -> bool {
        match finished {
            Finished::Environment(env) => {
                self.environment = Some(env);
                return false;
            }
            Finished::Cluster(out) => {
                changes.extend(out.changes);
                record.cluster = Some(out.value.clone());
                self.cluster = Some(out.value);
            }
            Finished::Volume(out) => {
                changes.extend(out.changes);
                record.volume = Some(out.value.clone());
                self.volume = Some(out.value);
            }
            Finished::ServiceTopology(out) => {
                changes.extend(out.changes);
                record.topology = Some(out.value.clone());
                self.topology = Some(out.value);
            }
            Finished::TaskOverride(out) => {
                changes.extend(out.changes);
                record.task_override = Some(out.value);
            }
        }
        true
    }
}

impl<P: CloudPlatform, R: ProgressReporter> Pass<'_, P, R> {
    async fn run_stage(
        &self,
        stage: Stage,
        produced: &Produced,
        record: &DeploymentRecord,
    ) -> Result<Finished> {
        self.execute(stage, produced, record)
            .instrument(info_span!("stage", stage = %stage))
            .await
    }

    async fn execute(
        &self,
        stage: Stage,
        produced: &Produced,
        record: &DeploymentRecord,
    ) -> Result<Finished> {
        match stage {
            Stage::Environment => {
                let env = environment::resolve(self.platform, self.config).await?;
                self.reporter.success(&format!(
                    "environment resolved (network {})",
                    env.network.vpc_id
                ));
                Ok(Finished::Environment(env))
            }
            Stage::Cluster => {
                let env = needed(produced.environment.as_ref(), Stage::Environment)?;
                let out =
                    cluster::provision_cluster(self.platform, self.config, &env.network, self.reporter)
                        .await?;
                Ok(Finished::Cluster(out))
            }
            Stage::Volume => {
                let env = needed(produced.environment.as_ref(), Stage::Environment)?;
                let out = volume::provision_volume(
                    self.platform,
                    self.config,
                    &env.network,
                    self.options.allow_replacement,
                    self.reporter,
                )
                .await?;
                Ok(Finished::Volume(out))
            }
            Stage::ServiceTopology => {
                let env = needed(produced.environment.as_ref(), Stage::Environment)?;
                let cluster = needed(produced.cluster.as_ref(), Stage::Cluster)?;
                let out = service_topology::build_service_topology(
                    self.platform,
                    self.config,
                    &self.target.region,
                    env,
                    cluster,
                    Some(record),
                    self.reporter,
                )
                .await?;
                Ok(Finished::ServiceTopology(out))
            }
            Stage::TaskOverride => {
                let topology = needed(produced.topology.as_ref(), Stage::ServiceTopology)?;
                let volume = needed(produced.volume.as_ref(), Stage::Volume)?;
                let out = TaskDefinitionOverrideCoordinator::new(self.platform, topology, volume)
                    .run(record.task_override.as_ref(), self.reporter)
                    .await?;
                Ok(Finished::TaskOverride(out))
            }
        }
    }
}

fn needed<T>(value: Option<&T>, stage: Stage) -> Result<&T> {
    let Some(value) = value else {
        return Err(DeploymentError::StageNotReady {
            stage: stage.to_string(),
        }
        .into());
    };
    Ok(value)
}

async fn save(store: &impl DeploymentStore, record: &mut DeploymentRecord) -> Result<()> {
    record.updated_at = Utc::now();
    store.save_async(record).await
}
