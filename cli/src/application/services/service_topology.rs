//! Load-balanced service pattern: load balancer, TLS listener, target group,
//! roles, placeholder task definition, service and DNS alias.
//!
//! Knows nothing about the volume. The placeholder it registers is replaced
//! later by the task definition override.

use anyhow::{Context, Result};
use cistack_common::{
    ClusterHandle, HEALTH_CHECK_PATH, HTTPS_PORT, RoleHandle, ServiceTopology, TargetGroupHandle,
    TaskDefinitionDescriptor,
};
use tracing::{debug, info};

use crate::application::ports::{
    DnsApi, IamApi, LoadBalancingApi, NetworkApi, ProgressReporter, ServiceApi,
    TaskDefinitionApi,
};
use crate::application::services::environment::ResolvedEnvironment;
use crate::domain::config::{CONTAINER_NAME, StackConfig};
use crate::domain::record::DeploymentRecord;
use crate::domain::resources::{
    AliasRecordSpec, Change, IngressRule, IngressSource, ListenerSpec, LoadBalancerSpec,
    ResourceChange, RoleSpec, ServiceSpec, StageOutput, TargetGroupSpec,
};
use crate::domain::task_definition::placeholder_descriptor;

/// Principal that assumes both task roles.
pub const TASKS_SERVICE_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

const ANYWHERE: &str = "0.0.0.0/0";

/// Build or update the service topology.
///
/// `recorded` is the previous deployment, used to keep the placeholder and
/// the already applied override revision stable across re-runs.
///
/// # Errors
///
/// Returns the first platform error, with the failing resource in context.
pub async fn build_service_topology(
    platform: &(
        impl NetworkApi + LoadBalancingApi + IamApi + TaskDefinitionApi + ServiceApi + DnsApi
    ),
    config: &StackConfig,
    region: &str,
    environment: &ResolvedEnvironment,
    cluster: &ClusterHandle,
    recorded: Option<&DeploymentRecord>,
    reporter: &impl ProgressReporter,
) -> Result<StageOutput<ServiceTopology>> {
    let network = &environment.network;
    let mut changes = Vec::new();
    reporter.step(&format!("building service {}...", config.service_name()));

    // Public entry point.
    let lb_group = platform
        .ensure_security_group(&config.load_balancer_security_group_name(), &network.vpc_id)
        .await
        .context("creating load balancer security group")?;
    changes.push(ResourceChange::new(
        "security_group",
        &lb_group.value,
        lb_group.change,
    ));
    let https = IngressRule {
        port: HTTPS_PORT,
        source: IngressSource::Cidr(ANYWHERE.to_string()),
    };
    let opened = platform.authorize_ingress(&lb_group.value, &https).await?;
    changes.push(ResourceChange::new(
        "ingress",
        format!("{}:{HTTPS_PORT}", lb_group.value),
        opened,
    ));

    let load_balancer = platform
        .upsert_load_balancer(&LoadBalancerSpec {
            name: config.load_balancer_name(),
            vpc_id: network.vpc_id.clone(),
            subnet_ids: network.subnet_ids.clone(),
            security_group_id: lb_group.value.clone(),
            internet_facing: true,
        })
        .await
        .context("creating load balancer")?;
    changes.push(ResourceChange::new(
        "load_balancer",
        &load_balancer.value.name,
        load_balancer.change,
    ));

    let target_group = platform
        .upsert_target_group(&TargetGroupSpec {
            name: config.target_group_name(),
            vpc_id: network.vpc_id.clone(),
            port: config.service.container_port,
            health_check_path: HEALTH_CHECK_PATH.to_string(),
        })
        .await
        .context("creating target group")?;
    changes.push(ResourceChange::new(
        "target_group",
        &target_group.value.name,
        target_group.change,
    ));

    let listener = platform
        .upsert_listener(&ListenerSpec {
            load_balancer_arn: load_balancer.value.arn.clone(),
            port: HTTPS_PORT,
            certificate_arn: environment.certificate.arn.clone(),
            target_group_arn: target_group.value.arn.clone(),
        })
        .await
        .context("creating HTTPS listener")?;
    changes.push(ResourceChange::new(
        "listener",
        &listener.value.arn,
        listener.change,
    ));

    // Tasks accept traffic from the load balancer only.
    let service_group = platform
        .ensure_security_group(&config.service_security_group_name(), &network.vpc_id)
        .await
        .context("creating service security group")?;
    changes.push(ResourceChange::new(
        "security_group",
        &service_group.value,
        service_group.change,
    ));
    let from_lb = IngressRule {
        port: config.service.container_port,
        source: IngressSource::SecurityGroup(lb_group.value.clone()),
    };
    let opened = platform
        .authorize_ingress(&service_group.value, &from_lb)
        .await?;
    changes.push(ResourceChange::new(
        "ingress",
        format!("{}:{}", service_group.value, from_lb.port),
        opened,
    ));

    let execution_role = ensure_role(platform, &config.execution_role_name(), &mut changes).await?;
    let task_role = ensure_role(platform, &config.task_role_name(), &mut changes).await?;

    let placeholder = placeholder_descriptor(config, region, &execution_role.arn, &task_role.arn);
    let placeholder_arn = ensure_placeholder(platform, &placeholder, recorded, &mut changes).await?;

    // An applied override stays live unless it no longer maps the configured
    // port; then the placeholder serves until the override is re-derived.
    let mut desired_task_definition = placeholder_arn.clone();
    if let Some(applied) = recorded.and_then(|r| r.task_override.as_ref())
        && maps_port(platform, &applied.revision_arn, config.service.container_port).await?
    {
        desired_task_definition.clone_from(&applied.revision_arn);
    }
    let service = platform
        .upsert_service(&ServiceSpec {
            name: config.service_name(),
            cluster_arn: cluster.arn.clone(),
            task_definition_arn: desired_task_definition,
            desired_count: config.service.desired_count,
            subnet_ids: network.subnet_ids.clone(),
            security_group_id: service_group.value.clone(),
            target_group_arn: target_group.value.arn.clone(),
            container_name: CONTAINER_NAME.to_string(),
            container_port: config.service.container_port,
        })
        .await
        .context("creating service")?;
    changes.push(ResourceChange::new(
        "service",
        &service.value.name,
        service.change,
    ));

    let previous = recorded.and_then(|r| r.topology.as_ref());
    if let Some(previous) = previous.filter(|t| t.target_group.arn != target_group.value.arn) {
        retire_target_group(
            platform,
            &previous.target_group,
            &service_group.value,
            &lb_group.value,
            config.service.container_port,
            &mut changes,
        )
        .await?;
    }

    let dns_record = platform
        .upsert_alias_record(&AliasRecordSpec {
            zone_id: environment.zone.zone_id.clone(),
            name: config.record_name(&environment.zone.zone_name),
            alias_target: load_balancer.value.dns_name.clone(),
        })
        .await
        .context("creating DNS alias record")?;
    changes.push(ResourceChange::new(
        "dns_record",
        &dns_record.value.name,
        dns_record.change,
    ));
    if let Some(stale) = previous.map(|t| &t.dns_record).filter(|r| {
        r.zone_id != dns_record.value.zone_id || r.name != dns_record.value.name
    }) {
        let deleted = platform
            .delete_record(&stale.zone_id, &stale.name)
            .await
            .with_context(|| format!("deleting DNS record {}", stale.name))?;
        info!(record = %stale.name, "removed previous DNS record");
        changes.push(ResourceChange::new("dns_record", &stale.name, deleted));
    }

    info!(
        service = %service.value.arn,
        placeholder = %placeholder_arn,
        record = %dns_record.value.name,
        "service topology ready"
    );
    reporter.success(&format!("service reachable at https://{}", dns_record.value.name));

    Ok(StageOutput::new(
        ServiceTopology {
            load_balancer: load_balancer.value,
            target_group: target_group.value,
            listener: listener.value,
            execution_role,
            task_role,
            placeholder_task_definition_arn: placeholder_arn,
            service: service.value,
            dns_record: dns_record.value,
        },
        changes,
    ))
}

async fn ensure_role(
    platform: &impl IamApi,
    name: &str,
    changes: &mut Vec<ResourceChange>,
) -> Result<RoleHandle> {
    let role = platform
        .ensure_role(&RoleSpec {
            name: name.to_string(),
            trusted_service: TASKS_SERVICE_PRINCIPAL.to_string(),
        })
        .await
        .with_context(|| format!("creating role {name}"))?;
    changes.push(ResourceChange::new("role", name, role.change));
    Ok(role.value)
}

async fn maps_port(platform: &impl TaskDefinitionApi, arn: &str, port: u16) -> Result<bool> {
    let Some(revision) = platform.describe_task_definition(arn).await? else {
        return Ok(false);
    };
    Ok(revision
        .descriptor
        .container_definitions
        .iter()
        .filter(|c| c.name == CONTAINER_NAME)
        .flat_map(|c| &c.port_mappings)
        .any(|p| p.container_port == port))
}

/// Remove the target group a port change left behind, once the listener and
/// service point at its successor, along with the ingress rule for its port.
async fn retire_target_group(
    platform: &(impl NetworkApi + LoadBalancingApi),
    old: &TargetGroupHandle,
    service_group_id: &str,
    lb_group_id: &str,
    current_port: u16,
    changes: &mut Vec<ResourceChange>,
) -> Result<()> {
    if old.port != current_port {
        let stale = IngressRule {
            port: old.port,
            source: IngressSource::SecurityGroup(lb_group_id.to_string()),
        };
        let revoked = platform.revoke_ingress(service_group_id, &stale).await?;
        changes.push(ResourceChange::new(
            "ingress",
            format!("{service_group_id}:{}", old.port),
            revoked,
        ));
    }
    let deleted = platform
        .delete_target_group(&old.arn)
        .await
        .with_context(|| format!("deleting target group {}", old.name))?;
    info!(target_group = %old.name, "retired target group");
    changes.push(ResourceChange::new("target_group", &old.name, deleted));
    Ok(())
}

/// Register the placeholder unless the recorded one already matches.
async fn ensure_placeholder(
    platform: &impl TaskDefinitionApi,
    desired: &TaskDefinitionDescriptor,
    recorded: Option<&DeploymentRecord>,
    changes: &mut Vec<ResourceChange>,
) -> Result<String> {
    let recorded_arn = recorded
        .and_then(|r| r.topology.as_ref())
        .map(|t| t.placeholder_task_definition_arn.as_str());
    if let Some(arn) = recorded_arn {
        let current = platform.describe_task_definition(arn).await?;
        if current.is_some_and(|c| c.descriptor == *desired) {
            debug!(%arn, "placeholder unchanged");
            changes.push(ResourceChange::new("task_definition", arn, Change::Unchanged));
            return Ok(arn.to_string());
        }
    }
    let registered = platform
        .register_task_definition(desired)
        .await
        .context("registering placeholder task definition")?;
    changes.push(ResourceChange::new(
        "task_definition",
        &registered.task_definition_arn,
        Change::Created,
    ));
    Ok(registered.task_definition_arn)
}
