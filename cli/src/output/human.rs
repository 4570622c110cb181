//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::application::services::deploy::DeployReport;
use crate::application::services::destroy::DestroyReport;
use crate::application::services::revisions::RevisionEntry;
use crate::domain::checks::{StackCheck, StatusReport};
use crate::domain::config::StackConfig;
use crate::domain::resources::{Change, ResourceChange};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the result of `cistack deploy`.
    pub fn render_deploy(&self, report: &DeployReport) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.render_changes(&report.changes);
        println!();
        if report.is_noop() {
            self.ctx
                .success(&format!("{} is up to date on {}", report.stack_name, report.target));
        } else {
            self.ctx
                .success(&format!("Deployed {} to {}", report.stack_name, report.target));
        }
        self.ctx.kv("URL:            ", &report.url);
        self.ctx
            .kv("Task definition:", &report.service_task_definition);
    }

    /// Render the result of `cistack destroy`.
    pub fn render_destroy(&self, report: &DestroyReport) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.render_changes(&report.changes);
        if !report.retained.is_empty() {
            println!();
            self.ctx.header("Retained:");
            for item in &report.retained {
                println!("    {item}");
            }
        }
        println!();
        self.ctx.success(&format!("Destroyed stack on {}", report.target));
    }

    /// Render the result of `cistack status`. Defects are always shown.
    pub fn render_status(&self, report: &StatusReport) {
        if !self.ctx.quiet {
            println!();
            println!(
                "  {}",
                format!("{} on {}", report.stack_name, report.target).style(self.ctx.styles.header)
            );
            if let Some(arn) = &report.service_task_definition {
                self.ctx.kv("Task definition:", arn);
            }
            println!();
        }
        for check in &report.checks {
            self.print_check(check);
        }
        if !self.ctx.quiet {
            println!();
            let defects = report.defects().len();
            if defects == 0 {
                self.ctx.success("All checks passed");
            } else {
                self.ctx.warn(&format_defect_summary(defects));
            }
        }
    }

    /// Render registered revisions, oldest first.
    pub fn render_revisions(&self, entries: &[RevisionEntry]) {
        if entries.is_empty() {
            self.ctx.info("No revisions registered.");
            return;
        }
        for entry in entries {
            let line = format_revision_line(entry);
            if entry.live {
                println!("  {}", line.style(self.ctx.styles.bold));
            } else {
                println!("  {line}");
            }
        }
    }

    /// Print a parameter value bare, so it can be captured by a shell.
    pub fn render_parameter(&self, value: &str) {
        println!("{value}");
    }

    pub fn render_parameter_set(&self, name: &str, change: Change) {
        match change {
            Change::Unchanged => self.ctx.info(&format!("{name} already set")),
            _ => self.ctx.success(&format!("Set {name} ({change})")),
        }
    }

    pub fn render_parameters(&self, parameters: &[(String, String)]) {
        if parameters.is_empty() {
            self.ctx.info("No parameters found.");
            return;
        }
        let width = parameters.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
        for (name, value) in parameters {
            println!("  {name:<width$}  {value}");
        }
    }

    /// Render the current stack configuration.
    pub fn render_config(&self, config: &StackConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        println!("  {:<28} {}", "stack_name:", config.stack_name);
        println!("  {:<28} {}", "network.use_default:", config.network.use_default);
        println!("  {:<28} {}", "network.vpc_id_parameter:", config.network.vpc_id_parameter);
        println!("  {:<28} {}", "certificate.arn_parameter:", config.certificate.arn_parameter);
        println!("  {:<28} {}", "dns.zone_id_parameter:", config.dns.zone_id_parameter);
        println!("  {:<28} {}", "dns.zone_name_parameter:", config.dns.zone_name_parameter);
        println!("  {:<28} {}", "dns.subdomain:", config.dns.subdomain);
        println!("  {:<28} {}", "cluster.name:", config.cluster.name);
        println!("  {:<28} {}", "cluster.arn_parameter:", config.cluster.arn_parameter);
        println!("  {:<28} {}", "cluster.name_parameter:", config.cluster.name_parameter);
        println!("  {:<28} {}", "service.image:", config.service.image);
        println!("  {:<28} {}", "service.cpu:", config.service.cpu);
        println!("  {:<28} {}", "service.memory:", config.service.memory);
        println!("  {:<28} {}", "service.container_port:", config.service.container_port);
        println!("  {:<28} {}", "service.desired_count:", config.service.desired_count);
        println!("  {:<28} {}", "volume.uid:", config.volume.posix.uid);
        println!("  {:<28} {}", "volume.gid:", config.volume.posix.gid);
        println!(
            "  {:<28} {}",
            "volume.permissions:",
            config.volume.posix.permissions_octal()
        );
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["CISTACK_HOME", "CISTACK_CONFIG", "CISTACK_ACCOUNT", "CISTACK_REGION", "NO_COLOR"] {
            println!(
                "    {:<18} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!();
    }

    pub fn render_config_set(&self, key: &str, value: &str) {
        self.ctx.success(&format!("Set {key} = {value}"));
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        println!("cistack {version}");
    }

    fn render_changes(&self, changes: &[ResourceChange]) {
        for change in changes {
            let label = format!("{:<9}", change.change.to_string());
            let style = match change.change {
                Change::Created | Change::Replaced => self.ctx.styles.created,
                Change::Updated => self.ctx.styles.updated,
                Change::Deleted => self.ctx.styles.deleted,
                Change::Unchanged => self.ctx.styles.dim,
            };
            println!("  {} {:<20} {}", label.style(style), change.kind, change.id);
        }
    }

    fn print_check(&self, check: &StackCheck) {
        if check.ok {
            if !self.ctx.quiet {
                println!(
                    "    {} {}  {}",
                    "✓".style(self.ctx.styles.success),
                    check.name,
                    check.detail.style(self.ctx.styles.dim)
                );
            }
        } else {
            println!(
                "    {} {}  {}",
                "✗".style(self.ctx.styles.error),
                check.name,
                check.detail
            );
        }
    }
}

/// `r7  arn...  live` style line for one revision.
#[must_use]
pub fn format_revision_line(entry: &RevisionEntry) -> String {
    let mut tags = Vec::new();
    if entry.live {
        tags.push("live");
    }
    if entry.placeholder {
        tags.push("placeholder");
    }
    if !entry.mounts_home {
        tags.push("no volume");
    }
    let mut line = format!("r{:<4} {}", entry.revision, entry.arn);
    if !tags.is_empty() {
        line.push_str("  (");
        line.push_str(&tags.join(", "));
        line.push(')');
    }
    line
}

#[must_use]
pub fn format_defect_summary(count: usize) -> String {
    let noun = if count == 1 { "check" } else { "checks" };
    format!("{count} {noun} failed")
}
