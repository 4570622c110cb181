//! Infrastructure implementation of the `DeploymentStore` port.
//!
//! One JSON file per deploy target under `$CISTACK_HOME/deployments/`,
//! loaded and saved on `tokio::task::spawn_blocking` with atomic writes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::DeploymentStore;
use crate::domain::record::DeploymentRecord;
use crate::domain::target::DeployTarget;
use crate::infra::fs::{cistack_home, write_atomic};

/// Deployment record store: implements `DeploymentStore` for the infra layer.
#[derive(Debug, Clone)]
pub struct FileDeploymentStore {
    dir: PathBuf,
}

impl FileDeploymentStore {
    /// Store under `$CISTACK_HOME/deployments`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_dir(cistack_home()?.join("deployments")))
    }

    /// Store under an explicit directory (used in tests).
    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, target: &DeployTarget) -> PathBuf {
        self.dir.join(format!("{}.json", target.key()))
    }

    fn load_sync(path: &Path, target: &DeployTarget) -> Result<Option<DeploymentRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading deployment record {}", path.display()))?;
        let record: DeploymentRecord = serde_json::from_str(&content)
            .with_context(|| format!("parsing deployment record {}", path.display()))?;
        anyhow::ensure!(
            record.target == *target,
            "deployment record {} belongs to {}, not {target}",
            path.display(),
            record.target
        );
        Ok(Some(record))
    }
}

impl DeploymentStore for FileDeploymentStore {
    async fn load_async(&self, target: &DeployTarget) -> Result<Option<DeploymentRecord>> {
        let path = self.path_for(target);
        let target = target.clone();
        tokio::task::spawn_blocking(move || Self::load_sync(&path, &target))
            .await
            .context("state load task panicked")?
    }

    async fn save_async(&self, record: &DeploymentRecord) -> Result<()> {
        let path = self.path_for(&record.target);
        let content = serde_json::to_string_pretty(record).context("serializing deployment record")?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .context("state save task panicked")?
    }

    async fn clear_async(&self, target: &DeployTarget) -> Result<()> {
        let path = self.path_for(target);
        tokio::task::spawn_blocking(move || {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("removing deployment record {}", path.display()))?;
            }
            Ok::<(), anyhow::Error>(())
        })
        .await
        .context("state clear task panicked")?
    }
}
