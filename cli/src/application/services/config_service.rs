//! Application service: configuration use-cases.

use crate::application::ports::ConfigStore;
use crate::domain::config::{StackConfig, apply_config_value, validate_stack_config};
use anyhow::Result;

/// Load configuration.
pub fn load_config(store: &impl ConfigStore) -> Result<StackConfig> {
    store.load()
}

/// Save configuration.
pub fn save_config(store: &impl ConfigStore, config: &StackConfig) -> Result<()> {
    store.save(config)
}

/// Set one key, validate the resulting configuration as a whole, then save.
///
/// Nothing is written if the new value leaves the configuration invalid,
/// e.g. a CPU value whose current memory size Fargate rejects.
///
/// # Errors
///
/// Returns a `ConfigError` for an unknown key or invalid value, or any
/// store error.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<StackConfig> {
    let mut config = store.load()?;
    apply_config_value(&mut config, key, value)?;
    validate_stack_config(&config)?;
    store.save(&config)?;
    Ok(config)
}
