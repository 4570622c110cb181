//! Application service: parameter store access for operators.

use anyhow::Result;

use crate::application::ports::ParameterStore;
use crate::application::services::environment::require_parameter;
use crate::domain::config::validate_parameter_name;
use crate::domain::resources::Change;

/// Read a parameter that must exist.
///
/// # Errors
///
/// Returns `ConfigError::MissingParameter` if it is not set.
pub async fn get(store: &impl ParameterStore, name: &str) -> Result<String> {
    require_parameter(store, name).await
}

/// Set a parameter, validating its name.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for a name that is not an absolute
/// path, or any store error.
pub async fn set(store: &impl ParameterStore, name: &str, value: &str) -> Result<Change> {
    validate_parameter_name(name)?;
    store.put_parameter(name, value).await
}

/// List parameters under `prefix`.
///
/// # Errors
///
/// Returns any store error.
pub async fn list(store: &impl ParameterStore, prefix: &str) -> Result<Vec<(String, String)>> {
    store.list_parameters(prefix).await
}
