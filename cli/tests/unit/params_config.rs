//! Parameter and configuration services.

#![allow(clippy::expect_used)]

use cistack_cli::application::ports::ConfigStore;
use cistack_cli::application::services::{config_service, params};
use cistack_cli::domain::error::ConfigError;
use cistack_cli::domain::resources::Change;
use cistack_cli::infra::platform::LocalPlatform;

use crate::helpers::{MemoryConfigStore, target};

#[tokio::test]
async fn set_then_get_parameter() {
    let platform = LocalPlatform::in_memory(target());
    let first = params::set(&platform, "/cistack/network/vpc-id", "vpc-0a1b2c3d")
        .await
        .expect("set");
    let again = params::set(&platform, "/cistack/network/vpc-id", "vpc-0a1b2c3d")
        .await
        .expect("set");
    let value = params::get(&platform, "/cistack/network/vpc-id")
        .await
        .expect("get");

    assert_eq!(first, Change::Created);
    assert_eq!(again, Change::Unchanged);
    assert_eq!(value, "vpc-0a1b2c3d");
}

#[tokio::test]
async fn relative_parameter_name_is_rejected() {
    let platform = LocalPlatform::in_memory(target());
    let err = params::set(&platform, "cistack/vpc", "vpc-0a1b2c3d")
        .await
        .expect_err("not absolute");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn missing_parameter_is_named() {
    let platform = LocalPlatform::in_memory(target());
    let err = params::get(&platform, "/cistack/dns/zone-id")
        .await
        .expect_err("unset");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MissingParameter { name }) if name == "/cistack/dns/zone-id"
    ));
}

#[tokio::test]
async fn list_filters_by_prefix() {
    let platform = LocalPlatform::in_memory(target());
    for (name, value) in [
        ("/cistack/dns/zone-id", "Z123ABC"),
        ("/cistack/dns/zone-name", "example.com"),
        ("/other/key", "x"),
    ] {
        params::set(&platform, name, value).await.expect("set");
    }
    let listed = params::list(&platform, "/cistack/dns").await.expect("list");
    let names: Vec<&str> = listed.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["/cistack/dns/zone-id", "/cistack/dns/zone-name"]);
}

#[test]
fn config_set_saves_valid_value() {
    let store = MemoryConfigStore::default();
    let config = config_service::set_value(&store, "service.memory", "2048").expect("set");
    assert_eq!(config.service.memory, 2048);
    assert_eq!(store.load().expect("load").service.memory, 2048);
}

#[test]
fn config_set_rejects_sizing_without_saving() {
    let store = MemoryConfigStore::default();
    let err = config_service::set_value(&store, "service.cpu", "4096").expect_err("memory too small");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::UnsupportedSizing { cpu: 4096, .. })
    ));
    assert!(store.config.lock().expect("lock").is_none());
}

#[test]
fn config_set_rejects_unknown_key() {
    let store = MemoryConfigStore::default();
    let err = config_service::set_value(&store, "service.replicas", "2").expect_err("unknown");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::UnknownKey { .. })
    ));
}
