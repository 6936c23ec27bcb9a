use std::collections::HashMap;

use super::*;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn empty_environment_yields_defaults() {
    let config = ServerConfig::from_lookup(lookup(&[])).expect("defaults");
    assert_eq!(config, ServerConfig::default());
    assert_eq!(config.port, 3000);
    assert_eq!(config.client_channel_capacity, 256);
    assert_eq!(config.default_board_id, "default");
    assert!(config.room_idle_ttl.is_none());
    assert_eq!(config.room_sweep_interval, Duration::from_secs(30));
}

#[test]
fn every_variable_is_read() {
    let config = ServerConfig::from_lookup(lookup(&[
        ("PORT", "8080"),
        ("CLIENT_CHANNEL_CAPACITY", "16"),
        ("DEFAULT_BOARD_ID", "lobby"),
        ("ROOM_IDLE_TTL_SECS", "600"),
        ("ROOM_SWEEP_INTERVAL_SECS", "5"),
    ]))
    .expect("config");

    assert_eq!(config.port, 8080);
    assert_eq!(config.client_channel_capacity, 16);
    assert_eq!(config.default_board_id, "lobby");
    assert_eq!(config.room_idle_ttl, Some(Duration::from_secs(600)));
    assert_eq!(config.room_sweep_interval, Duration::from_secs(5));
}

#[test]
fn invalid_port_is_an_error() {
    let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).expect_err("should fail");
    assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
}

#[test]
fn invalid_ttl_is_an_error() {
    let err = ServerConfig::from_lookup(lookup(&[("ROOM_IDLE_TTL_SECS", "-1")])).expect_err("should fail");
    assert!(matches!(err, ConfigError::Invalid { key: "ROOM_IDLE_TTL_SECS", .. }));
}

#[test]
fn zero_capacity_is_rejected() {
    let err = ServerConfig::from_lookup(lookup(&[("CLIENT_CHANNEL_CAPACITY", "0")])).expect_err("should fail");
    assert!(matches!(err, ConfigError::Invalid { key: "CLIENT_CHANNEL_CAPACITY", .. }));
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let config = ServerConfig::from_lookup(lookup(&[("PORT", " "), ("DEFAULT_BOARD_ID", ""), ("ROOM_IDLE_TTL_SECS", "")]))
        .expect("config");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.default_board_id, DEFAULT_BOARD_ID);
    assert!(config.room_idle_ttl.is_none());
}

#[test]
fn zero_ttl_is_allowed() {
    let config = ServerConfig::from_lookup(lookup(&[("ROOM_IDLE_TTL_SECS", "0")])).expect("config");
    assert_eq!(config.room_idle_ttl, Some(Duration::ZERO));
}
