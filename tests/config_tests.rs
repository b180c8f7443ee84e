// ABOUTME: Tests for configuration loading and validation
// ABOUTME: Verifies TOML parsing, env var overrides, defaults, and rejection of bad values

use serial_test::serial;
use std::io::Write;

use parley::config::Config;

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    std::env::remove_var("PARLEY_CONFIG_PATH");
    std::env::remove_var("PARLEY_HOST");
    std::env::remove_var("PARLEY_PORT");
    std::env::remove_var("WORKSPACE_PATH");
    std::env::remove_var("MONITOR_INTERVAL_SECS");
    std::env::remove_var("MISSED_POLL_THRESHOLD");
    std::env::remove_var("REDELIVERY_DELAY_MS");
}

fn write_config(content: &str) -> std::path::PathBuf {
    let temp_dir = std::env::temp_dir().join(format!("parley-config-test-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&temp_dir);
    std::fs::create_dir_all(&temp_dir).unwrap();
    let config_path = temp_dir.join("config.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    config_path
}

#[test]
#[serial]
fn test_config_defaults_without_file() {
    clear_config_env_vars();
    std::env::set_var("PARLEY_CONFIG_PATH", "/nonexistent/config.toml");

    let config = Config::load().unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.workspace.path, "./workspace");
    assert_eq!(config.dispatch.monitor_interval_secs, 10);
    assert_eq!(config.dispatch.missed_poll_threshold, 3);
    assert_eq!(config.dispatch.redelivery_delay_ms, 500);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_config_loads_from_toml_file() {
    clear_config_env_vars();

    let config_path = write_config(
        r#"
[server]
host = "0.0.0.0"
port = 9000

[workspace]
path = "./test-workspace"

[dispatch]
monitor_interval_secs = 5
missed_poll_threshold = 2
redelivery_delay_ms = 100
"#,
    );
    std::env::set_var("PARLEY_CONFIG_PATH", config_path.to_str().unwrap());

    let config = Config::load().unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.workspace.path, "./test-workspace");
    assert_eq!(config.dispatch.monitor_interval_secs, 5);
    assert_eq!(config.dispatch.missed_poll_threshold, 2);
    assert_eq!(config.dispatch.redelivery_delay_ms, 100);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_vars_override_file_values() {
    clear_config_env_vars();

    let config_path = write_config(
        r#"
[server]
port = 9000
"#,
    );
    std::env::set_var("PARLEY_CONFIG_PATH", config_path.to_str().unwrap());
    std::env::set_var("PARLEY_PORT", "9999");
    std::env::set_var("MISSED_POLL_THRESHOLD", "7");

    let config = Config::load().unwrap();

    assert_eq!(config.server.port, 9999);
    assert_eq!(config.dispatch.missed_poll_threshold, 7);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_port_env_var_is_rejected() {
    clear_config_env_vars();
    std::env::set_var("PARLEY_CONFIG_PATH", "/nonexistent/config.toml");
    std::env::set_var("PARLEY_PORT", "not-a-port");

    assert!(Config::load().is_err());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_zero_monitor_interval_is_rejected() {
    clear_config_env_vars();
    std::env::set_var("PARLEY_CONFIG_PATH", "/nonexistent/config.toml");
    std::env::set_var("MONITOR_INTERVAL_SECS", "0");

    assert!(Config::load().is_err());

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_negative_threshold_is_rejected() {
    clear_config_env_vars();
    std::env::set_var("PARLEY_CONFIG_PATH", "/nonexistent/config.toml");
    std::env::set_var("MISSED_POLL_THRESHOLD", "-1");

    assert!(Config::load().is_err());

    clear_config_env_vars();
}
