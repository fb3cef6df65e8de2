//! Tests for Config serialization, defaults and overrides

use std::collections::HashMap;
use webpilot_config::{AgentConfig, BrowserConfig, Config, KeepAliveConfig, OracleConfig};

fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_agent_defaults_match_loop_constants() {
    let agent = AgentConfig::default();

    assert_eq!(agent.max_iterations, 50);
    assert_eq!(agent.max_errors, 5);
    assert_eq!(agent.base_delay_ms, 2_000);
    assert_eq!(agent.max_delay_ms, 10_000);
    assert_eq!(agent.history_window, 7);
    assert_eq!(agent.loop_window, 5);
    assert_eq!(agent.loop_threshold, 3);
    assert_eq!(agent.sensor_retries, 3);
    assert_eq!(agent.wait_selector_timeout_s, 10);
    assert_eq!(agent.task_timeout_s, 900);
}

#[test]
fn test_oracle_defaults() {
    let oracle = OracleConfig::default();

    assert!(oracle.api_key.is_empty());
    assert!(oracle.api_base.is_none());
    assert_eq!(oracle.model, "gpt-4-turbo-preview");
    assert_eq!(oracle.max_tokens, 500);
}

#[test]
fn test_browser_and_keepalive_defaults() {
    let browser = BrowserConfig::default();
    assert!(!browser.headless);
    assert!(!browser.keep_open);
    assert_eq!(browser.start_url, "https://www.google.com");

    let keepalive = KeepAliveConfig::default();
    assert!(keepalive.enabled);
    assert_eq!(keepalive.interval_s, 30);
    assert_eq!(keepalive.probe_timeout_s, 5);
}

#[test]
fn test_partial_json_fills_defaults() {
    let json = r#"{ "agent": { "max_errors": 2 }, "oracle": { "api_key": "sk-test" } }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.agent.max_errors, 2);
    assert_eq!(config.agent.max_iterations, 50);
    assert_eq!(config.api_key(), Some("sk-test".to_string()));
    assert_eq!(config.browser.start_url, "https://www.google.com");
}

#[test]
fn test_empty_json_is_default() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.agent.loop_threshold, 3);
    assert!(!config.has_api_key());
}

#[test]
fn test_api_base_not_serialized_when_none() {
    let config = Config::default();
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("api_base"));
}

#[tokio::test]
async fn test_save_and_load_roundtrip() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.oracle.api_key = "sk-roundtrip".to_string();
    config.agent.max_iterations = 12;
    config.browser.headless = true;

    config.save_to(&path).await.unwrap();
    assert!(path.exists());

    let loaded = Config::load_from(&path).await.unwrap();
    assert_eq!(loaded.oracle.api_key, "sk-roundtrip");
    assert_eq!(loaded.agent.max_iterations, 12);
    assert!(loaded.browser.headless);
}

#[test]
fn test_env_overrides() {
    let vars: HashMap<&str, &str> = [
        ("OPENAI_API_KEY", "sk-env"),
        ("OPENAI_MODEL", "gpt-4o"),
        ("START_URL", "https://ya.ru"),
        ("KEEP_BROWSER_OPEN", "TRUE"),
        ("BROWSER_USER_DATA_DIR", "/tmp/profile"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    config.apply_env_from(|key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(config.oracle.api_key, "sk-env");
    assert_eq!(config.oracle.model, "gpt-4o");
    assert_eq!(config.browser.start_url, "https://ya.ru");
    assert!(config.browser.keep_open);
    assert_eq!(config.user_data_dir(), std::path::PathBuf::from("/tmp/profile"));
}

#[test]
fn test_empty_env_values_ignored() {
    let mut config = Config::default();
    config.oracle.api_key = "sk-file".to_string();

    config.apply_env_from(|key| match key {
        "OPENAI_API_KEY" => Some("   ".to_string()),
        _ => None,
    });

    assert_eq!(config.oracle.api_key, "sk-file");
}
