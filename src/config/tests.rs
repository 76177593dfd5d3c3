use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::load_config;
use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.service.jurisdiction, "AU");
    assert_eq!(
        settings.service.foreign_endpoint_url,
        "http://foreign-api-channel/incoming/messages"
    );
    assert_eq!(settings.worker.poll_interval_ms, 1000);
    assert_eq!(settings.worker.concurrency, 1);
    assert_eq!(settings.retry.max_attempts, 3);
    assert!(!settings.storage.in_memory);
}

#[test]
fn test_hub_url_joins_service_url_and_subscription_path() {
    let mut settings = Settings::default();
    assert_eq!(
        settings.hub_url(),
        "http://api-channel/messages/subscriptions/by_jurisdiction"
    );

    settings.service.service_url = "https://hub.example.org/".to_string();
    assert_eq!(
        settings.hub_url(),
        "https://hub.example.org/messages/subscriptions/by_jurisdiction"
    );
}

#[test]
fn test_retry_policy_follows_settings() {
    let mut settings = Settings::default();
    settings.retry.max_attempts = 5;
    let policy = settings.retry_policy();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.base_secs, 8);
    assert_eq!(policy.max_delay_secs, 100);
}

#[test]
#[serial]
fn test_load_config_without_sources_returns_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");
    assert_eq!(cfg.expect("load_config failed"), Settings::default());
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    // Run from a temporary directory so load_config picks up
    // config/default.toml from there.
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [service]
        jurisdiction = "SG"
        foreign_endpoint_url = "http://au-channel/incoming/messages"

        [retry]
        max_attempts = 5
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.service.jurisdiction, "SG");
    assert_eq!(
        cfg.service.foreign_endpoint_url,
        "http://au-channel/incoming/messages"
    );
    assert_eq!(cfg.service.name, "api-channel");
    assert_eq!(cfg.retry.max_attempts, 5);
    assert_eq!(cfg.retry.base_secs, 8);
}

#[test]
#[serial]
fn test_load_config_from_environment() {
    temp_env::with_vars(
        [
            ("CHANNELHUB__SERVER__PORT", Some("9100")),
            (
                "CHANNELHUB__SERVICE__FOREIGN_ENDPOINT_URL",
                Some("http://sg-channel/incoming/messages"),
            ),
            ("CHANNELHUB__STORAGE__IN_MEMORY", Some("true")),
            ("CHANNELHUB__WORKER__POLL_INTERVAL_MS", Some("250")),
            ("CHANNELHUB__WORKER__CONCURRENCY", Some("4")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(
                cfg.service.foreign_endpoint_url,
                "http://sg-channel/incoming/messages"
            );
            assert!(cfg.storage.in_memory);
            assert_eq!(cfg.worker.poll_interval_ms, 250);
            assert_eq!(cfg.worker.concurrency, 4);
            assert_eq!(cfg.server.host, "127.0.0.1");
        },
    );
}
