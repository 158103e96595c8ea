//! Configuration loading from files and environment variables.

use std::io::Write;

use serial_test::serial;

use searchlight_api::config::{AppConfig, ResultsMode};

const VARS: [&str; 8] = [
    "IDENTITY_PUBLIC_KEY",
    "IDENTITY_JWT_SECRET",
    "DATASTORE_URL",
    "DATASTORE_ANON_KEY",
    "EVENTS_SIGNING_KEY",
    "EVENTS_URL",
    "SEARCHLIGHT__RESULTS__MODE",
    "SEARCHLIGHT__SERVER__PORT",
];

fn clear_env() {
    for var in VARS {
        // SAFETY: tests touching the environment run under #[serial].
        unsafe { std::env::remove_var(var) };
    }
}

fn set_env(name: &str, value: &str) {
    // SAFETY: tests touching the environment run under #[serial].
    unsafe { std::env::set_var(name, value) };
}

#[test]
#[serial]
fn test_well_known_variables() {
    clear_env();
    set_env("DATASTORE_URL", "https://db.example.com");
    set_env("DATASTORE_ANON_KEY", "anon");
    set_env("EVENTS_SIGNING_KEY", "signkey-test");
    set_env("IDENTITY_JWT_SECRET", "dev-secret-with-enough-length");

    let config = AppConfig::load().unwrap();
    assert_eq!(config.datastore.url.as_deref(), Some("https://db.example.com"));
    assert_eq!(config.datastore.anon_key.as_deref(), Some("anon"));
    assert_eq!(config.events.signing_key.as_deref(), Some("signkey-test"));
    assert!(config.identity.is_configured());
    clear_env();
}

#[test]
#[serial]
fn test_prefixed_variables() {
    clear_env();
    set_env("SEARCHLIGHT__RESULTS__MODE", "live");
    set_env("SEARCHLIGHT__SERVER__PORT", "9191");

    let config = AppConfig::load().unwrap();
    assert_eq!(config.results.mode, ResultsMode::Live);
    assert_eq!(config.server.port, 9191);
    clear_env();
}

#[test]
#[serial]
fn test_config_file() {
    clear_env();
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[server]\nport = 7070\n\n[results]\nmode = \"live\"\ntimeout_secs = 3\n\n[logging]\nlevel = \"debug\"\njson = true"
    )
    .unwrap();

    let config = AppConfig::load_from(file.path().to_str()).unwrap();
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.results.timeout_secs, 3);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
}

#[test]
#[serial]
fn test_invalid_configuration_is_rejected() {
    clear_env();
    set_env("DATASTORE_URL", "https://db.example.com");

    let err = AppConfig::load().unwrap_err().to_string();
    assert!(err.contains("Configuration validation failed"), "{err}");
    clear_env();
}
