//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use nima_infra::config;
use tempfile::NamedTempFile;

fn write_with_extension(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "auth": {
            "client_id": "client_json",
            "redirect_uri": "http://127.0.0.1:8765/callback",
            "authorization_endpoint": "https://auth.example.com/authorize",
            "token_endpoint": "https://api.example.com/auth/token",
            "login_timeout_secs": 90
        }
    }"#;
    let path = write_with_extension(json_content, "json");

    let result = config::load_from_file(Some(path.clone()));
    assert!(result.is_ok(), "Failed to load config from JSON file: {result:?}");

    let config = result.unwrap();
    assert_eq!(config.auth.client_id, "client_json");
    assert_eq!(config.auth.redirect_uri, "http://127.0.0.1:8765/callback");
    assert_eq!(config.auth.login_timeout_secs, 90);
    // Optional fields fall back to defaults
    assert_eq!(config.auth.provider, "authkit");
    assert_eq!(config.auth.keychain_service, "Nima.auth");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
[auth]
client_id = "client_toml"
redirect_uri = "http://localhost:9000/oauth/callback"
authorization_endpoint = "https://auth.example.com/authorize"
token_endpoint = "https://api.example.com/auth/token"
provider = "GoogleOAuth"
keychain_service = "Nima.auth.staging"
"#;
    let path = write_with_extension(toml_content, "toml");

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load TOML config");

    assert_eq!(config.auth.client_id, "client_toml");
    assert_eq!(config.auth.provider, "GoogleOAuth");
    assert_eq!(config.auth.keychain_service, "Nima.auth.staging");
    assert_eq!(config.auth.login_timeout_secs, 300);

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_missing_required_field() {
    let toml_content = r#"
[auth]
client_id = "client_toml"
redirect_uri = "http://localhost:9000/oauth/callback"
authorization_endpoint = "https://auth.example.com/authorize"
"#;
    let path = write_with_extension(toml_content, "toml");

    let result = config::load_from_file(Some(path.clone()));
    assert!(result.is_err(), "Config without token_endpoint must be rejected");

    std::fs::remove_file(path).ok();
}
