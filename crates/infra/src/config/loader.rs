//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `NIMA_CLIENT_ID`: OAuth client identifier (required)
//! - `NIMA_REDIRECT_URI`: Redirect URI registered with the provider (required)
//! - `NIMA_AUTHORIZATION_ENDPOINT`: Hosted authorization page (required)
//! - `NIMA_TOKEN_ENDPOINT`: Code/refresh exchange endpoint (required)
//! - `NIMA_AUTH_PROVIDER`: Identity provider hint (default `authkit`)
//! - `NIMA_KEYCHAIN_SERVICE`: Keychain service name (default `Nima.auth`)
//! - `NIMA_LOGIN_TIMEOUT_SECS`: Seconds to wait for the browser redirect
//!   (default 300)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./nima.toml` or `./nima.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use nima_domain::constants::{
    DEFAULT_AUTH_PROVIDER, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_LOGIN_TIMEOUT_SECS,
};
use nima_domain::{AuthConfig, Config, NimaError, Result};
use url::Host;

const CONFIG_FILE_NAMES: [&str; 4] = ["nima.toml", "nima.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `NimaError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(env_err) => {
            tracing::debug!(error = %env_err, "Failed to load from environment, trying file");
            load_from_file(None).map_err(|file_err| {
                NimaError::Config(format!("{env_err}; {file_err}"))
            })
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `NimaError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<Config> {
    let client_id = env_var("NIMA_CLIENT_ID")?;
    let redirect_uri = env_var("NIMA_REDIRECT_URI")?;
    let authorization_endpoint = env_var("NIMA_AUTHORIZATION_ENDPOINT")?;
    let token_endpoint = env_var("NIMA_TOKEN_ENDPOINT")?;

    let provider = env_or("NIMA_AUTH_PROVIDER", DEFAULT_AUTH_PROVIDER);
    let keychain_service = env_or("NIMA_KEYCHAIN_SERVICE", DEFAULT_KEYCHAIN_SERVICE);
    let login_timeout_secs = match std::env::var("NIMA_LOGIN_TIMEOUT_SECS") {
        Ok(raw) => raw.trim().parse::<u64>().map_err(|e| {
            NimaError::Config(format!("Invalid NIMA_LOGIN_TIMEOUT_SECS: {e}"))
        })?,
        Err(_) => DEFAULT_LOGIN_TIMEOUT_SECS,
    };

    let config = Config {
        auth: AuthConfig {
            client_id,
            redirect_uri,
            authorization_endpoint,
            token_endpoint,
            provider,
            keychain_service,
            login_timeout_secs,
        },
    };
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// file extension.
///
/// # Errors
/// Returns `NimaError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing or empty
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(NimaError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            NimaError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| NimaError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| NimaError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| NimaError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(NimaError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn validate(config: &Config) -> Result<()> {
    let auth = &config.auth;
    for (name, value) in [
        ("client_id", &auth.client_id),
        ("redirect_uri", &auth.redirect_uri),
        ("authorization_endpoint", &auth.authorization_endpoint),
        ("token_endpoint", &auth.token_endpoint),
    ] {
        if value.trim().is_empty() {
            return Err(NimaError::Config(format!("auth.{name} must not be empty")));
        }
    }

    for (name, value) in [
        ("authorization_endpoint", &auth.authorization_endpoint),
        ("token_endpoint", &auth.token_endpoint),
    ] {
        url::Url::parse(value)
            .map_err(|e| NimaError::Config(format!("auth.{name} is not a valid URL: {e}")))?;
    }

    validate_redirect_uri(&auth.redirect_uri)
}

/// The system browser adapter serves the redirect on a local listener, so
/// the URI must be `http` on a loopback host with an explicit port.
fn validate_redirect_uri(raw: &str) -> Result<()> {
    let redirect = url::Url::parse(raw)
        .map_err(|e| NimaError::Config(format!("auth.redirect_uri is not a valid URL: {e}")))?;

    let loopback = match redirect.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    };

    if redirect.scheme() != "http" || !loopback || redirect.port().is_none() {
        return Err(NimaError::Config(format!(
            "auth.redirect_uri must be http on a loopback host with an explicit port, got {raw}"
        )));
    }

    Ok(())
}

/// Get required environment variable
///
/// # Errors
/// Returns `NimaError::Config` if the variable is not set or empty.
fn env_var(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(NimaError::Config(format!("Missing required environment variable: {key}"))),
    }
}

/// Optional environment variable with a default
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 7] = [
        "NIMA_CLIENT_ID",
        "NIMA_REDIRECT_URI",
        "NIMA_AUTHORIZATION_ENDPOINT",
        "NIMA_TOKEN_ENDPOINT",
        "NIMA_AUTH_PROVIDER",
        "NIMA_KEYCHAIN_SERVICE",
        "NIMA_LOGIN_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn set_required_env() {
        std::env::set_var("NIMA_CLIENT_ID", "client_123");
        std::env::set_var("NIMA_REDIRECT_URI", "http://127.0.0.1:8765/callback");
        std::env::set_var("NIMA_AUTHORIZATION_ENDPOINT", "https://auth.example.com/authorize");
        std::env::set_var("NIMA_TOKEN_ENDPOINT", "https://api.example.com/auth/token");
    }

    fn write_temp(contents: &str, extension: &str) -> (NamedTempFile, PathBuf) {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        (temp_file, path)
    }

    #[test]
    fn test_load_from_env_required_only() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required_env();

        let result = load_from_env();
        assert!(result.is_ok(), "Should load config from env vars, error: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.auth.client_id, "client_123");
        assert_eq!(config.auth.provider, DEFAULT_AUTH_PROVIDER);
        assert_eq!(config.auth.keychain_service, DEFAULT_KEYCHAIN_SERVICE);
        assert_eq!(config.auth.login_timeout_secs, DEFAULT_LOGIN_TIMEOUT_SECS);

        clear_env();
    }

    #[test]
    fn test_load_from_env_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required_env();
        std::env::set_var("NIMA_AUTH_PROVIDER", "GoogleOAuth");
        std::env::set_var("NIMA_KEYCHAIN_SERVICE", "Nima.staging");
        std::env::set_var("NIMA_LOGIN_TIMEOUT_SECS", "45");

        let config = load_from_env().unwrap();

        assert_eq!(config.auth.provider, "GoogleOAuth");
        assert_eq!(config.auth.keychain_service, "Nima.staging");
        assert_eq!(config.auth.login_timeout_secs, 45);

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required_env();
        std::env::remove_var("NIMA_TOKEN_ENDPOINT");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, NimaError::Config(ref msg) if msg.contains("NIMA_TOKEN_ENDPOINT")));

        clear_env();
    }

    #[test]
    fn test_load_from_env_invalid_timeout() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required_env();
        std::env::set_var("NIMA_LOGIN_TIMEOUT_SECS", "soon");

        let result = load_from_env();
        assert!(matches!(result, Err(NimaError::Config(_))), "Should be a Config error");

        clear_env();
    }

    #[test]
    fn test_load_from_env_invalid_endpoint() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required_env();
        std::env::set_var("NIMA_TOKEN_ENDPOINT", "not a url");

        assert!(matches!(load_from_env(), Err(NimaError::Config(_))));

        clear_env();
    }

    #[test]
    fn test_load_from_file_json() {
        let (_temp, path) = write_temp(
            r#"{
                "auth": {
                    "client_id": "client_json",
                    "redirect_uri": "http://localhost:8765/callback",
                    "authorization_endpoint": "https://auth.example.com/authorize",
                    "token_endpoint": "https://api.example.com/auth/token",
                    "login_timeout_secs": 60
                }
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).expect("Should load JSON config");

        assert_eq!(config.auth.client_id, "client_json");
        assert_eq!(config.auth.login_timeout_secs, 60);
        assert_eq!(config.auth.provider, DEFAULT_AUTH_PROVIDER);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let (_temp, path) = write_temp(
            r#"
[auth]
client_id = "client_toml"
redirect_uri = "http://127.0.0.1:8765/callback"
authorization_endpoint = "https://auth.example.com/authorize"
token_endpoint = "https://api.example.com/auth/token"
provider = "AppleOAuth"
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).expect("Should load TOML config");

        assert_eq!(config.auth.client_id, "client_toml");
        assert_eq!(config.auth.provider, "AppleOAuth");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_rejects_empty_required_field() {
        let (_temp, path) = write_temp(
            r#"
[auth]
client_id = ""
redirect_uri = "http://127.0.0.1:8765/callback"
authorization_endpoint = "https://auth.example.com/authorize"
token_endpoint = "https://api.example.com/auth/token"
"#,
            "toml",
        );

        let err = load_from_file(Some(path.clone())).unwrap_err();
        assert!(matches!(err, NimaError::Config(ref msg) if msg.contains("client_id")));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_env_rejects_non_loopback_redirect() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required_env();

        for redirect in [
            "nima://callback",
            "https://127.0.0.1:8765/callback",
            "http://example.com:8765/callback",
            "http://127.0.0.1/callback",
        ] {
            std::env::set_var("NIMA_REDIRECT_URI", redirect);
            let err = load_from_env().unwrap_err();
            assert!(
                matches!(err, NimaError::Config(ref msg) if msg.contains("redirect_uri")),
                "{redirect} should be rejected, got {err:?}"
            );
        }

        std::env::set_var("NIMA_REDIRECT_URI", "http://[::1]:8765/callback");
        assert!(load_from_env().is_ok());

        clear_env();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/nima.toml")));
        assert!(matches!(result, Err(NimaError::Config(_))), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let (_temp, path) = write_temp(r#"{ "auth": "#, "json");

        assert!(load_from_file(Some(path.clone())).is_err(), "Should fail with invalid JSON");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", &PathBuf::from("nima.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
