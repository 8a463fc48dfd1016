//! Application constants
//!
//! Defaults applied when optional authentication settings are not provided.

/// Identity provider hint sent with the authorization request.
pub const DEFAULT_AUTH_PROVIDER: &str = "authkit";

/// Keychain service name under which credentials are stored.
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Nima.auth";

/// How long the host waits for the browser redirect before giving up.
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;
