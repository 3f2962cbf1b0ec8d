//! Secure credential storage using the OS credential store.
//!
//! On Windows this uses DPAPI (via the `keyring` crate), on macOS Keychain,
//! and on Linux the Secret Service API. Holds the backend base URL and the
//! admin/customer auth tokens; everything else lives in SQLite.

use keyring::Entry;
use tracing::{info, warn};

const SERVICE_NAME: &str = "cafe-counter";

// Credential keys
pub const KEY_API_BASE_URL: &str = "api_base_url";
pub const KEY_ADMIN_TOKEN: &str = "admin_auth_token";
pub const KEY_CUSTOMER_TOKEN: &str = "customer_auth_token";
/// Pre-rewrite builds stored the admin token under this key. Still read as
/// a rehydration fallback, and cleared on logout.
pub const KEY_LEGACY_TOKEN: &str = "auth_token";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[
    KEY_API_BASE_URL,
    KEY_ADMIN_TOKEN,
    KEY_CUSTOMER_TOKEN,
    KEY_LEGACY_TOKEN,
];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential. Returns `None` when the entry does not
/// exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential. Silently succeeds if the entry does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

/// Admin token, falling back to the legacy key. When only the legacy key
/// holds a token it is migrated forward so future reads hit the canonical
/// key.
pub fn get_admin_token() -> Option<String> {
    if let Some(token) = get_credential(KEY_ADMIN_TOKEN) {
        return Some(token);
    }
    let legacy = get_credential(KEY_LEGACY_TOKEN)?;
    info!("migrating admin token from legacy storage key");
    if let Err(e) = set_credential(KEY_ADMIN_TOKEN, &legacy) {
        warn!(error = %e, "failed to migrate legacy token");
    }
    Some(legacy)
}

pub fn get_customer_token() -> Option<String> {
    get_credential(KEY_CUSTOMER_TOKEN)
}

/// Remove every stored auth token, canonical and legacy. Base URL survives.
pub fn clear_tokens() -> Result<(), String> {
    for key in [KEY_ADMIN_TOKEN, KEY_CUSTOMER_TOKEN, KEY_LEGACY_TOKEN] {
        delete_credential(key)?;
    }
    Ok(())
}

/// Delete every stored credential (factory reset).
pub fn factory_reset() -> Result<(), String> {
    info!("performing factory reset - deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(())
}
