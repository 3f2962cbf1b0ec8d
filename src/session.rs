//! Auth session state for the admin and customer surfaces.
//!
//! Tokens live in the OS credential store; the in-memory state mirrors
//! them together with the signed-in user. A 401 from any admin-scoped
//! call invalidates the session and notifies the webview, which redirects
//! to the admin login route.

use serde_json::Value;
use std::sync::Mutex;
use tauri::Emitter;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::api::ApiError;
use crate::storage;

/// Event the webview listens on to redirect to the admin login route.
pub const SESSION_EXPIRED_EVENT: &str = "auth_session_expired";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: Value,
    pub token: String,
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

/// Tauri managed state. Admin and customer sessions are independent: an
/// admin terminal can stay signed in while a customer uses the kiosk flow.
pub struct SessionState {
    pub admin: Mutex<Option<AuthSession>>,
    pub customer: Mutex<Option<AuthSession>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            admin: Mutex::new(None),
            customer: Mutex::new(None),
        }
    }

    /// Rebuild sessions from stored tokens at startup. User details are
    /// refetched lazily by the webview; only the token survives a restart.
    pub fn rehydrate() -> Self {
        let state = Self::new();
        if let Some(token) = storage::get_admin_token() {
            info!("admin session rehydrated from credential store");
            *state.admin.lock().unwrap_or_else(|e| e.into_inner()) = Some(AuthSession {
                user: Value::Null,
                token,
            });
        }
        if let Some(token) = storage::get_customer_token() {
            *state.customer.lock().unwrap_or_else(|e| e.into_inner()) = Some(AuthSession {
                user: Value::Null,
                token,
            });
        }
        state
    }

    pub fn admin_token(&self) -> Option<String> {
        self.admin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.token.clone())
    }

    pub fn customer_token(&self) -> Option<String> {
        self.customer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.token.clone())
    }

    /// Admin-scoped calls require a bearer token.
    pub fn require_admin_token(&self) -> Result<String, String> {
        self.admin_token()
            .ok_or_else(|| "Not signed in as admin".to_string())
    }

    pub fn set_admin(&self, user: Value, token: String) {
        if let Err(e) = storage::set_credential(storage::KEY_ADMIN_TOKEN, &token) {
            warn!(error = %e, "failed to persist admin token");
        }
        *self.admin.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(AuthSession { user, token });
    }

    pub fn set_customer(&self, user: Value, token: String) {
        if let Err(e) = storage::set_credential(storage::KEY_CUSTOMER_TOKEN, &token) {
            warn!(error = %e, "failed to persist customer token");
        }
        *self.customer.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(AuthSession { user, token });
    }

    /// Drop both sessions and every stored token.
    pub fn clear(&self) {
        *self.admin.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.customer.lock().unwrap_or_else(|e| e.into_inner()) = None;
        if let Err(e) = storage::clear_tokens() {
            warn!(error = %e, "failed to clear stored tokens");
        }
    }

    pub fn admin_user(&self) -> Value {
        self.admin
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.user.clone())
            .unwrap_or(Value::Null)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an API failure at the command boundary. Unauthorized clears the
/// admin session and tells the webview to redirect; everything else
/// becomes the command's inline error message.
pub fn map_admin_api_error(app: &tauri::AppHandle, state: &SessionState, err: ApiError) -> String {
    if matches!(err, ApiError::Unauthorized) {
        warn!("admin token rejected, invalidating session");
        state.clear();
        let _ = app.emit(SESSION_EXPIRED_EVENT, serde_json::json!({ "scope": "admin" }));
    }
    err.to_string()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin_token() {
        let state = SessionState::new();
        assert!(state.require_admin_token().is_err());

        *state.admin.lock().unwrap() = Some(AuthSession {
            user: serde_json::json!({"name": "admin"}),
            token: "tok-1".to_string(),
        });
        assert_eq!(state.require_admin_token().unwrap(), "tok-1");
    }

    #[test]
    fn test_clear_drops_both_sessions() {
        let state = SessionState::new();
        *state.admin.lock().unwrap() = Some(AuthSession {
            user: Value::Null,
            token: "a".to_string(),
        });
        *state.customer.lock().unwrap() = Some(AuthSession {
            user: Value::Null,
            token: "c".to_string(),
        });
        state.clear();
        assert!(state.admin_token().is_none());
        assert!(state.customer_token().is_none());
    }
}
