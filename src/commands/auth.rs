//! Auth commands: admin login, customer login/register, OTP flow,
//! session inspection, logout.

use serde_json::Value;
use tauri::State;
use tracing::info;

use crate::cart::{self, CartState};
use crate::db::DbState;
use crate::helpers::{is_valid_phone, normalize_phone, value_str};
use crate::retry::with_retry;
use crate::session::{map_admin_api_error, SessionState};
use crate::{api, storage};

/// Pull `{ user, token }` out of a login response, tolerating both the
/// flat and the `data`-wrapped shapes the backend has shipped.
fn extract_user_and_token(resp: &Value) -> Result<(Value, String), String> {
    let root = resp.get("data").unwrap_or(resp);
    let token = value_str(root, &["token", "accessToken", "access_token"])
        .ok_or("Login response missing token")?;
    let user = root.get("user").cloned().unwrap_or(Value::Null);
    Ok((user, token))
}

#[tauri::command]
pub async fn auth_admin_login(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let username = value_str(&payload, &["username", "email"])
        .ok_or("Username is required")?;
    let password = value_str(&payload, &["password"]).ok_or("Password is required")?;

    let body = serde_json::json!({ "username": username, "password": password });
    let resp = with_retry("auth_admin_login", || {
        api::request_with_method_str(None, "/api/auth/login", "POST", Some(&body))
    })
    .await
    .map_err(|e| map_admin_api_error(&app, &session, e))?;

    let (user, token) = extract_user_and_token(&resp)?;
    session.set_admin(user.clone(), token);
    info!("admin signed in");
    Ok(user)
}

#[tauri::command]
pub async fn auth_otp_generate(payload: Value) -> Result<Value, String> {
    let phone = value_str(&payload, &["phone"]).ok_or("Phone is required")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }
    let body = serde_json::json!({ "phone": normalize_phone(&phone) });
    with_retry("auth_otp_generate", || {
        api::request_with_method_str(None, "/api/auth/otp/generate", "POST", Some(&body))
    })
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn auth_otp_verify(
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let phone = value_str(&payload, &["phone"]).ok_or("Phone is required")?;
    let otp = value_str(&payload, &["otp", "code"]).ok_or("OTP is required")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }

    let body = serde_json::json!({ "phone": normalize_phone(&phone), "otp": otp });
    let resp = with_retry("auth_otp_verify", || {
        api::request_with_method_str(None, "/api/auth/otp/verify", "POST", Some(&body))
    })
    .await
    .map_err(|e| e.to_string())?;

    let (user, token) = extract_user_and_token(&resp)?;
    session.set_customer(user.clone(), token);
    Ok(user)
}

#[tauri::command]
pub async fn customer_login(
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let phone = value_str(&payload, &["phone"]).ok_or("Phone is required")?;
    let password = value_str(&payload, &["password"]).ok_or("Password is required")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }

    let body = serde_json::json!({ "phone": normalize_phone(&phone), "password": password });
    let resp = with_retry("customer_login", || {
        api::request_with_method_str(None, "/api/customers/login", "POST", Some(&body))
    })
    .await
    .map_err(|e| e.to_string())?;

    let (user, token) = extract_user_and_token(&resp)?;
    session.set_customer(user.clone(), token);
    Ok(user)
}

#[tauri::command]
pub async fn customer_register(payload: Value) -> Result<Value, String> {
    let name = value_str(&payload, &["name"]).ok_or("Name is required")?;
    let phone = value_str(&payload, &["phone"]).ok_or("Phone is required")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }
    let password = value_str(&payload, &["password"]).ok_or("Password is required")?;

    let body = serde_json::json!({
        "name": name,
        "phone": normalize_phone(&phone),
        "password": password,
        "email": value_str(&payload, &["email"]),
    });
    with_retry("customer_register", || {
        api::request_with_method_str(None, "/api/customers/register", "POST", Some(&body))
    })
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn customer_change_password(
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session
        .customer_token()
        .ok_or("Not signed in as customer")?;
    let current = value_str(&payload, &["currentPassword"]).ok_or("Current password required")?;
    let next = value_str(&payload, &["newPassword"]).ok_or("New password required")?;

    let body = serde_json::json!({ "currentPassword": current, "newPassword": next });
    with_retry("customer_change_password", || {
        api::request_with_method_str(
            Some(&token),
            "/api/customers/change-password",
            "POST",
            Some(&body),
        )
    })
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn customer_get_profile(session: State<'_, SessionState>) -> Result<Value, String> {
    let token = session
        .customer_token()
        .ok_or("Not signed in as customer")?;
    with_retry("customer_get_profile", || {
        api::request_with_method_str(Some(&token), "/api/customers/profile", "GET", None)
    })
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn auth_get_session(session: State<'_, SessionState>) -> Value {
    serde_json::json!({
        "admin": session.admin_user(),
        "adminSignedIn": session.admin_token().is_some(),
        "customerSignedIn": session.customer_token().is_some(),
    })
}

/// Whether the terminal can make admin-scoped calls at all. The routing
/// guard in the webview consults this before entering admin routes.
#[tauri::command]
pub fn auth_is_admin(session: State<'_, SessionState>) -> bool {
    session.admin_token().is_some()
}

#[tauri::command]
pub fn auth_logout(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
    session: State<'_, SessionState>,
) -> Result<Value, String> {
    session.clear();
    let mut blob = cart_state
        .session
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    cart::logout(&db, &mut blob)?;
    info!("signed out, session cleared");
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub fn auth_factory_reset(session: State<'_, SessionState>) -> Result<Value, String> {
    session.clear();
    storage::factory_reset()?;
    Ok(serde_json::json!({ "success": true }))
}
