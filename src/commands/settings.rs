//! Settings commands: terminal configuration, theme, receipt layout
//! fields, and the consolidated customer profile accessor.

use serde_json::Value;
use tauri::State;
use tracing::info;

use crate::db::{self, DbState};
use crate::helpers::value_str;
use crate::profile::{self, CustomerProfile};
use crate::{api, storage};

/// Setting categories the webview may touch through the generic get/set.
const WRITABLE_CATEGORIES: &[&str] = &["ui", "receipt"];

#[tauri::command]
pub fn settings_get(db: State<'_, DbState>, payload: Value) -> Result<Value, String> {
    let category = value_str(&payload, &["category"]).ok_or("Missing category")?;
    let key = value_str(&payload, &["key"]).ok_or("Missing key")?;
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    Ok(match db::get_setting(&conn, &category, &key) {
        Some(v) => Value::String(v),
        None => Value::Null,
    })
}

#[tauri::command]
pub fn settings_set(db: State<'_, DbState>, payload: Value) -> Result<Value, String> {
    let category = value_str(&payload, &["category"]).ok_or("Missing category")?;
    if !WRITABLE_CATEGORIES.contains(&category.as_str()) {
        return Err(format!("Settings category {category} is not writable"));
    }
    let key = value_str(&payload, &["key"]).ok_or("Missing key")?;
    let value = value_str(&payload, &["value"]).ok_or("Missing value")?;
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    db::set_setting(&conn, &category, &key, &value)?;
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub fn theme_get(db: State<'_, DbState>) -> String {
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(_) => return "light".to_string(),
    };
    db::get_setting(&conn, "ui", "theme").unwrap_or_else(|| "light".to_string())
}

#[tauri::command]
pub fn theme_set(db: State<'_, DbState>, payload: Value) -> Result<Value, String> {
    let theme = value_str(&payload, &["theme"]).ok_or("Missing theme")?;
    if theme != "light" && theme != "dark" {
        return Err(format!("Unknown theme: {theme}"));
    }
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    db::set_setting(&conn, "ui", "theme", &theme)?;
    Ok(serde_json::json!({ "success": true }))
}

// ---------------------------------------------------------------------------
// Terminal configuration
// ---------------------------------------------------------------------------

#[tauri::command]
pub fn terminal_is_configured() -> bool {
    api::resolve_base_url().is_ok()
}

#[tauri::command]
pub fn terminal_get_base_url() -> Result<String, String> {
    api::resolve_base_url().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn terminal_set_base_url(payload: Value) -> Result<Value, String> {
    let url = value_str(&payload, &["url", "baseUrl"]).ok_or("Missing url")?;
    let normalized = api::normalize_base_url(&url);
    if normalized.is_empty() {
        return Err("Backend URL cannot be empty".to_string());
    }
    storage::set_credential(storage::KEY_API_BASE_URL, &normalized)?;
    info!(url = %normalized, "backend base URL updated");
    Ok(serde_json::json!({ "success": true, "url": normalized }))
}

// ---------------------------------------------------------------------------
// Customer profile (single accessor over the legacy blob)
// ---------------------------------------------------------------------------

#[tauri::command]
pub fn profile_get(db: State<'_, DbState>) -> Value {
    match profile::load(&db) {
        Some(p) => serde_json::to_value(p).unwrap_or(Value::Null),
        None => Value::Null,
    }
}

#[tauri::command]
pub fn profile_save(db: State<'_, DbState>, payload: Value) -> Result<Value, String> {
    let parsed: CustomerProfile =
        serde_json::from_value(payload).map_err(|e| format!("Invalid profile: {e}"))?;
    profile::save(&db, &parsed)?;
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub fn profile_clear(db: State<'_, DbState>) -> Result<Value, String> {
    profile::clear(&db)?;
    Ok(serde_json::json!({ "success": true }))
}
