//! Menu commands: cache refresh, reads, and the query/pagination surface.
//!
//! Query state is held per audience: a reset recomputes the filtered list
//! and the first page synchronously, `load_more` appends subsequent pages
//! until an input changes or the list is exhausted.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tauri::State;
use tracing::warn;

use crate::catalog::{
    self, filtered_and_sorted, group_by_category, Audience, FilterConfig, MenuItem, MenuPager,
    DEFAULT_PAGE_SIZE,
};
use crate::db::DbState;
use crate::helpers::{value_i64, value_str};
use crate::retry::with_retry;
use crate::session::{map_admin_api_error, SessionState};
use crate::api;

// ---------------------------------------------------------------------------
// Query state
// ---------------------------------------------------------------------------

struct QuerySlot {
    filtered: Vec<MenuItem>,
    pager: MenuPager,
    sort_by: catalog::SortBy,
}

/// Tauri managed state: one active query per audience.
#[derive(Default)]
pub struct MenuQueryState {
    slots: Mutex<HashMap<String, QuerySlot>>,
}

fn audience_of(payload: &Value) -> Audience {
    Audience::from_value(value_str(payload, &["audience"]).as_deref())
}

fn slot_key(audience: Audience) -> String {
    format!("{audience:?}").to_lowercase()
}

fn query_response(slot: &QuerySlot) -> Value {
    let displayed = slot.pager.displayed();
    let groups: Vec<Value> = group_by_category(displayed, slot.sort_by)
        .into_iter()
        .map(|(category, items)| {
            serde_json::json!({ "category": category, "items": items })
        })
        .collect();
    serde_json::json!({
        "items": displayed,
        "groups": groups,
        "hasNextPage": slot.pager.has_next_page(),
        "totalFiltered": slot.filtered.len(),
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Fetch the catalog for an audience and refresh the local cache. Admin
/// menus require the admin token.
#[tauri::command]
pub async fn menu_refresh(
    app: tauri::AppHandle,
    db: State<'_, DbState>,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let audience = audience_of(&payload);
    let token = match audience {
        Audience::Admin => Some(session.require_admin_token()?),
        _ => None,
    };
    catalog::refresh_menu(&db, audience, token.as_deref())
        .await
        .map_err(|e| match audience {
            Audience::Admin => map_admin_api_error(&app, &session, e),
            _ => e.to_string(),
        })
}

/// Raw cached catalog for an audience.
#[tauri::command]
pub fn menu_list(db: State<'_, DbState>, payload: Value) -> Vec<MenuItem> {
    catalog::cached_menu(&db, audience_of(&payload))
}

#[tauri::command]
pub fn menu_get_item(db: State<'_, DbState>, payload: Value) -> Result<MenuItem, String> {
    let item_id = value_str(&payload, &["itemId", "id"]).ok_or("Missing itemId")?;
    catalog::cached_menu(&db, audience_of(&payload))
        .into_iter()
        .find(|item| item.id == item_id)
        .ok_or_else(|| format!("Menu item {item_id} not found"))
}

/// Distinct categories in cache order, for the filter dropdown.
#[tauri::command]
pub fn menu_get_categories(db: State<'_, DbState>, payload: Value) -> Vec<String> {
    let items = catalog::cached_menu(&db, audience_of(&payload));
    let mut categories: Vec<String> = Vec::new();
    for item in &items {
        if let Some(category) = item.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            if !categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
                categories.push(category.to_string());
            }
        }
    }
    categories
}

/// Apply a (possibly changed) filter configuration: recompute the filtered
/// list and the first page synchronously.
#[tauri::command]
pub fn menu_query_reset(
    db: State<'_, DbState>,
    query: State<'_, MenuQueryState>,
    payload: Value,
) -> Result<Value, String> {
    let audience = audience_of(&payload);
    let config: FilterConfig = payload
        .get("config")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| format!("Invalid filter config: {e}"))?
        .unwrap_or_default();
    let page_size = value_i64(&payload, &["pageSize"])
        .map(|n| n.max(1) as usize)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let items = catalog::cached_menu(&db, audience);
    let filtered = filtered_and_sorted(&items, &config);

    let mut pager = MenuPager::new(page_size);
    pager.reset(&filtered);

    let slot = QuerySlot {
        filtered,
        pager,
        sort_by: config.sort_by,
    };
    let response = query_response(&slot);
    query
        .slots
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(slot_key(audience), slot);
    Ok(response)
}

/// Append the next page to the displayed list.
#[tauri::command]
pub fn menu_query_load_more(
    query: State<'_, MenuQueryState>,
    payload: Value,
) -> Result<Value, String> {
    let audience = audience_of(&payload);
    let mut slots = query.slots.lock().unwrap_or_else(|e| e.into_inner());
    let slot = slots
        .get_mut(&slot_key(audience))
        .ok_or("No active menu query; reset first")?;
    let filtered = slot.filtered.clone();
    slot.pager.load_more(&filtered);
    Ok(query_response(slot))
}

// ---------------------------------------------------------------------------
// Admin CRUD passthrough
// ---------------------------------------------------------------------------

/// Admin menu mutations go straight to the backend, then the admin cache
/// is refreshed so the next read sees the change.
async fn admin_menu_mutation(
    app: &tauri::AppHandle,
    db: &DbState,
    session: &SessionState,
    path: String,
    method: &'static str,
    body: Option<Value>,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    let resp = with_retry("menu_admin_mutation", || {
        api::request_with_method_str(Some(&token), &path, method, body.as_ref())
    })
    .await
    .map_err(|e| map_admin_api_error(app, session, e))?;

    if let Err(e) = catalog::refresh_menu(db, Audience::Admin, Some(&token)).await {
        warn!(error = %e, "admin cache refresh after mutation failed");
    }
    Ok(resp)
}

#[tauri::command]
pub async fn menu_admin_create(
    app: tauri::AppHandle,
    db: State<'_, DbState>,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    admin_menu_mutation(
        &app,
        &db,
        &session,
        "/api/menu".to_string(),
        "POST",
        Some(payload),
    )
    .await
}

#[tauri::command]
pub async fn menu_admin_update(
    app: tauri::AppHandle,
    db: State<'_, DbState>,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let item_id = value_str(&payload, &["itemId", "id"]).ok_or("Missing itemId")?;
    admin_menu_mutation(
        &app,
        &db,
        &session,
        format!("/api/menu/{item_id}"),
        "PUT",
        Some(payload),
    )
    .await
}

#[tauri::command]
pub async fn menu_admin_delete(
    app: tauri::AppHandle,
    db: State<'_, DbState>,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let item_id = value_str(&payload, &["itemId", "id"]).ok_or("Missing itemId")?;
    admin_menu_mutation(
        &app,
        &db,
        &session,
        format!("/api/menu/{item_id}"),
        "DELETE",
        None,
    )
    .await
}
