//! Cart commands. Every mutation writes the session blob through to
//! durable storage before returning, so a reload never loses the cart.

use serde_json::Value;
use tauri::State;

use crate::cart::{self, CartState};
use crate::catalog::{MenuItem, PricingTier};
use crate::db::DbState;
use crate::helpers::{value_i64, value_str};

fn cart_snapshot(state: &CartState) -> Value {
    let session = state.session.lock().unwrap_or_else(|e| e.into_inner());
    serde_json::to_value(&session.cart).unwrap_or(Value::Null)
}

#[tauri::command]
pub fn cart_get(cart_state: State<'_, CartState>) -> Value {
    cart_snapshot(&cart_state)
}

#[tauri::command]
pub fn cart_add_item(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
    payload: Value,
) -> Result<Value, String> {
    let item: MenuItem = serde_json::from_value(
        payload.get("item").cloned().ok_or("Missing item")?,
    )
    .map_err(|e| format!("Invalid menu item: {e}"))?;
    if item.id.trim().is_empty() {
        return Err("Menu item is missing an id".to_string());
    }
    let qty = value_i64(&payload, &["quantity", "qty"]).unwrap_or(1).max(0) as u32;

    let mut session = cart_state
        .session
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    session.cart.add_item(item, qty);
    cart::persist(&db, &session)?;
    serde_json::to_value(&session.cart).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn cart_remove_item(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
    payload: Value,
) -> Result<Value, String> {
    let item_id = value_str(&payload, &["itemId", "id"]).ok_or("Missing itemId")?;

    let mut session = cart_state
        .session
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    session.cart.remove_item(&item_id);
    cart::persist(&db, &session)?;
    serde_json::to_value(&session.cart).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn cart_update_quantity(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
    payload: Value,
) -> Result<Value, String> {
    let item_id = value_str(&payload, &["itemId", "id"]).ok_or("Missing itemId")?;
    let qty = value_i64(&payload, &["quantity", "qty"]).ok_or("Missing quantity")?;

    let mut session = cart_state
        .session
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    session.cart.update_quantity(&item_id, qty);
    cart::persist(&db, &session)?;
    serde_json::to_value(&session.cart).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn cart_clear(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
) -> Result<Value, String> {
    let mut session = cart_state
        .session
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    session.cart.clear();
    cart::persist(&db, &session)?;
    serde_json::to_value(&session.cart).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn cart_set_pricing_tier(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
    payload: Value,
) -> Result<Value, String> {
    let tier = PricingTier::from_value(value_str(&payload, &["tier", "pricingTier"]).as_deref());

    let mut session = cart_state
        .session
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    session.cart.set_pricing_tier(tier);
    cart::persist(&db, &session)?;
    serde_json::to_value(&session.cart).map_err(|e| e.to_string())
}
