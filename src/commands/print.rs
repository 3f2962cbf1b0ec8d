//! Manual print commands (re-prints). Automatic prints ride the status
//! transition listener; these exist for the "print again" actions on the
//! order and ledger screens. All of them are best-effort and succeed even
//! when the print facility refuses.

use serde_json::Value;
use tauri::State;

use crate::db::DbState;
use crate::orders::Order;
use crate::print;

fn parse_order(value: Value) -> Result<Order, String> {
    serde_json::from_value(value).map_err(|e| format!("Invalid order payload: {e}"))
}

#[tauri::command]
pub fn kitchen_print_ticket(
    app: tauri::AppHandle,
    db: State<'_, DbState>,
    payload: Value,
) -> Result<Value, String> {
    let order = parse_order(payload.get("order").cloned().unwrap_or(payload))?;
    print::print_kitchen_ticket(&app, &db, &order);
    Ok(serde_json::json!({ "success": true }))
}

#[tauri::command]
pub fn order_print_bill(
    app: tauri::AppHandle,
    db: State<'_, DbState>,
    payload: Value,
) -> Result<Value, String> {
    let order = parse_order(payload.get("order").cloned().unwrap_or(payload))?;
    print::print_order_bill(&app, &db, &order);
    Ok(serde_json::json!({ "success": true }))
}

/// Combined bill over the selected orders.
#[tauri::command]
pub fn orders_print_combined_bill(
    app: tauri::AppHandle,
    db: State<'_, DbState>,
    payload: Value,
) -> Result<Value, String> {
    let raw = payload
        .get("orders")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if raw.is_empty() {
        return Err("Select at least one order to print".to_string());
    }
    let orders = raw
        .into_iter()
        .map(parse_order)
        .collect::<Result<Vec<Order>, String>>()?;
    print::print_combined_bill(&app, &db, &orders);
    Ok(serde_json::json!({ "success": true }))
}
