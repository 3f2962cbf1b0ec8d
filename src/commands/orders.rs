//! Order commands: placement (customer and admin), lookups, and the
//! single-step status workflow.
//!
//! A successful status transition emits `order_status_changed` after the
//! server acknowledgment; the print listener reacts to that event, so the
//! transition itself never depends on the print facility.

use serde_json::Value;
use tauri::{Emitter, State};
use tracing::info;

use crate::cart::{self, CartState};
use crate::db::DbState;
use crate::helpers::{is_valid_phone, normalize_phone, value_str};
use crate::orders::{build_placement_payload, OrderCreator, OrderStatus, PlacementDetails};
use crate::print::ORDER_STATUS_EVENT;
use crate::retry::{with_retry, with_retry_strict};
use crate::session::{map_admin_api_error, SessionState};
use crate::api;

/// Unwrap the order object out of a response, tolerating both the flat
/// and the wrapped shapes.
fn order_payload(resp: &Value) -> Value {
    resp.get("order")
        .or_else(|| resp.get("data"))
        .cloned()
        .unwrap_or_else(|| resp.clone())
}

async fn place(
    db: &DbState,
    cart_state: &CartState,
    token: Option<String>,
    payload: Value,
    created_by: OrderCreator,
    path: &str,
) -> Result<Value, String> {
    let details: PlacementDetails =
        serde_json::from_value(payload).map_err(|e| format!("Invalid order details: {e}"))?;

    // Validation runs against a cart snapshot; the store lock is not held
    // across the network call.
    let body = {
        let session = cart_state.session.lock().unwrap_or_else(|e| e.into_inner());
        build_placement_payload(&session.cart, &details, created_by)?
    };

    let resp = with_retry_strict("order_place", || {
        api::request_with_method_str(token.as_deref(), path, "POST", Some(&body))
    })
    .await
    .map_err(|e| e.to_string())?;

    // Cart clears only after the server accepted the order.
    let mut session = cart_state.session.lock().unwrap_or_else(|e| e.into_inner());
    session.cart.clear();
    cart::persist(db, &session)?;

    info!("order placed");
    Ok(order_payload(&resp))
}

#[tauri::command]
pub async fn order_place(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    place(
        &db,
        &cart_state,
        session.customer_token(),
        payload,
        OrderCreator::Customer,
        "/api/orders",
    )
    .await
}

#[tauri::command]
pub async fn order_place_admin(
    db: State<'_, DbState>,
    cart_state: State<'_, CartState>,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    place(
        &db,
        &cart_state,
        Some(token),
        payload,
        OrderCreator::Admin,
        "/api/orders/admin",
    )
    .await
}

#[tauri::command]
pub async fn order_get_by_id(payload: Value) -> Result<Value, String> {
    let order_id = value_str(&payload, &["orderId", "id"]).ok_or("Missing orderId")?;
    let path = format!("/api/orders/{order_id}");
    let resp = with_retry("order_get_by_id", || {
        api::request_with_method_str(None, &path, "GET", None)
    })
    .await
    .map_err(|e| e.to_string())?;
    Ok(order_payload(&resp))
}

#[tauri::command]
pub async fn order_get_by_customer_phone(payload: Value) -> Result<Value, String> {
    let phone = value_str(&payload, &["phone"]).ok_or("Missing phone")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }
    let path = format!("/api/orders/customer/{}", normalize_phone(&phone));
    with_retry("order_get_by_customer_phone", || {
        api::request_with_method_str(None, &path, "GET", None)
    })
    .await
    .map_err(|e| e.to_string())
}

/// Admin order list, optionally filtered by ordering channel and status.
#[tauri::command]
pub async fn order_list_admin(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    let mut query: Vec<String> = Vec::new();
    if let Some(channel) = value_str(&payload, &["channel"]) {
        query.push(format!("channel={channel}"));
    }
    if let Some(status) = value_str(&payload, &["status"]) {
        query.push(format!("status={status}"));
    }
    let path = if query.is_empty() {
        "/api/orders".to_string()
    } else {
        format!("/api/orders?{}", query.join("&"))
    };

    with_retry("order_list_admin", || {
        api::request_with_method_str(Some(&token), &path, "GET", None)
    })
    .await
    .map_err(|e| map_admin_api_error(&app, &session, e))
}

async fn push_status(
    app: &tauri::AppHandle,
    session: &SessionState,
    order_id: &str,
    next: OrderStatus,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    let path = format!("/api/orders/{order_id}/status");
    let body = serde_json::json!({ "status": next });
    let resp = with_retry_strict("order_update_status", || {
        api::request_with_method_str(Some(&token), &path, "PATCH", Some(&body))
    })
    .await
    .map_err(|e| map_admin_api_error(app, session, e))?;

    let order = order_payload(&resp);
    info!(order_id, status = next.as_str(), "order status updated");

    // Fire-and-forget: the print listener owns the side effects.
    let _ = app.emit(
        ORDER_STATUS_EVENT,
        serde_json::json!({ "order": order, "status": next }),
    );
    Ok(order)
}

/// Advance an order exactly one step along the status flow. Terminal
/// states reject the request before anything reaches the network.
#[tauri::command]
pub async fn order_advance_status(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let order_id = value_str(&payload, &["orderId", "id"]).ok_or("Missing orderId")?;
    let current = value_str(&payload, &["currentStatus", "status"])
        .and_then(|s| OrderStatus::parse(&s))
        .ok_or("Missing or unknown current status")?;
    let next = current
        .next()
        .ok_or_else(|| format!("Order is already {}", current.as_str()))?;

    push_status(&app, &session, &order_id, next).await
}

/// Cancel an order. Only offered while the order is still pending.
#[tauri::command]
pub async fn order_cancel(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let order_id = value_str(&payload, &["orderId", "id"]).ok_or("Missing orderId")?;
    let current = value_str(&payload, &["currentStatus", "status"])
        .and_then(|s| OrderStatus::parse(&s))
        .ok_or("Missing or unknown current status")?;
    if !current.can_transition_to(OrderStatus::Cancelled) {
        return Err(format!(
            "A {} order can no longer be cancelled",
            current.as_str()
        ));
    }

    push_status(&app, &session, &order_id, OrderStatus::Cancelled).await
}
