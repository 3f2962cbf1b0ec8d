//! Feedback commands: gated submission, per-order and per-item reads,
//! eligibility, and update-mode prefill.

use serde_json::Value;
use tauri::State;
use tracing::info;

use crate::helpers::{is_valid_phone, normalize_phone, value_str};
use crate::retry::with_retry;
use crate::reviews::{build_submission_payload, prefill_drafts, ReviewSubmission};
use crate::session::SessionState;
use crate::api;

/// Submit feedback for an order. All gating (ratings in range, at least
/// one rated item) happens before anything reaches the network.
#[tauri::command]
pub async fn feedback_submit(
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let submission: ReviewSubmission =
        serde_json::from_value(payload).map_err(|e| format!("Invalid review payload: {e}"))?;
    let body = build_submission_payload(&submission)?;

    let token = session.customer_token();
    let resp = with_retry("feedback_submit", || {
        api::request_with_method_str(token.as_deref(), "/api/feedback", "POST", Some(&body))
    })
    .await
    .map_err(|e| e.to_string())?;

    info!(order_id = %submission.order_id, "feedback submitted");
    Ok(resp)
}

#[tauri::command]
pub async fn feedback_for_order(payload: Value) -> Result<Value, String> {
    let order_id = value_str(&payload, &["orderId", "id"]).ok_or("Missing orderId")?;
    let path = format!("/api/feedback/order/{order_id}");
    with_retry("feedback_for_order", || {
        api::request_with_method_str(None, &path, "GET", None)
    })
    .await
    .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn feedback_for_menu_item(payload: Value) -> Result<Value, String> {
    let item_id = value_str(&payload, &["menuItemId", "itemId"]).ok_or("Missing menuItemId")?;
    let path = format!("/api/feedback/menu-item/{item_id}");
    with_retry("feedback_for_menu_item", || {
        api::request_with_method_str(None, &path, "GET", None)
    })
    .await
    .map_err(|e| e.to_string())
}

/// Whether this phone may still review the order.
#[tauri::command]
pub async fn feedback_eligibility(payload: Value) -> Result<Value, String> {
    let order_id = value_str(&payload, &["orderId"]).ok_or("Missing orderId")?;
    let phone = value_str(&payload, &["phone"]).ok_or("Missing phone")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }
    let path = format!(
        "/api/feedback/eligibility?orderId={order_id}&phone={}",
        normalize_phone(&phone)
    );
    with_retry("feedback_eligibility", || {
        api::request_with_method_str(None, &path, "GET", None)
    })
    .await
    .map_err(|e| e.to_string())
}

/// Fetch existing reviews for an order and fold them into per-item drafts
/// keyed by (menu item, review type), for the edit screen.
#[tauri::command]
pub async fn feedback_drafts_for_order(payload: Value) -> Result<Value, String> {
    let order_id = value_str(&payload, &["orderId", "id"]).ok_or("Missing orderId")?;
    let path = format!("/api/feedback/order/{order_id}");
    let resp = with_retry("feedback_drafts_for_order", || {
        api::request_with_method_str(None, &path, "GET", None)
    })
    .await
    .map_err(|e| e.to_string())?;

    let records = resp
        .get("reviews")
        .or_else(|| resp.get("data"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_else(|| resp.as_array().cloned().unwrap_or_default());
    let drafts = prefill_drafts(&records);
    serde_json::to_value(drafts).map_err(|e| e.to_string())
}
