//! Ledger commands: debounced lookups, settlement recording, and user
//! listings with ledger totals.
//!
//! Lookups are typed into a phone field, so issuance waits out a quiet
//! period after the last keystroke. Each lookup takes a fresh generation
//! number and cancels its predecessor; only the response matching the
//! latest issued generation is applied, which closes the stale-response
//! race a bare cancelled-flag cannot.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tauri::State;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::billing;
use crate::helpers::{is_valid_phone, normalize_phone, value_i64, value_str};
use crate::ledger::{build_settlement_payload, BillingPeriod, Ledger};
use crate::retry::{with_retry, with_retry_strict};
use crate::session::{map_admin_api_error, SessionState};
use crate::api;

/// Quiet period after the last keystroke before a lookup is issued.
const LOOKUP_DEBOUNCE: Duration = Duration::from_millis(400);

/// Tauri managed state: the lookup generation counter and the handle used
/// to cancel a superseded in-flight debounce.
pub struct LedgerLookupState {
    generation: AtomicU64,
    cancel: Mutex<Option<CancellationToken>>,
}

impl LedgerLookupState {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            cancel: Mutex::new(None),
        }
    }
}

impl Default for LedgerLookupState {
    fn default() -> Self {
        Self::new()
    }
}

/// Claim a new lookup generation and wait out the debounce. Returns the
/// generation when this lookup is still the latest, `None` when it was
/// superseded (either cancelled outright or out-generationed).
async fn debounce_gate(state: &LedgerLookupState) -> Option<u64> {
    let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let token = CancellationToken::new();
    let previous = state
        .cancel
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .replace(token.clone());
    if let Some(previous) = previous {
        previous.cancel();
    }

    tokio::select! {
        _ = token.cancelled() => {
            debug!(generation, "lookup superseded during debounce");
            None
        }
        _ = tokio::time::sleep(LOOKUP_DEBOUNCE) => {
            if state.generation.load(Ordering::SeqCst) == generation {
                Some(generation)
            } else {
                None
            }
        }
    }
}

fn is_current(state: &LedgerLookupState, generation: u64) -> bool {
    state.generation.load(Ordering::SeqCst) == generation
}

/// Attach the computed account summary to a raw ledger response. The
/// server balance is authoritative when present; the summary labels its
/// source either way.
fn with_summary(raw: Value) -> Value {
    let ledger = Ledger::from_wire(&raw);
    let summary = billing::account_summary(
        ledger.balance,
        ledger.total_orders_amount,
        ledger.total_payments_amount,
    );
    serde_json::json!({
        "ledger": raw,
        "summary": summary,
    })
}

async fn lookup(
    app: &tauri::AppHandle,
    session: &SessionState,
    state: &LedgerLookupState,
    path: String,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;

    let Some(generation) = debounce_gate(state).await else {
        return Ok(serde_json::json!({ "stale": true }));
    };

    let resp = with_retry("ledger_lookup", || {
        api::request_with_method_str(Some(&token), &path, "GET", None)
    })
    .await
    .map_err(|e| map_admin_api_error(app, session, e))?;

    // A faster successor may have resolved while this one was in flight.
    if !is_current(state, generation) {
        debug!(generation, "dropping stale lookup response");
        return Ok(serde_json::json!({ "stale": true }));
    }

    let mut out = with_summary(resp);
    out["stale"] = Value::Bool(false);
    Ok(out)
}

#[tauri::command]
pub async fn ledger_customer_lookup(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    state: State<'_, LedgerLookupState>,
    payload: Value,
) -> Result<Value, String> {
    let phone = value_str(&payload, &["phone"]).ok_or("Missing phone")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }
    let path = format!("/api/ledgers/customer/{}", normalize_phone(&phone));
    lookup(&app, &session, &state, path).await
}

#[tauri::command]
pub async fn ledger_employee_lookup(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    state: State<'_, LedgerLookupState>,
    payload: Value,
) -> Result<Value, String> {
    let phone = value_str(&payload, &["phone"]).ok_or("Missing phone")?;
    if !is_valid_phone(&phone) {
        return Err("A valid phone number is required".to_string());
    }
    let month = value_i64(&payload, &["month"]).ok_or("Missing month")?;
    let year = value_i64(&payload, &["year"]).ok_or("Missing year")?;
    let period = BillingPeriod {
        month: month.clamp(0, 12) as u32,
        year: year.clamp(0, 9999) as i32,
    };
    if !period.is_valid() {
        return Err("Invalid billing period".to_string());
    }

    let path = format!(
        "/api/ledgers/employee/{}?month={}&year={}",
        normalize_phone(&phone),
        period.month,
        period.year
    );
    lookup(&app, &session, &state, path).await
}

/// Record a settlement and return the refreshed ledger.
#[tauri::command]
pub async fn ledger_record_settlement(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;

    let phone = value_str(&payload, &["phone"]).ok_or("Missing phone")?;
    let amount = crate::helpers::value_f64(&payload, &["amount"]).ok_or("Missing amount")?;
    let method = value_str(&payload, &["method"]).ok_or("Missing payment method")?;
    let note = value_str(&payload, &["note"]);
    let period = match (
        value_i64(&payload, &["month"]),
        value_i64(&payload, &["year"]),
    ) {
        (Some(month), Some(year)) => Some(BillingPeriod {
            month: month.clamp(0, 12) as u32,
            year: year.clamp(0, 9999) as i32,
        }),
        _ => None,
    };

    let body = build_settlement_payload(&phone, amount, &method, note.as_deref(), period)?;
    let resp = with_retry_strict("ledger_record_settlement", || {
        api::request_with_method_str(Some(&token), "/api/ledgers/settlements", "POST", Some(&body))
    })
    .await
    .map_err(|e| map_admin_api_error(&app, &session, e))?;

    info!(amount, "settlement recorded");
    Ok(with_summary(
        resp.get("ledger").cloned().unwrap_or(resp),
    ))
}

/// Users with order/payment totals, optionally filtered by role.
#[tauri::command]
pub async fn users_list(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    let path = match value_str(&payload, &["role"]) {
        Some(role) => format!("/api/users?includeTotals=true&role={role}"),
        None => "/api/users?includeTotals=true".to_string(),
    };
    with_retry("users_list", || {
        api::request_with_method_str(Some(&token), &path, "GET", None)
    })
    .await
    .map_err(|e| map_admin_api_error(&app, &session, e))
}

/// A user's orders together with their ledger summary.
#[tauri::command]
pub async fn user_orders_with_ledger(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    let user_id = value_str(&payload, &["userId", "id"]).ok_or("Missing userId")?;
    let path = format!("/api/users/{user_id}/orders?includeLedger=true");
    with_retry("user_orders_with_ledger", || {
        api::request_with_method_str(Some(&token), &path, "GET", None)
    })
    .await
    .map_err(|e| map_admin_api_error(&app, &session, e))
}

#[tauri::command]
pub async fn users_update(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    let user_id = value_str(&payload, &["userId", "id"]).ok_or("Missing userId")?;
    let path = format!("/api/users/{user_id}");
    with_retry_strict("users_update", || {
        api::request_with_method_str(Some(&token), &path, "PUT", Some(&payload))
    })
    .await
    .map_err(|e| map_admin_api_error(&app, &session, e))
}

#[tauri::command]
pub async fn users_delete(
    app: tauri::AppHandle,
    session: State<'_, SessionState>,
    payload: Value,
) -> Result<Value, String> {
    let token = session.require_admin_token()?;
    let user_id = value_str(&payload, &["userId", "id"]).ok_or("Missing userId")?;
    let path = format!("/api/users/{user_id}");
    with_retry_strict("users_delete", || {
        api::request_with_method_str(Some(&token), &path, "DELETE", None)
    })
    .await
    .map_err(|e| map_admin_api_error(&app, &session, e))
}
