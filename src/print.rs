//! Delivery of rendered receipt documents to the host print facility.
//!
//! Two strategies: open a dedicated print window on the written document
//! and close it after a fixed delay, or — when window creation is refused
//! — open the same file in the system browser. Printing is best-effort:
//! every failure is logged and swallowed, and a status transition is never
//! rolled back because its print side effect failed.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tauri::{AppHandle, Listener, Manager, WebviewUrl, WebviewWindowBuilder};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{self, DbState};
use crate::orders::{Order, OrderStatus};
use crate::receipt_renderer::{
    render_combined_bill, render_kitchen_ticket, render_order_bill, LayoutConfig,
};

/// Event emitted after the server acknowledges a status transition.
pub const ORDER_STATUS_EVENT: &str = "order_status_changed";

/// How long the print window stays open before being torn down.
const PRINT_WINDOW_TTL: Duration = Duration::from_secs(6);

/// Directory name under the app data dir where receipt files are written.
const RECEIPTS_DIR: &str = "receipts";

// ---------------------------------------------------------------------------
// Layout config from settings
// ---------------------------------------------------------------------------

/// Build the receipt layout from the `receipt` settings category, falling
/// back to defaults field by field.
pub fn layout_config(db: &DbState) -> LayoutConfig {
    let defaults = LayoutConfig::default();
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(_) => return defaults,
    };
    LayoutConfig {
        cafe_name: db::get_setting(&conn, "receipt", "cafe_name").unwrap_or(defaults.cafe_name),
        address: db::get_setting(&conn, "receipt", "address").or(defaults.address),
        phone: db::get_setting(&conn, "receipt", "phone").or(defaults.phone),
        footer_text: db::get_setting(&conn, "receipt", "footer_text").or(defaults.footer_text),
        currency_symbol: db::get_setting(&conn, "receipt", "currency_symbol")
            .unwrap_or(defaults.currency_symbol),
        logo_png: None,
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

fn receipts_dir(app: &AppHandle) -> Result<PathBuf, String> {
    let dir = app
        .path()
        .app_data_dir()
        .map_err(|e| format!("app data dir: {e}"))?
        .join(RECEIPTS_DIR);
    fs::create_dir_all(&dir).map_err(|e| format!("create receipts dir: {e}"))?;
    Ok(dir)
}

/// Hand a rendered document to the host print facility. Never errors:
/// refusal (window blocked, no browser) degrades to a logged warning.
pub fn deliver_document(app: &AppHandle, kind: &str, html: &str) {
    let path = match receipts_dir(app) {
        Ok(dir) => dir.join(format!("{kind}-{}.html", Uuid::new_v4())),
        Err(e) => {
            warn!(kind, error = %e, "print skipped: no receipts directory");
            return;
        }
    };
    if let Err(e) = fs::write(&path, html) {
        warn!(kind, error = %e, "print skipped: could not write document");
        return;
    }

    let url = match tauri::Url::from_file_path(&path) {
        Ok(u) => u,
        Err(()) => {
            warn!(kind, path = %path.display(), "print skipped: unrepresentable path");
            return;
        }
    };

    // Strategy (a): dedicated print window, torn down after a fixed delay.
    let label = format!("print-{}", Uuid::new_v4().simple());
    match WebviewWindowBuilder::new(app, &label, WebviewUrl::External(url))
        .title("Printing…")
        .inner_size(420.0, 560.0)
        .build()
    {
        Ok(window) => {
            if let Err(e) = window.print() {
                // The document's own onload hook still asks for the dialog.
                warn!(kind, error = %e, "print dialog request failed");
            }
            info!(kind, label = %label, "print window opened");
            tauri::async_runtime::spawn(async move {
                tokio::time::sleep(PRINT_WINDOW_TTL).await;
                if let Err(e) = window.close() {
                    warn!(error = %e, "failed to close print window");
                }
            });
        }
        Err(e) => {
            // Strategy (b): fall back to the system browser.
            warn!(kind, error = %e, "print window refused, falling back to browser");
            if let Err(e) = webbrowser::open(&path.to_string_lossy()) {
                warn!(kind, error = %e, "print fallback failed, giving up silently");
            }
        }
    }
}

/// Render and deliver a kitchen ticket.
pub fn print_kitchen_ticket(app: &AppHandle, db: &DbState, order: &Order) {
    let html = render_kitchen_ticket(order, &layout_config(db));
    deliver_document(app, "kot", &html);
}

/// Render and deliver a single-order bill.
pub fn print_order_bill(app: &AppHandle, db: &DbState, order: &Order) {
    let html = render_order_bill(order, &layout_config(db));
    deliver_document(app, "bill", &html);
}

/// Render and deliver a combined bill for several orders.
pub fn print_combined_bill(app: &AppHandle, db: &DbState, orders: &[Order]) {
    let html = render_combined_bill(orders, &layout_config(db));
    deliver_document(app, "combined-bill", &html);
}

// ---------------------------------------------------------------------------
// Status transition listener
// ---------------------------------------------------------------------------

/// Subscribe print side effects to order status transitions: entering
/// `confirmed` prints the kitchen ticket, entering `completed` prints the
/// bill. The emitter fires only after the server acknowledged the
/// transition, and nothing here can fail the transition.
pub fn spawn_status_print_listener(app: &AppHandle) {
    let handle = app.clone();
    app.listen(ORDER_STATUS_EVENT, move |event| {
        let payload: serde_json::Value = match serde_json::from_str(event.payload()) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "ignoring malformed status event payload");
                return;
            }
        };
        let Some(status) = payload
            .get("status")
            .and_then(|s| s.as_str())
            .and_then(OrderStatus::parse)
        else {
            return;
        };
        let order: Order = match payload
            .get("order")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(order)) => order,
            _ => {
                warn!("status event without a usable order, skipping print");
                return;
            }
        };

        let db = handle.state::<DbState>();
        match status {
            OrderStatus::Confirmed => print_kitchen_ticket(&handle, &db, &order),
            OrderStatus::Completed => print_order_bill(&handle, &db, &order),
            _ => {}
        }
    });
    info!("print side effects subscribed to order status transitions");
}
