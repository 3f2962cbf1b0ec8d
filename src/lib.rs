#![recursion_limit = "256"]

//! Cafe Counter - Tauri v2 Backend
//!
//! This module registers all IPC command handlers the webview calls via
//! `@tauri-apps/api/core::invoke()`, and wires managed state: the SQLite
//! store, the cart/session blob, auth sessions, and the menu query engine.

use tracing::info;

mod api;
mod billing;
mod cart;
mod catalog;
mod commands;
mod db;
mod helpers;
mod ledger;
mod logging;
mod orders;
mod print;
mod profile;
mod receipt_renderer;
mod retry;
mod reviews;
mod session;
mod storage;

// ============================================================================
// App entry point
// ============================================================================

pub fn run() {
    let guard = logging::init();
    // Keep the guard alive for the lifetime of the app — dropping it
    // flushes logs. We leak it intentionally since the app runs until
    // process exit.
    std::mem::forget(guard);

    info!("Starting Cafe Counter v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .setup(|app| {
            use tauri::Manager;

            let app_data_dir = app
                .path()
                .app_data_dir()
                .expect("Failed to get app data dir");

            let db_state = db::init(&app_data_dir).expect("Failed to initialize database");

            // Rehydrate the persisted cart/session blob before anything
            // can mutate it.
            let cart_state = cart::CartState::new();
            *cart_state.session.lock().expect("fresh cart lock") = cart::load(&db_state);
            app.manage(cart_state);

            app.manage(db_state);
            app.manage(session::SessionState::rehydrate());
            app.manage(commands::menu::MenuQueryState::default());
            app.manage(commands::ledger::LedgerLookupState::new());

            // Print side effects react to status transitions; they are
            // never part of the transition itself.
            print::spawn_status_print_listener(app.handle());

            info!("Database, session, and print listener registered");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Auth
            commands::auth::auth_admin_login,
            commands::auth::auth_otp_generate,
            commands::auth::auth_otp_verify,
            commands::auth::auth_get_session,
            commands::auth::auth_is_admin,
            commands::auth::auth_logout,
            commands::auth::auth_factory_reset,
            commands::auth::customer_login,
            commands::auth::customer_register,
            commands::auth::customer_change_password,
            commands::auth::customer_get_profile,
            // Menu
            commands::menu::menu_refresh,
            commands::menu::menu_list,
            commands::menu::menu_get_item,
            commands::menu::menu_get_categories,
            commands::menu::menu_query_reset,
            commands::menu::menu_query_load_more,
            commands::menu::menu_admin_create,
            commands::menu::menu_admin_update,
            commands::menu::menu_admin_delete,
            // Cart
            commands::cart::cart_get,
            commands::cart::cart_add_item,
            commands::cart::cart_remove_item,
            commands::cart::cart_update_quantity,
            commands::cart::cart_clear,
            commands::cart::cart_set_pricing_tier,
            // Orders
            commands::orders::order_place,
            commands::orders::order_place_admin,
            commands::orders::order_get_by_id,
            commands::orders::order_get_by_customer_phone,
            commands::orders::order_list_admin,
            commands::orders::order_advance_status,
            commands::orders::order_cancel,
            // Ledgers / users
            commands::ledger::ledger_customer_lookup,
            commands::ledger::ledger_employee_lookup,
            commands::ledger::ledger_record_settlement,
            commands::ledger::users_list,
            commands::ledger::user_orders_with_ledger,
            commands::ledger::users_update,
            commands::ledger::users_delete,
            // Feedback
            commands::reviews::feedback_submit,
            commands::reviews::feedback_for_order,
            commands::reviews::feedback_for_menu_item,
            commands::reviews::feedback_eligibility,
            commands::reviews::feedback_drafts_for_order,
            // Print
            commands::print::kitchen_print_ticket,
            commands::print::order_print_bill,
            commands::print::orders_print_combined_bill,
            // Settings / profile
            commands::settings::settings_get,
            commands::settings::settings_set,
            commands::settings::theme_get,
            commands::settings::theme_set,
            commands::settings::terminal_is_configured,
            commands::settings::terminal_get_base_url,
            commands::settings::terminal_set_base_url,
            commands::settings::profile_get,
            commands::settings::profile_save,
            commands::settings::profile_clear,
        ])
        .run(tauri::generate_context!())
        .expect("error while running Cafe Counter");
}
