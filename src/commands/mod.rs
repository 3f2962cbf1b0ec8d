//! IPC command handlers, grouped by surface. Each module adapts JSON
//! payloads from the webview into typed calls on the domain modules.

pub mod auth;
pub mod cart;
pub mod ledger;
pub mod menu;
pub mod orders;
pub mod print;
pub mod reviews;
pub mod settings;
