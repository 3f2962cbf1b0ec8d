//! Client-side cart/session store.
//!
//! Single mutable state container for cart line items, the derived running
//! total, and the authenticated user + token. Every mutation writes the
//! whole blob through to the `local_settings` store so a restart never
//! loses cart or session state; the blob is rehydrated at startup.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::catalog::{MenuItem, PricingTier};
use crate::db::{self, DbState};
use crate::storage;

/// `local_settings` key holding the persisted cart/session blob.
const SESSION_BLOB_KEY: &str = "cart_state";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A menu item snapshot plus a positive quantity. At most one line exists
/// per item id; a line whose quantity reaches zero is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item: MenuItem,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self, tier: PricingTier) -> f64 {
        self.item.effective_price(tier) * self.quantity as f64
    }
}

/// Ordered collection of cart lines (display-insertion order) plus the
/// derived total. The total is recomputed after every mutation and never
/// trusted from storage without recomputation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub pricing_tier: PricingTier,
    #[serde(default)]
    pub total: f64,
}

impl Cart {
    fn recompute_total(&mut self) {
        // Zero-quantity lines never persist.
        self.lines.retain(|line| line.quantity > 0);
        self.total = self
            .lines
            .iter()
            .map(|line| line.line_total(self.pricing_tier))
            .sum();
    }

    /// Increment an existing line or append a new one. `qty` of zero adds
    /// nothing (and leaves no empty line behind).
    pub fn add_item(&mut self, item: MenuItem, qty: u32) {
        match self.lines.iter_mut().find(|l| l.item.id == item.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(qty),
            None => self.lines.push(CartLine {
                item,
                quantity: qty,
            }),
        }
        self.recompute_total();
    }

    /// Remove the line for `item_id`; no-op when absent.
    pub fn remove_item(&mut self, item_id: &str) {
        self.lines.retain(|l| l.item.id != item_id);
        self.recompute_total();
    }

    /// Replace a line's quantity. `qty <= 0` is equivalent to removal.
    pub fn update_quantity(&mut self, item_id: &str, qty: i64) {
        if qty <= 0 {
            self.remove_item(item_id);
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.item.id == item_id) {
            line.quantity = qty.min(u32::MAX as i64) as u32;
        }
        self.recompute_total();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.total = 0.0;
    }

    /// Switching the tier reprices every line.
    pub fn set_pricing_tier(&mut self, tier: PricingTier) {
        self.pricing_tier = tier;
        self.recompute_total();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The persisted blob: cart plus authenticated user and token.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CartSession {
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub token: Option<String>,
}

impl CartSession {
    /// Drop user and token, scrubbing the token bytes first.
    pub fn clear_auth(&mut self) {
        if let Some(token) = self.token.as_mut() {
            token.zeroize();
        }
        self.token = None;
        self.user = None;
    }
}

/// Tauri managed state wrapping the session.
pub struct CartState {
    pub session: Mutex<CartSession>,
}

impl CartState {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(CartSession::default()),
        }
    }
}

impl Default for CartState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Rehydrate the session blob from durable storage. The stored total is
/// discarded and recomputed; a token missing from the blob is reconciled
/// from the credential store (including the legacy key older builds used).
pub fn load(db: &DbState) -> CartSession {
    let raw = match db::read_local_json(db, SESSION_BLOB_KEY) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to read session blob, starting empty");
            Value::Null
        }
    };

    let mut session: CartSession = match serde_json::from_value(raw) {
        Ok(s) => s,
        Err(_) => CartSession::default(),
    };

    session.cart.recompute_total();

    if session.token.is_none() {
        if let Some(token) = storage::get_customer_token()
            .or_else(|| storage::get_credential(storage::KEY_LEGACY_TOKEN))
        {
            info!("session token reconciled from credential store");
            session.token = Some(token);
        }
    }

    session
}

/// Write the session blob through to durable storage.
pub fn persist(db: &DbState, session: &CartSession) -> Result<(), String> {
    let blob = serde_json::to_value(session).map_err(|e| format!("serialize session: {e}"))?;
    db::write_local_json(db, SESSION_BLOB_KEY, &blob)
}

/// Clear user/token from the store and from durable storage, leaving the
/// cart itself intact.
pub fn logout(db: &DbState, session: &mut CartSession) -> Result<(), String> {
    session.clear_auth();
    if let Err(e) = storage::clear_tokens() {
        warn!(error = %e, "failed to clear stored tokens");
    }
    persist(db, session)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::path::PathBuf;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        }
    }

    fn chai() -> MenuItem {
        MenuItem {
            id: "m1".to_string(),
            name: "Masala Chai".to_string(),
            price: 20.0,
            in_house_price: Some(15.0),
            stock: 10,
            available: true,
            ..Default::default()
        }
    }

    fn samosa() -> MenuItem {
        MenuItem {
            id: "m2".to_string(),
            name: "Samosa".to_string(),
            price: 12.5,
            stock: 10,
            available: true,
            ..Default::default()
        }
    }

    fn expected_total(cart: &Cart) -> f64 {
        cart.lines
            .iter()
            .map(|l| l.item.effective_price(cart.pricing_tier) * l.quantity as f64)
            .sum()
    }

    #[test]
    fn test_total_invariant_across_mutations() {
        let mut cart = Cart::default();

        cart.add_item(chai(), 2);
        assert_eq!(cart.total, expected_total(&cart));

        cart.add_item(samosa(), 3);
        assert_eq!(cart.total, expected_total(&cart));

        cart.update_quantity("m2", 1);
        assert_eq!(cart.total, expected_total(&cart));

        cart.remove_item("m1");
        assert_eq!(cart.total, expected_total(&cart));

        cart.set_pricing_tier(PricingTier::InHouse);
        assert_eq!(cart.total, expected_total(&cart));
    }

    #[test]
    fn test_no_duplicate_lines_for_same_item() {
        let mut cart = Cart::default();
        cart.add_item(chai(), 1);
        cart.add_item(chai(), 2);
        cart.add_item(chai(), 4);

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 7);
        assert_eq!(cart.total, 140.0);
    }

    #[test]
    fn test_zero_and_negative_quantity_removes_line() {
        let mut cart = Cart::default();
        cart.add_item(chai(), 2);

        cart.update_quantity("m1", 0);
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total, 0.0);

        cart.add_item(chai(), 2);
        cart.update_quantity("m1", -1);
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total, 0.0);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = Cart::default();
        cart.add_item(chai(), 1);
        cart.remove_item("nope");
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.total, 20.0);
    }

    #[test]
    fn test_in_house_tier_uses_alternate_price() {
        let mut cart = Cart::default();
        cart.set_pricing_tier(PricingTier::InHouse);
        cart.add_item(chai(), 2);
        assert_eq!(cart.total, 30.0);

        // Samosa has no in-house price; base applies.
        cart.add_item(samosa(), 2);
        assert_eq!(cart.total, 55.0);
    }

    #[test]
    fn test_add_zero_quantity_leaves_no_line() {
        let mut cart = Cart::default();
        cart.add_item(chai(), 0);
        assert!(cart.lines.is_empty());
    }

    #[test]
    fn test_persist_and_rehydrate() {
        let db = test_db();

        let mut session = CartSession::default();
        session.cart.add_item(chai(), 2);
        session.user = Some(serde_json::json!({"name": "Asha", "phone": "9876543210"}));
        persist(&db, &session).unwrap();

        let restored = load(&db);
        assert_eq!(restored.cart.lines.len(), 1);
        assert_eq!(restored.cart.lines[0].quantity, 2);
        assert_eq!(restored.cart.total, 40.0);
        assert_eq!(restored.user.unwrap()["name"], "Asha");
    }

    #[test]
    fn test_rehydrate_recomputes_stale_total() {
        let db = test_db();
        // A blob with a tampered total: the stored figure must be ignored.
        let blob = serde_json::json!({
            "cart": {
                "lines": [{"item": {"id": "m1", "name": "Chai", "price": 20.0}, "quantity": 2}],
                "pricingTier": "standard",
                "total": 9999.0
            }
        });
        db::write_local_json(&db, SESSION_BLOB_KEY, &blob).unwrap();

        let restored = load(&db);
        assert_eq!(restored.cart.total, 40.0);
    }

    #[test]
    fn test_clear_auth_scrubs_token() {
        let mut session = CartSession {
            token: Some("secret-token".to_string()),
            user: Some(serde_json::json!({"name": "Asha"})),
            ..Default::default()
        };
        session.clear_auth();
        assert!(session.token.is_none());
        assert!(session.user.is_none());
    }
}
