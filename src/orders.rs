//! Order model and the status state machine.
//!
//! Orders are created and mutated server-side; this module owns the legal
//! transition order the UI encodes, and the client-side validation that
//! runs before an order is ever sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::catalog::PricingTier;
use crate::helpers;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MealTime {
    Breakfast,
    #[default]
    Lunch,
    Dinner,
    PreOrder,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderCreator {
    #[default]
    Customer,
    Admin,
}

/// Strictly linear flow; `Cancelled` is reachable from `Pending` only.
/// `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "completed" => Some(Self::Completed),
            "paid" => Some(Self::Paid),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    /// The single legal advance from this state, if any. The UI only ever
    /// moves one step at a time; skipping is never offered.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Completed),
            Self::Completed => Some(Self::Paid),
            Self::Paid | Self::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Cancellation is only offered before confirmation.
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Exhaustive transition check: the next linear step, or pending to
    /// cancelled. Everything else is rejected.
    pub fn can_transition_to(&self, target: Self) -> bool {
        if target == Self::Cancelled {
            return self.can_cancel();
        }
        self.next() == Some(target)
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A line item as the server records it: item reference plus a name/price
/// snapshot, so later menu edits never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default, alias = "menu_item_id", alias = "itemId")]
    pub menu_item_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, alias = "unit_price", alias = "price")]
    pub unit_price: f64,
    #[serde(default, alias = "line_total", alias = "totalPrice")]
    pub line_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[serde(default, alias = "order_number")]
    pub order_number: String,
    #[serde(default, alias = "customer_name")]
    pub customer_name: String,
    #[serde(default, alias = "customer_phone")]
    pub customer_phone: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, alias = "meal_time")]
    pub meal_time: MealTime,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total: f64,
    #[serde(default, alias = "scheduled_for")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, alias = "special_instructions")]
    pub special_instructions: Option<String>,
    #[serde(default, alias = "pricing_tier")]
    pub pricing_tier: PricingTier,
    #[serde(default, alias = "created_by")]
    pub created_by: OrderCreator,
}

// ---------------------------------------------------------------------------
// Placement validation
// ---------------------------------------------------------------------------

/// Details collected at checkout, before anything touches the network.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDetails {
    pub customer_name: String,
    pub customer_phone: String,
    pub meal_time: MealTime,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// Validate a placement and build the order payload the backend expects.
/// Every failure here is a client-side validation error; nothing is sent.
pub fn build_placement_payload(
    cart: &Cart,
    details: &PlacementDetails,
    created_by: OrderCreator,
) -> Result<serde_json::Value, String> {
    if cart.is_empty() {
        return Err("Cart is empty".to_string());
    }
    if details.customer_name.trim().is_empty() {
        return Err("Customer name is required".to_string());
    }
    if !helpers::is_valid_phone(&details.customer_phone) {
        return Err("A valid phone number is required".to_string());
    }
    if details.meal_time == MealTime::PreOrder && details.scheduled_for.is_none() {
        return Err("Pre-orders need a scheduled time".to_string());
    }

    let tier = cart.pricing_tier;
    let items: Vec<serde_json::Value> = cart
        .lines
        .iter()
        .map(|line| {
            let unit_price = line.item.effective_price(tier);
            serde_json::json!({
                "menuItemId": line.item.id,
                "name": line.item.name,
                "quantity": line.quantity,
                "unitPrice": unit_price,
                "lineTotal": unit_price * line.quantity as f64,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "customerName": details.customer_name.trim(),
        "customerPhone": helpers::normalize_phone(&details.customer_phone),
        "items": items,
        "mealTime": details.meal_time,
        "total": cart.total,
        "scheduledFor": details.scheduled_for,
        "specialInstructions": details.special_instructions,
        "pricingTier": tier,
        "createdBy": created_by,
    }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MenuItem;

    fn loaded_cart() -> Cart {
        let mut cart = Cart::default();
        cart.add_item(
            MenuItem {
                id: "m1".to_string(),
                name: "Masala Chai".to_string(),
                price: 20.0,
                stock: 10,
                available: true,
                ..Default::default()
            },
            2,
        );
        cart
    }

    fn details() -> PlacementDetails {
        PlacementDetails {
            customer_name: "Asha".to_string(),
            customer_phone: "9876543210".to_string(),
            meal_time: MealTime::Lunch,
            scheduled_for: None,
            special_instructions: None,
        }
    }

    #[test]
    fn test_pending_advances_only_to_confirmed() {
        assert_eq!(OrderStatus::Pending.next(), Some(OrderStatus::Confirmed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn test_terminal_states_offer_nothing() {
        for terminal in [OrderStatus::Paid, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            assert_eq!(terminal.next(), None);
            for target in [
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Completed,
                OrderStatus::Paid,
                OrderStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_linear_chain_walks_to_paid() {
        let mut status = OrderStatus::Pending;
        let mut seen = vec![status];
        while let Some(next) = status.next() {
            status = next;
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Completed,
                OrderStatus::Paid,
            ]
        );
    }

    #[test]
    fn test_cancel_only_from_pending() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
        ] {
            assert!(!status.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Paid,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("CANCELED"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn test_placement_rejects_empty_cart() {
        let cart = Cart::default();
        let err = build_placement_payload(&cart, &details(), OrderCreator::Customer).unwrap_err();
        assert!(err.contains("empty"));
    }

    #[test]
    fn test_placement_rejects_bad_phone_and_name() {
        let cart = loaded_cart();
        let mut bad = details();
        bad.customer_phone = "123".to_string();
        assert!(build_placement_payload(&cart, &bad, OrderCreator::Customer).is_err());

        let mut bad = details();
        bad.customer_name = "  ".to_string();
        assert!(build_placement_payload(&cart, &bad, OrderCreator::Customer).is_err());
    }

    #[test]
    fn test_preorder_requires_schedule() {
        let cart = loaded_cart();
        let mut d = details();
        d.meal_time = MealTime::PreOrder;
        assert!(build_placement_payload(&cart, &d, OrderCreator::Customer).is_err());

        d.scheduled_for = Some(Utc::now());
        assert!(build_placement_payload(&cart, &d, OrderCreator::Customer).is_ok());
    }

    #[test]
    fn test_placement_payload_snapshots_prices() {
        let cart = loaded_cart();
        let payload = build_placement_payload(&cart, &details(), OrderCreator::Admin).unwrap();
        assert_eq!(payload["total"], 40.0);
        assert_eq!(payload["createdBy"], "admin");
        assert_eq!(payload["items"][0]["unitPrice"], 20.0);
        assert_eq!(payload["items"][0]["lineTotal"], 40.0);
        assert_eq!(payload["customerPhone"], "9876543210");
    }
}
