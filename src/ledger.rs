//! Customer and employee ledgers.
//!
//! A ledger is a running account of order charges versus recorded
//! payments. Balances are computed server-side and treated as
//! authoritative on the wire; this module owns the local models and the
//! validation that runs before a settlement is posted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A recorded payment event reducing a ledger's outstanding balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub amount: f64,
    pub method: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Employee ledgers settle per billing period.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillingPeriod {
    pub month: u32,
    pub year: i32,
}

impl BillingPeriod {
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month) && self.year >= 2000
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default, alias = "user_name")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "total_orders_amount")]
    pub total_orders_amount: f64,
    #[serde(default, alias = "total_payments_amount")]
    pub total_payments_amount: f64,
    /// Server-computed outstanding balance; authoritative when present.
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub settlements: Vec<Settlement>,
    #[serde(default)]
    pub period: Option<BillingPeriod>,
}

impl Ledger {
    /// Lenient wire parse; unknown shapes resolve to an empty ledger
    /// rather than erroring, matching how every consumer coerces input.
    pub fn from_wire(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Settlement validation
// ---------------------------------------------------------------------------

/// Payment methods the backend accepts for settlements.
const SETTLEMENT_METHODS: &[&str] = &["cash", "card", "upi", "bank-transfer"];

/// Validate a settlement before it is posted. Everything here is a
/// client-side validation error; nothing reaches the network.
pub fn build_settlement_payload(
    phone: &str,
    amount: f64,
    method: &str,
    note: Option<&str>,
    period: Option<BillingPeriod>,
) -> Result<Value, String> {
    if !helpers::is_valid_phone(phone) {
        return Err("A valid phone number is required".to_string());
    }
    if !(amount > 0.0) || !amount.is_finite() {
        return Err("Settlement amount must be greater than zero".to_string());
    }
    let method = method.trim().to_ascii_lowercase();
    if !SETTLEMENT_METHODS.contains(&method.as_str()) {
        return Err(format!("Unknown payment method: {method}"));
    }
    if let Some(period) = period {
        if !period.is_valid() {
            return Err("Invalid billing period".to_string());
        }
    }
    let note = helpers::validate_comment(note)?;

    Ok(serde_json::json!({
        "phone": helpers::normalize_phone(phone),
        "amount": amount,
        "method": method,
        "note": note,
        "period": period,
        "recordedAt": Utc::now(),
    }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_wire_parse_is_lenient() {
        let ledger = Ledger::from_wire(&serde_json::json!({
            "userName": "Ravi",
            "phone": "9876543210",
            "totalOrdersAmount": 840.0,
            "totalPaymentsAmount": 500.0,
            "balance": 340.0,
            "settlements": [
                {"amount": 500.0, "method": "upi", "note": "April dues"}
            ],
            "period": {"month": 4, "year": 2025}
        }));
        assert_eq!(ledger.user_name.as_deref(), Some("Ravi"));
        assert_eq!(ledger.balance, Some(340.0));
        assert_eq!(ledger.settlements.len(), 1);
        assert_eq!(ledger.period.unwrap().month, 4);

        // Garbage coerces to empty, never panics.
        let empty = Ledger::from_wire(&serde_json::json!("nonsense"));
        assert_eq!(empty.total_orders_amount, 0.0);
        assert!(empty.balance.is_none());
    }

    #[test]
    fn test_settlement_rejects_non_positive_amounts() {
        assert!(build_settlement_payload("9876543210", 0.0, "cash", None, None).is_err());
        assert!(build_settlement_payload("9876543210", -10.0, "cash", None, None).is_err());
        assert!(build_settlement_payload("9876543210", f64::NAN, "cash", None, None).is_err());
    }

    #[test]
    fn test_settlement_rejects_unknown_method_and_bad_phone() {
        assert!(build_settlement_payload("9876543210", 50.0, "barter", None, None).is_err());
        assert!(build_settlement_payload("12", 50.0, "cash", None, None).is_err());
    }

    #[test]
    fn test_settlement_payload_shape() {
        let payload = build_settlement_payload(
            "+91 98765 43210",
            250.0,
            "UPI",
            Some(" April dues "),
            Some(BillingPeriod {
                month: 4,
                year: 2025,
            }),
        )
        .unwrap();
        assert_eq!(payload["phone"], "919876543210");
        assert_eq!(payload["method"], "upi");
        assert_eq!(payload["note"], "April dues");
        assert_eq!(payload["period"]["month"], 4);
    }

    #[test]
    fn test_invalid_period_rejected() {
        let bad = BillingPeriod {
            month: 13,
            year: 2025,
        };
        assert!(build_settlement_payload("9876543210", 10.0, "cash", None, Some(bad)).is_err());
    }
}
