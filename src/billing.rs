//! Bill aggregation over one or more orders.
//!
//! Combined bills group line items by (name, unit price) rather than item
//! id: historical orders may reference items whose id later changed, while
//! a same-priced line with the same name is the same thing to a customer.

use serde::Serialize;

use crate::helpers::to_paise;
use crate::orders::Order;

// ---------------------------------------------------------------------------
// Item rollup
// ---------------------------------------------------------------------------

/// One aggregated row of a combined bill.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedLine {
    pub name: String,
    pub unit_price: f64,
    pub quantity: u64,
    pub total: f64,
}

/// Group all line items across `orders` by (name, unit price), summing
/// quantity and line totals. Output keeps the insertion order of each
/// group's first occurrence.
pub fn aggregate_items(orders: &[Order]) -> Vec<AggregatedLine> {
    let mut out: Vec<AggregatedLine> = Vec::new();

    for order in orders {
        for item in &order.items {
            let key_price = to_paise(item.unit_price);
            match out
                .iter_mut()
                .find(|l| l.name == item.name && to_paise(l.unit_price) == key_price)
            {
                Some(line) => {
                    line.quantity += item.quantity as u64;
                    line.total += item.line_total;
                }
                None => out.push(AggregatedLine {
                    name: item.name.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity as u64,
                    total: item.line_total,
                }),
            }
        }
    }

    out
}

/// Sum of the orders' own totals. Orders may carry adjustments that never
/// appear as itemized lines, so this is surfaced next to the aggregated
/// item total rather than reconciled against it.
pub fn combined_total(orders: &[Order]) -> f64 {
    orders.iter().map(|o| o.total).sum()
}

// ---------------------------------------------------------------------------
// Account summary
// ---------------------------------------------------------------------------

/// Where the outstanding figure came from; the UI labels this.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceSource {
    Server,
    ClientComputed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub outstanding: f64,
    pub source: BalanceSource,
    pub total_orders_amount: f64,
    pub total_payments_amount: f64,
}

/// The server-reported balance is authoritative when present; otherwise
/// fall back to `max(orders - payments, 0)` computed client-side.
pub fn account_summary(
    server_balance: Option<f64>,
    total_orders_amount: f64,
    total_payments_amount: f64,
) -> AccountSummary {
    match server_balance {
        Some(balance) => AccountSummary {
            outstanding: balance,
            source: BalanceSource::Server,
            total_orders_amount,
            total_payments_amount,
        },
        None => AccountSummary {
            outstanding: (total_orders_amount - total_payments_amount).max(0.0),
            source: BalanceSource::ClientComputed,
            total_orders_amount,
            total_payments_amount,
        },
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderItem;

    fn order_with(items: Vec<OrderItem>, total: f64) -> Order {
        Order {
            id: uuid::Uuid::new_v4().to_string(),
            items,
            total,
            ..Default::default()
        }
    }

    fn line(name: &str, unit_price: f64, qty: u32) -> OrderItem {
        OrderItem {
            menu_item_id: None,
            name: name.to_string(),
            quantity: qty,
            unit_price,
            line_total: unit_price * qty as f64,
        }
    }

    #[test]
    fn test_same_name_and_price_merge_across_orders() {
        let orders = vec![
            order_with(vec![line("Tea", 20.0, 2)], 40.0),
            order_with(vec![line("Tea", 20.0, 2)], 40.0),
        ];
        let agg = aggregate_items(&orders);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].name, "Tea");
        assert_eq!(agg[0].quantity, 4);
        assert_eq!(agg[0].total, 80.0);
    }

    #[test]
    fn test_price_change_splits_groups() {
        let orders = vec![
            order_with(vec![line("Tea", 20.0, 1)], 20.0),
            order_with(vec![line("Tea", 25.0, 1)], 25.0),
        ];
        let agg = aggregate_items(&orders);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg[0].unit_price, 20.0);
        assert_eq!(agg[1].unit_price, 25.0);
    }

    #[test]
    fn test_insertion_order_of_first_occurrence() {
        let orders = vec![
            order_with(vec![line("Tea", 20.0, 1), line("Samosa", 12.0, 1)], 32.0),
            order_with(vec![line("Samosa", 12.0, 2), line("Coffee", 30.0, 1)], 54.0),
        ];
        let names: Vec<String> = aggregate_items(&orders).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Tea", "Samosa", "Coffee"]);
    }

    #[test]
    fn test_combined_total_is_order_totals_not_line_sums() {
        // The second order carries a discount not reflected in its lines.
        let orders = vec![
            order_with(vec![line("Tea", 20.0, 2)], 40.0),
            order_with(vec![line("Tea", 20.0, 2)], 35.0),
        ];
        assert_eq!(combined_total(&orders), 75.0);
        let agg_total: f64 = aggregate_items(&orders).iter().map(|l| l.total).sum();
        assert_eq!(agg_total, 80.0);
    }

    #[test]
    fn test_account_summary_prefers_server_figure() {
        let summary = account_summary(Some(120.0), 500.0, 300.0);
        assert_eq!(summary.outstanding, 120.0);
        assert_eq!(summary.source, BalanceSource::Server);
    }

    #[test]
    fn test_account_summary_client_fallback_clamps_at_zero() {
        let summary = account_summary(None, 500.0, 300.0);
        assert_eq!(summary.outstanding, 200.0);
        assert_eq!(summary.source, BalanceSource::ClientComputed);

        let overpaid = account_summary(None, 300.0, 500.0);
        assert_eq!(overpaid.outstanding, 0.0);
    }

    #[test]
    fn test_empty_input_aggregates_to_nothing() {
        assert!(aggregate_items(&[]).is_empty());
        assert_eq!(combined_total(&[]), 0.0);
    }
}
