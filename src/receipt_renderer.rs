//! Printable HTML documents: kitchen ticket, single-order bill, and the
//! multi-order combined bill.
//!
//! Each renderer produces one self-contained document (inline CSS, no
//! external assets, optional embedded logo) with header, meta, items
//! table, totals, and footer sections. Delivery to the host print
//! facility lives in the `print` module.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::billing;
use crate::helpers::format_currency;
use crate::orders::{MealTime, Order};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub cafe_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub footer_text: Option<String>,
    pub currency_symbol: String,
    /// PNG bytes embedded as a data URI when present.
    pub logo_png: Option<Vec<u8>>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            cafe_name: "Cafe Counter".to_string(),
            address: None,
            phone: None,
            footer_text: Some("Thank you, visit again".to_string()),
            currency_symbol: crate::helpers::DEFAULT_CURRENCY_SYMBOL.to_string(),
            logo_png: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// Escape text destined for HTML body or attribute positions.
fn esc(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn fmt_time(ts: Option<DateTime<Utc>>) -> String {
    ts.unwrap_or_else(Utc::now)
        .format("%d %b %Y %H:%M")
        .to_string()
}

fn meal_time_label(meal_time: MealTime) -> &'static str {
    match meal_time {
        MealTime::Breakfast => "Breakfast",
        MealTime::Lunch => "Lunch",
        MealTime::Dinner => "Dinner",
        MealTime::PreOrder => "Pre-order",
    }
}

const PAGE_CSS: &str = "
  body { font-family: 'Courier New', monospace; font-size: 13px; margin: 0; padding: 12px; width: 300px; }
  h1 { font-size: 16px; text-align: center; margin: 4px 0; }
  .meta, .footer { text-align: center; font-size: 12px; margin: 6px 0; }
  .rule { border-top: 1px dashed #000; margin: 8px 0; }
  table { width: 100%; border-collapse: collapse; }
  th, td { text-align: left; padding: 2px 0; font-size: 13px; }
  td.num, th.num { text-align: right; }
  .totals td { font-weight: bold; }
  .label { font-size: 11px; color: #333; }
";

/// Shared document shell. The onload hook asks the host to print as soon
/// as the document is ready, whichever delivery strategy loaded it.
fn page(title: &str, header: &str, body: &str, footer: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
         <style>{}</style>\n</head>\n<body>\n{}\n{}\n{}\n\
         <script>window.addEventListener('load', function () {{ window.print(); }});</script>\n\
         </body>\n</html>\n",
        esc(title),
        PAGE_CSS,
        header,
        body,
        footer
    )
}

fn header_block(cfg: &LayoutConfig) -> String {
    let mut out = String::new();
    if let Some(png) = &cfg.logo_png {
        let data = BASE64_STANDARD.encode(png);
        out.push_str(&format!(
            "<div class=\"meta\"><img src=\"data:image/png;base64,{data}\" alt=\"\" width=\"96\"></div>\n"
        ));
    }
    out.push_str(&format!("<h1>{}</h1>\n", esc(&cfg.cafe_name)));
    if let Some(address) = &cfg.address {
        out.push_str(&format!("<div class=\"meta\">{}</div>\n", esc(address)));
    }
    if let Some(phone) = &cfg.phone {
        out.push_str(&format!("<div class=\"meta\">{}</div>\n", esc(phone)));
    }
    out.push_str("<div class=\"rule\"></div>\n");
    out
}

fn footer_block(cfg: &LayoutConfig) -> String {
    match &cfg.footer_text {
        Some(text) => format!(
            "<div class=\"rule\"></div>\n<div class=\"footer\">{}</div>",
            esc(text)
        ),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Kitchen ticket
// ---------------------------------------------------------------------------

/// The slip sent to food preparation staff: items and instructions only,
/// no prices.
pub fn render_kitchen_ticket(order: &Order, cfg: &LayoutConfig) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<div class=\"meta\">KITCHEN TICKET<br>Order {} &middot; {}</div>\n",
        esc(&order.order_number),
        esc(meal_time_label(order.meal_time)),
    ));
    body.push_str(&format!(
        "<div class=\"meta\">{}</div>\n",
        esc(&fmt_time(None))
    ));
    if let Some(scheduled) = order.scheduled_for {
        body.push_str(&format!(
            "<div class=\"meta\">Scheduled for {}</div>\n",
            esc(&fmt_time(Some(scheduled)))
        ));
    }
    body.push_str("<div class=\"rule\"></div>\n<table>\n");
    for item in &order.items {
        body.push_str(&format!(
            "<tr><td class=\"num\">{}&times;</td><td>{}</td></tr>\n",
            item.quantity,
            esc(&item.name)
        ));
    }
    body.push_str("</table>\n");
    if let Some(notes) = order
        .special_instructions
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        body.push_str(&format!(
            "<div class=\"rule\"></div>\n<div>NOTE: {}</div>\n",
            esc(notes)
        ));
    }

    page(
        &format!("KOT {}", order.order_number),
        &header_block(cfg),
        &body,
        "",
    )
}

// ---------------------------------------------------------------------------
// Single-order bill
// ---------------------------------------------------------------------------

pub fn render_order_bill(order: &Order, cfg: &LayoutConfig) -> String {
    let sym = &cfg.currency_symbol;
    let mut body = String::new();
    body.push_str(&format!(
        "<div class=\"meta\">Order {}<br>{}</div>\n",
        esc(&order.order_number),
        esc(&fmt_time(None)),
    ));
    if !order.customer_name.trim().is_empty() {
        body.push_str(&format!(
            "<div class=\"meta\">{} &middot; {}</div>\n",
            esc(&order.customer_name),
            esc(&order.customer_phone),
        ));
    }
    body.push_str("<div class=\"rule\"></div>\n<table>\n");
    body.push_str(
        "<tr><th>Item</th><th class=\"num\">Qty</th><th class=\"num\">Rate</th><th class=\"num\">Amount</th></tr>\n",
    );
    for item in &order.items {
        body.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            esc(&item.name),
            item.quantity,
            esc(&format_currency(sym, item.unit_price)),
            esc(&format_currency(sym, item.line_total)),
        ));
    }
    body.push_str("</table>\n<div class=\"rule\"></div>\n<table class=\"totals\">\n");
    body.push_str(&format!(
        "<tr><td>Total</td><td class=\"num\">{}</td></tr>\n",
        esc(&format_currency(sym, order.total))
    ));
    body.push_str("</table>\n");

    page(
        &format!("Bill {}", order.order_number),
        &header_block(cfg),
        &body,
        &footer_block(cfg),
    )
}

// ---------------------------------------------------------------------------
// Combined bill
// ---------------------------------------------------------------------------

/// Multi-order bill with per-item rollups. The aggregated item total and
/// the sum of order totals can legitimately differ (orders may carry
/// adjustments outside their itemized lines); both are printed with their
/// own labels, neither is reconciled into the other.
pub fn render_combined_bill(orders: &[Order], cfg: &LayoutConfig) -> String {
    let sym = &cfg.currency_symbol;
    let aggregated = billing::aggregate_items(orders);
    let orders_total = billing::combined_total(orders);
    let items_total: f64 = aggregated.iter().map(|l| l.total).sum();

    let customer = orders
        .iter()
        .map(|o| o.customer_name.trim())
        .find(|n| !n.is_empty())
        .unwrap_or("");

    let mut body = String::new();
    body.push_str(&format!(
        "<div class=\"meta\">COMBINED BILL &middot; {} order(s)<br>{}</div>\n",
        orders.len(),
        esc(&fmt_time(None)),
    ));
    if !customer.is_empty() {
        body.push_str(&format!("<div class=\"meta\">{}</div>\n", esc(customer)));
    }
    body.push_str("<div class=\"rule\"></div>\n<table>\n");
    body.push_str(
        "<tr><th>Item</th><th class=\"num\">Qty</th><th class=\"num\">Rate</th><th class=\"num\">Amount</th></tr>\n",
    );
    for row in &aggregated {
        body.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
            esc(&row.name),
            row.quantity,
            esc(&format_currency(sym, row.unit_price)),
            esc(&format_currency(sym, row.total)),
        ));
    }
    body.push_str("</table>\n<div class=\"rule\"></div>\n<table class=\"totals\">\n");
    body.push_str(&format!(
        "<tr><td>Items total</td><td class=\"num\">{}</td></tr>\n",
        esc(&format_currency(sym, items_total))
    ));
    body.push_str(&format!(
        "<tr><td>Orders total (selected)</td><td class=\"num\">{}</td></tr>\n",
        esc(&format_currency(sym, orders_total))
    ));
    body.push_str("</table>\n");

    page(
        "Combined bill",
        &header_block(cfg),
        &body,
        &footer_block(cfg),
    )
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderItem;

    fn order() -> Order {
        Order {
            id: "o1".to_string(),
            order_number: "A-042".to_string(),
            customer_name: "Asha <script>".to_string(),
            customer_phone: "9876543210".to_string(),
            items: vec![OrderItem {
                menu_item_id: Some("m1".to_string()),
                name: "Chai & Biscuit".to_string(),
                quantity: 2,
                unit_price: 20.0,
                line_total: 40.0,
            }],
            total: 40.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_bill_escapes_user_text() {
        let html = render_order_bill(&order(), &LayoutConfig::default());
        assert!(html.contains("Asha &lt;script&gt;"));
        assert!(html.contains("Chai &amp; Biscuit"));
        assert!(!html.contains("<script>window.alert"));
    }

    #[test]
    fn test_kitchen_ticket_has_no_prices() {
        let html = render_kitchen_ticket(&order(), &LayoutConfig::default());
        assert!(html.contains("KITCHEN TICKET"));
        assert!(html.contains("2&times;"));
        assert!(!html.contains("20.00"));
        assert!(!html.contains("Total"));
    }

    #[test]
    fn test_combined_bill_shows_both_totals() {
        let mut discounted = order();
        discounted.total = 35.0;
        let html = render_combined_bill(&[order(), discounted], &LayoutConfig::default());
        // Aggregated: one Tea-style row of qty 4 / 80.00; order totals 75.00.
        assert!(html.contains("Items total"));
        assert!(html.contains("80.00"));
        assert!(html.contains("Orders total (selected)"));
        assert!(html.contains("75.00"));
    }

    #[test]
    fn test_documents_are_self_contained_and_auto_print() {
        for html in [
            render_kitchen_ticket(&order(), &LayoutConfig::default()),
            render_order_bill(&order(), &LayoutConfig::default()),
            render_combined_bill(&[order()], &LayoutConfig::default()),
        ] {
            assert!(html.starts_with("<!doctype html>"));
            assert!(html.contains("window.print()"));
            assert!(!html.contains("http://"));
            assert!(!html.contains("https://"));
        }
    }

    #[test]
    fn test_logo_embedded_as_data_uri() {
        let cfg = LayoutConfig {
            logo_png: Some(vec![0x89, 0x50, 0x4e, 0x47]),
            ..Default::default()
        };
        let html = render_order_bill(&order(), &cfg);
        assert!(html.contains("data:image/png;base64,iVBORw=="));
    }
}
