//! Menu catalog: item model, the client-side query engine (filter, sort,
//! group, paginate), and the per-audience cache layer.
//!
//! The query engine is pure and operates on already-fetched items; the
//! catalog itself is fetched once per session/audience from the backend and
//! cached in the `menu_cache` SQLite table.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{error, info, warn};

use crate::api;
use crate::db::DbState;
use crate::retry;

/// Bucket name for items without a category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Pseudo-bucket used when grouping is suppressed under a rating sort.
pub const ALL_ITEMS_BUCKET: &str = "all";

/// Default page size for menu listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Pricing tier applied to a cart or order. In-house orders use the
/// alternate price when one exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PricingTier {
    #[default]
    Standard,
    InHouse,
}

impl PricingTier {
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("in-house") | Some("inhouse") | Some("in_house") => Self::InHouse,
            _ => Self::Standard,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Base price. Backend records missing prices as absent; they sort as 0.
    #[serde(default)]
    pub price: f64,
    /// Alternate price for in-house (staff/on-premises) orders.
    #[serde(default, alias = "in_house_price")]
    pub in_house_price: Option<f64>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_true")]
    pub available: bool,
    /// 0-5 when rated.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, alias = "prepTime", alias = "preparation_time")]
    pub prep_time_minutes: Option<u32>,
    #[serde(default)]
    pub portion: Option<String>,
}

impl MenuItem {
    /// Effective unit price: in-house price when the tier is in-house and
    /// an alternate exists, else the base price.
    pub fn effective_price(&self, tier: PricingTier) -> f64 {
        match (tier, self.in_house_price) {
            (PricingTier::InHouse, Some(p)) => p,
            _ => self.price,
        }
    }

    /// Orderable iff flagged available and stock remains.
    pub fn is_orderable(&self) -> bool {
        self.available && self.stock > 0
    }
}

// ---------------------------------------------------------------------------
// Filter / sort configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StockFilter {
    #[default]
    All,
    InStock,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    #[default]
    Default,
    Name,
    PriceLow,
    PriceHigh,
    RatingHigh,
    RatingLow,
}

impl SortBy {
    /// Rating sorts order items globally; grouping by category would
    /// destroy that order, so it is suppressed.
    pub fn is_rating_sort(&self) -> bool {
        matches!(self, Self::RatingHigh | Self::RatingLow)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Exact category match; `None` (or "all") matches everything.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub stock_filter: StockFilter,
    #[serde(default)]
    pub sort_by: SortBy,
    /// Tier used for effective-price sorting.
    #[serde(default)]
    pub pricing_tier: PricingTier,
}

// ---------------------------------------------------------------------------
// Query engine
// ---------------------------------------------------------------------------

/// Case-folded name comparison used for every name tie-break.
fn name_cmp(a: &MenuItem, b: &MenuItem) -> std::cmp::Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

/// Rated items precede unrated ones; among two rated items the given
/// ordering applies, among unrated ones names decide.
fn rating_cmp(a: &MenuItem, b: &MenuItem, descending: bool) -> std::cmp::Ordering {
    match (a.rating, b.rating) {
        (Some(ra), Some(rb)) => {
            let ord = ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal);
            let ord = if descending { ord.reverse() } else { ord };
            ord.then_with(|| name_cmp(a, b))
        }
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => name_cmp(a, b),
    }
}

fn category_key(item: &MenuItem) -> String {
    item.category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_string()
}

fn matches_filter(item: &MenuItem, config: &FilterConfig) -> bool {
    if let Some(category) = config
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all") && !c.eq_ignore_ascii_case("any"))
    {
        if !category_key(item).eq_ignore_ascii_case(category) {
            return false;
        }
    }

    let term = config.search_term.trim().to_lowercase();
    if !term.is_empty()
        && !item.name.to_lowercase().contains(&term)
        && !item.description.to_lowercase().contains(&term)
    {
        return false;
    }

    match config.stock_filter {
        StockFilter::All => true,
        StockFilter::InStock => item.is_orderable(),
        StockFilter::OutOfStock => !item.is_orderable(),
    }
}

/// Pure filter + sort over a fetched catalog.
pub fn filtered_and_sorted(items: &[MenuItem], config: &FilterConfig) -> Vec<MenuItem> {
    let mut out: Vec<MenuItem> = items
        .iter()
        .filter(|item| matches_filter(item, config))
        .cloned()
        .collect();

    let tier = config.pricing_tier;
    match config.sort_by {
        SortBy::RatingHigh => out.sort_by(|a, b| rating_cmp(a, b, true)),
        SortBy::RatingLow => out.sort_by(|a, b| rating_cmp(a, b, false)),
        SortBy::Name => out.sort_by(name_cmp),
        SortBy::PriceLow => out.sort_by(|a, b| {
            a.effective_price(tier)
                .partial_cmp(&b.effective_price(tier))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SortBy::PriceHigh => out.sort_by(|a, b| {
            b.effective_price(tier)
                .partial_cmp(&a.effective_price(tier))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SortBy::Default => out.sort_by(|a, b| {
            let rated = b.rating.is_some().cmp(&a.rating.is_some());
            rated
                .then_with(|| category_key(a).to_lowercase().cmp(&category_key(b).to_lowercase()))
                .then_with(|| name_cmp(a, b))
        }),
    }

    out
}

/// Group items into (category, items) buckets preserving item order.
///
/// Under a rating sort the grouping is suppressed: a single pseudo-bucket
/// keeps the global rating order intact.
pub fn group_by_category(items: &[MenuItem], sort_by: SortBy) -> Vec<(String, Vec<MenuItem>)> {
    if sort_by.is_rating_sort() {
        return vec![(ALL_ITEMS_BUCKET.to_string(), items.to_vec())];
    }

    let mut buckets: Vec<(String, Vec<MenuItem>)> = Vec::new();
    for item in items {
        let key = category_key(item);
        match buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bucket)) => bucket.push(item.clone()),
            None => buckets.push((key, vec![item.clone()])),
        }
    }
    buckets
}

/// Slice out page `page` (1-based) of `items`.
pub fn paginate(items: &[MenuItem], page_size: usize, page: usize) -> Vec<MenuItem> {
    if page_size == 0 {
        return Vec::new();
    }
    let page = page.max(1);
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return Vec::new();
    }
    let end = (start + page_size).min(items.len());
    items[start..end].to_vec()
}

/// Whether a further page exists after `page`.
pub fn has_next_page(total: usize, page_size: usize, page: usize) -> bool {
    page.max(1).saturating_mul(page_size) < total
}

/// Stateful pager over a filtered list. A filter-input change resets to
/// page 1 and replaces the displayed list; `load_more` appends the next
/// page without disturbing earlier ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuPager {
    page_size: usize,
    page: usize,
    displayed: Vec<MenuItem>,
    has_next: bool,
}

impl MenuPager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 0,
            displayed: Vec::new(),
            has_next: false,
        }
    }

    /// Recompute the first page synchronously. Called whenever any filter
    /// input changes.
    pub fn reset(&mut self, filtered: &[MenuItem]) {
        self.page = 1;
        self.displayed = paginate(filtered, self.page_size, 1);
        self.has_next = has_next_page(filtered.len(), self.page_size, 1);
    }

    /// Append the next page. Returns `false` when no items remain.
    pub fn load_more(&mut self, filtered: &[MenuItem]) -> bool {
        if !self.has_next {
            return false;
        }
        self.page += 1;
        let next = paginate(filtered, self.page_size, self.page);
        self.displayed.extend(next);
        self.has_next = has_next_page(filtered.len(), self.page_size, self.page);
        true
    }

    pub fn displayed(&self) -> &[MenuItem] {
        &self.displayed
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next
    }
}

// ---------------------------------------------------------------------------
// Audience + cache layer
// ---------------------------------------------------------------------------

/// Which catalog variant is being browsed. Each audience caches separately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Audience {
    Public,
    InHouse,
    Admin,
}

impl Audience {
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("in-house") | Some("inhouse") => Self::InHouse,
            Some("admin") => Self::Admin,
            _ => Self::Public,
        }
    }

    fn cache_key(&self) -> &'static str {
        match self {
            Self::Public => "menu_public",
            Self::InHouse => "menu_in_house",
            Self::Admin => "menu_admin",
        }
    }

    fn api_path(&self) -> &'static str {
        match self {
            Self::Public => "/api/menu?audience=public",
            Self::InHouse => "/api/menu?audience=in-house",
            Self::Admin => "/api/menu/admin",
        }
    }
}

/// Parse a raw cached array into items, skipping records that fail to
/// deserialize. Every consumer treats malformed input as empty.
fn parse_items(raw: &[Value]) -> Vec<MenuItem> {
    raw.iter()
        .filter_map(|v| match serde_json::from_value::<MenuItem>(v.clone()) {
            Ok(item) if !item.id.trim().is_empty() => Some(item),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "skipping malformed menu item");
                None
            }
        })
        .collect()
}

/// Read the cached catalog for an audience. Returns an empty list on miss
/// or error.
pub fn cached_menu(db: &DbState, audience: Audience) -> Vec<MenuItem> {
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(e) => {
            error!("menu cache lock failed: {e}");
            return vec![];
        }
    };

    let json_str: Option<String> = conn
        .query_row(
            "SELECT data FROM menu_cache WHERE cache_key = ?1",
            params![audience.cache_key()],
            |row| row.get(0),
        )
        .ok();

    match json_str {
        Some(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(arr)) => parse_items(&arr),
            Ok(_) => {
                warn!(cache_key = audience.cache_key(), "menu cache is not an array");
                vec![]
            }
            Err(e) => {
                error!(cache_key = audience.cache_key(), "menu cache JSON parse error: {e}");
                vec![]
            }
        },
        None => vec![],
    }
}

/// Stable content digest so unchanged payloads skip the cache write.
fn compute_menu_version(items: &Value) -> String {
    let serialized = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
    let mut hasher = DefaultHasher::new();
    serialized.hash(&mut hasher);
    format!("digest:{:016x}", hasher.finish())
}

/// Fetch the catalog for an audience from the backend and update the local
/// cache. Returns `{ updated, version, count }`.
pub async fn refresh_menu(
    db: &DbState,
    audience: Audience,
    token: Option<&str>,
) -> Result<Value, api::ApiError> {
    let path = audience.api_path();
    let resp = retry::with_retry("menu_refresh", || {
        api::request_with_method_str(token, path, "GET", None)
    })
    .await?;

    // Contract shape: { items: [...] }, with a bare-array fallback kept for
    // older backend builds.
    let items = resp
        .get("items")
        .or_else(|| resp.get("data"))
        .cloned()
        .unwrap_or_else(|| {
            if resp.is_array() {
                resp.clone()
            } else {
                Value::Array(vec![])
            }
        });

    if !items.is_array() {
        return Err(api::ApiError::InvalidResponse(
            "menu response missing item list".to_string(),
        ));
    }
    let count = items.as_array().map(|a| a.len()).unwrap_or(0);
    let version = compute_menu_version(&items);

    {
        let conn = db
            .conn
            .lock()
            .map_err(|e| api::ApiError::Internal(e.to_string()))?;
        let cached_version: Option<String> = conn
            .query_row(
                "SELECT version FROM menu_cache WHERE cache_key = ?1",
                params![audience.cache_key()],
                |row| row.get(0),
            )
            .ok()
            .flatten();

        if cached_version.as_deref() == Some(version.as_str()) {
            return Ok(serde_json::json!({
                "updated": false,
                "version": version,
                "count": count,
            }));
        }

        let json_str = serde_json::to_string(&items)
            .map_err(|e| api::ApiError::Internal(format!("serialize menu: {e}")))?;
        conn.execute(
            "INSERT INTO menu_cache (id, cache_key, data, version, updated_at)
             VALUES (lower(hex(randomblob(16))), ?1, ?2, ?3, datetime('now'))
             ON CONFLICT(cache_key) DO UPDATE SET
                data = excluded.data,
                version = excluded.version,
                updated_at = excluded.updated_at",
            params![audience.cache_key(), json_str, version],
        )
        .map_err(|e| api::ApiError::Internal(format!("upsert menu_cache: {e}")))?;
    }

    info!(audience = ?audience, count, version = %version, "menu cache updated");

    Ok(serde_json::json!({
        "updated": true,
        "version": version,
        "count": count,
    }))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str) -> MenuItem {
        MenuItem {
            id: id.to_string(),
            name: name.to_string(),
            price: 10.0,
            stock: 5,
            available: true,
            ..Default::default()
        }
    }

    fn rated(id: &str, name: &str, rating: Option<f64>) -> MenuItem {
        MenuItem {
            rating,
            ..item(id, name)
        }
    }

    #[test]
    fn test_effective_price_tiers() {
        let mut chai = item("m1", "Chai");
        chai.price = 20.0;
        chai.in_house_price = Some(15.0);

        assert_eq!(chai.effective_price(PricingTier::Standard), 20.0);
        assert_eq!(chai.effective_price(PricingTier::InHouse), 15.0);

        chai.in_house_price = None;
        assert_eq!(chai.effective_price(PricingTier::InHouse), 20.0);
    }

    #[test]
    fn test_orderable_needs_stock_and_flag() {
        let mut chai = item("m1", "Chai");
        assert!(chai.is_orderable());
        chai.stock = 0;
        assert!(!chai.is_orderable());
        chai.stock = 3;
        chai.available = false;
        assert!(!chai.is_orderable());
    }

    #[test]
    fn test_search_matches_name_or_description() {
        let mut samosa = item("m1", "Samosa");
        samosa.description = "crispy potato pastry".to_string();
        let chai = item("m2", "Masala Chai");
        let items = vec![samosa, chai];

        let config = FilterConfig {
            search_term: "POTATO".to_string(),
            ..Default::default()
        };
        let out = filtered_and_sorted(&items, &config);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Samosa");
    }

    #[test]
    fn test_stock_filter() {
        let mut sold_out = item("m1", "Vada");
        sold_out.stock = 0;
        let items = vec![sold_out, item("m2", "Idli")];

        let in_stock = filtered_and_sorted(
            &items,
            &FilterConfig {
                stock_filter: StockFilter::InStock,
                ..Default::default()
            },
        );
        assert_eq!(in_stock.len(), 1);
        assert_eq!(in_stock[0].name, "Idli");

        let out_of_stock = filtered_and_sorted(
            &items,
            &FilterConfig {
                stock_filter: StockFilter::OutOfStock,
                ..Default::default()
            },
        );
        assert_eq!(out_of_stock.len(), 1);
        assert_eq!(out_of_stock[0].name, "Vada");
    }

    #[test]
    fn test_rating_sort_rated_before_unrated_with_name_ties() {
        let items = vec![
            rated("m1", "B", Some(4.0)),
            rated("m2", "A", Some(4.0)),
            rated("m3", "C", None),
        ];
        let out = filtered_and_sorted(
            &items,
            &FilterConfig {
                sort_by: SortBy::RatingHigh,
                ..Default::default()
            },
        );
        let names: Vec<&str> = out.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_rating_low_still_puts_unrated_last() {
        let items = vec![
            rated("m1", "High", Some(5.0)),
            rated("m2", "None", None),
            rated("m3", "Low", Some(1.0)),
        ];
        let out = filtered_and_sorted(
            &items,
            &FilterConfig {
                sort_by: SortBy::RatingLow,
                ..Default::default()
            },
        );
        let names: Vec<&str> = out.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Low", "High", "None"]);
    }

    #[test]
    fn test_price_sort_missing_price_as_zero() {
        let mut free = item("m1", "Water");
        free.price = 0.0;
        let mut chai = item("m2", "Chai");
        chai.price = 20.0;
        let items = vec![chai, free];

        let out = filtered_and_sorted(
            &items,
            &FilterConfig {
                sort_by: SortBy::PriceLow,
                ..Default::default()
            },
        );
        assert_eq!(out[0].name, "Water");
        assert_eq!(out[1].name, "Chai");
    }

    #[test]
    fn test_default_sort_rated_then_category_then_name() {
        let mut a = rated("m1", "Zebra Cake", Some(4.0));
        a.category = Some("bakery".to_string());
        let mut b = rated("m2", "Apple Pie", None);
        b.category = Some("bakery".to_string());
        let mut c = rated("m3", "Chai", Some(3.0));
        c.category = Some("drinks".to_string());

        let out = filtered_and_sorted(&[b, c, a.clone()], &FilterConfig::default());
        let names: Vec<&str> = out.iter().map(|i| i.name.as_str()).collect();
        // Rated first (bakery before drinks), unrated last.
        assert_eq!(names, vec!["Zebra Cake", "Chai", "Apple Pie"]);
    }

    #[test]
    fn test_grouping_suppressed_under_rating_sort() {
        let mut a = rated("m1", "A", Some(4.0));
        a.category = Some("bakery".to_string());
        let mut b = rated("m2", "B", Some(2.0));
        b.category = Some("drinks".to_string());

        let grouped = group_by_category(&[a, b], SortBy::RatingHigh);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].0, ALL_ITEMS_BUCKET);
        assert_eq!(grouped[0].1.len(), 2);
    }

    #[test]
    fn test_grouping_preserves_order_and_buckets_uncategorized() {
        let mut a = item("m1", "A");
        a.category = Some("bakery".to_string());
        let b = item("m2", "B");
        let mut c = item("m3", "C");
        c.category = Some("bakery".to_string());

        let grouped = group_by_category(&[a, b, c], SortBy::Name);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "bakery");
        assert_eq!(
            grouped[0].1.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["A", "C"]
        );
        assert_eq!(grouped[1].0, UNCATEGORIZED);
    }

    #[test]
    fn test_pagination_monotonic_load_more() {
        let items: Vec<MenuItem> = (0..45)
            .map(|i| item(&format!("m{i}"), &format!("Item {i:02}")))
            .collect();

        let mut pager = MenuPager::new(DEFAULT_PAGE_SIZE);
        pager.reset(&items);
        assert_eq!(pager.displayed().len(), 20);
        assert!(pager.has_next_page());

        assert!(pager.load_more(&items));
        assert_eq!(pager.displayed().len(), 40);
        assert!(pager.has_next_page());

        assert!(pager.load_more(&items));
        assert_eq!(pager.displayed().len(), 45);
        assert!(!pager.has_next_page());

        // Exhausted: a further call is a no-op.
        assert!(!pager.load_more(&items));
        assert_eq!(pager.displayed().len(), 45);
    }

    #[test]
    fn test_reset_replaces_displayed_list() {
        let items: Vec<MenuItem> = (0..30)
            .map(|i| item(&format!("m{i}"), &format!("Item {i:02}")))
            .collect();
        let mut pager = MenuPager::new(20);
        pager.reset(&items);
        pager.load_more(&items);
        assert_eq!(pager.displayed().len(), 30);

        // Filter change: reset against a narrower list.
        pager.reset(&items[..5]);
        assert_eq!(pager.displayed().len(), 5);
        assert!(!pager.has_next_page());
    }

    #[test]
    fn test_paginate_out_of_range_is_empty() {
        let items: Vec<MenuItem> = (0..3).map(|i| item(&format!("m{i}"), "x")).collect();
        assert!(paginate(&items, 20, 2).is_empty());
        assert!(paginate(&items, 0, 1).is_empty());
        assert_eq!(paginate(&items, 20, 0).len(), 3);
    }

    #[test]
    fn test_parse_items_skips_malformed() {
        let raw = vec![
            serde_json::json!({"id": "m1", "name": "Chai", "price": 20.0}),
            serde_json::json!({"name": "no id"}),
            serde_json::json!("not an object"),
        ];
        let items = parse_items(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Chai");
    }
}
