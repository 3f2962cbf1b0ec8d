//! Feedback collection for delivered orders.
//!
//! Each menu item on an order takes two independent 1-5 ratings (food,
//! service) plus one shared optional comment and an anonymity flag. Only
//! items with at least one non-zero rating are submitted; a submission
//! with no qualifying items never reaches the network.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::helpers;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    Food,
    Service,
}

impl ReviewType {
    pub fn from_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "food" => Some(Self::Food),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

/// Ratings collected for one menu item. 0 means "not rated".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
    pub menu_item_id: String,
    #[serde(default)]
    pub food_rating: i64,
    #[serde(default)]
    pub service_rating: i64,
}

impl ReviewDraft {
    fn has_rating(&self) -> bool {
        self.food_rating > 0 || self.service_rating > 0
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub order_id: String,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub items: Vec<ReviewDraft>,
}

// ---------------------------------------------------------------------------
// Submission gating
// ---------------------------------------------------------------------------

/// Validate a submission and build the backend payload. Items without any
/// non-zero rating are filtered out; zero qualifying items is a
/// client-side validation error.
pub fn build_submission_payload(submission: &ReviewSubmission) -> Result<Value, String> {
    if submission.order_id.trim().is_empty() {
        return Err("Missing order id".to_string());
    }

    for draft in &submission.items {
        if !helpers::is_valid_rating(draft.food_rating)
            || !helpers::is_valid_rating(draft.service_rating)
        {
            return Err(format!(
                "Ratings for {} must be between 1 and 5",
                draft.menu_item_id
            ));
        }
    }

    let qualifying: Vec<&ReviewDraft> = submission
        .items
        .iter()
        .filter(|d| d.has_rating())
        .collect();
    if qualifying.is_empty() {
        return Err("Rate at least one item before submitting".to_string());
    }

    let comment = helpers::validate_comment(submission.comment.as_deref())?;
    let reviewer = if submission.anonymous {
        None
    } else {
        submission
            .reviewer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    };

    let items: Vec<Value> = qualifying
        .iter()
        .map(|d| {
            let food = (d.food_rating > 0).then_some(d.food_rating);
            let service = (d.service_rating > 0).then_some(d.service_rating);
            serde_json::json!({
                "menuItemId": d.menu_item_id,
                "foodRating": food,
                "serviceRating": service,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "orderId": submission.order_id.trim(),
        "reviewer": reviewer,
        "anonymous": submission.anonymous,
        "comment": comment,
        "items": items,
    }))
}

// ---------------------------------------------------------------------------
// Update-mode prefill
// ---------------------------------------------------------------------------

/// Fold existing review records into per-item drafts, keyed by
/// (menu item id, review type). Used when editing previously submitted
/// feedback.
pub fn prefill_drafts(existing: &[Value]) -> Vec<ReviewDraft> {
    let mut by_item: HashMap<String, ReviewDraft> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for record in existing {
        let Some(item_id) = helpers::value_str(record, &["menuItemId", "menu_item_id"]) else {
            continue;
        };
        let Some(review_type) = helpers::value_str(record, &["reviewType", "review_type"])
            .and_then(|t| ReviewType::from_value(&t))
        else {
            continue;
        };
        let rating = helpers::value_i64(record, &["rating"]).unwrap_or(0);
        if !helpers::is_valid_rating(rating) {
            continue;
        }

        let draft = by_item.entry(item_id.clone()).or_insert_with(|| {
            order.push(item_id.clone());
            ReviewDraft {
                menu_item_id: item_id.clone(),
                ..Default::default()
            }
        });
        match review_type {
            ReviewType::Food => draft.food_rating = rating,
            ReviewType::Service => draft.service_rating = rating,
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_item.remove(&id))
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(items: Vec<ReviewDraft>) -> ReviewSubmission {
        ReviewSubmission {
            order_id: "ord-1".to_string(),
            reviewer_name: Some("Asha".to_string()),
            anonymous: false,
            comment: None,
            items,
        }
    }

    #[test]
    fn test_all_zero_ratings_rejected_client_side() {
        let s = submission(vec![
            ReviewDraft {
                menu_item_id: "m1".to_string(),
                food_rating: 0,
                service_rating: 0,
            },
            ReviewDraft {
                menu_item_id: "m2".to_string(),
                food_rating: 0,
                service_rating: 0,
            },
        ]);
        assert!(build_submission_payload(&s).is_err());
    }

    #[test]
    fn test_one_nonzero_rating_qualifies() {
        let s = submission(vec![
            ReviewDraft {
                menu_item_id: "m1".to_string(),
                food_rating: 0,
                service_rating: 4,
            },
            ReviewDraft {
                menu_item_id: "m2".to_string(),
                food_rating: 0,
                service_rating: 0,
            },
        ]);
        let payload = build_submission_payload(&s).unwrap();
        let items = payload["items"].as_array().unwrap();
        assert_eq!(items.len(), 1, "unrated items are filtered out");
        assert_eq!(items[0]["menuItemId"], "m1");
        assert_eq!(items[0]["serviceRating"], 4);
        assert!(items[0]["foodRating"].is_null());
    }

    #[test]
    fn test_out_of_range_rating_rejected() {
        let s = submission(vec![ReviewDraft {
            menu_item_id: "m1".to_string(),
            food_rating: 6,
            service_rating: 0,
        }]);
        assert!(build_submission_payload(&s).is_err());
    }

    #[test]
    fn test_anonymous_drops_reviewer_name() {
        let mut s = submission(vec![ReviewDraft {
            menu_item_id: "m1".to_string(),
            food_rating: 5,
            service_rating: 0,
        }]);
        s.anonymous = true;
        let payload = build_submission_payload(&s).unwrap();
        assert!(payload["reviewer"].is_null());
        assert_eq!(payload["anonymous"], true);
    }

    #[test]
    fn test_prefill_keyed_by_item_and_type() {
        let existing = vec![
            serde_json::json!({"menuItemId": "m1", "reviewType": "food", "rating": 4}),
            serde_json::json!({"menuItemId": "m1", "reviewType": "service", "rating": 3}),
            serde_json::json!({"menuItemId": "m2", "reviewType": "food", "rating": 5}),
            serde_json::json!({"menuItemId": "m3", "reviewType": "flavor", "rating": 5}),
        ];
        let drafts = prefill_drafts(&existing);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].menu_item_id, "m1");
        assert_eq!(drafts[0].food_rating, 4);
        assert_eq!(drafts[0].service_rating, 3);
        assert_eq!(drafts[1].menu_item_id, "m2");
        assert_eq!(drafts[1].food_rating, 5);
        assert_eq!(drafts[1].service_rating, 0);
    }
}
