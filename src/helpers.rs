//! Small shared helpers: currency formatting, phone/rating/comment
//! validation, and JSON field pluckers used by the command layer.

use serde_json::Value;

/// Longest free-text comment accepted on a review.
pub const MAX_COMMENT_LEN: usize = 500;

/// Default currency symbol when none is configured.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Format an amount with a currency symbol and two decimals: `₹120.00`.
/// Negative amounts keep the sign in front of the symbol: `-₹5.00`.
pub fn format_currency(symbol: &str, amount: f64) -> String {
    if amount < 0.0 {
        format!("-{symbol}{:.2}", amount.abs())
    } else {
        format!("{symbol}{amount:.2}")
    }
}

/// Round an amount to whole paise. Used wherever amounts become grouping
/// keys, so float noise never splits a group.
pub fn to_paise(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Strip everything but ASCII digits from a phone number.
pub fn normalize_phone(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
}

/// A phone number is usable for lookups once it has 10-15 digits.
pub fn is_valid_phone(value: &str) -> bool {
    let digits = normalize_phone(value);
    (10..=15).contains(&digits.len())
}

/// Ratings are integers 0-5, where 0 means "not rated".
pub fn is_valid_rating(rating: i64) -> bool {
    (0..=5).contains(&rating)
}

/// Validate an optional free-text comment. Empty/whitespace-only collapses
/// to `None`.
pub fn validate_comment(comment: Option<&str>) -> Result<Option<String>, String> {
    match comment.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > MAX_COMMENT_LEN => Err(format!(
            "Comment is too long (max {MAX_COMMENT_LEN} characters)"
        )),
        Some(text) => Ok(Some(text.to_string())),
    }
}

// ---------------------------------------------------------------------------
// JSON field pluckers
// ---------------------------------------------------------------------------

/// First non-empty string under any of `keys`.
pub fn value_str(v: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// First numeric value under any of `keys`.
pub fn value_f64(v: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_f64()) {
            return Some(n);
        }
    }
    None
}

/// First integer value under any of `keys`.
pub fn value_i64(v: &Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_i64()) {
            return Some(n);
        }
    }
    None
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency("₹", 120.0), "₹120.00");
        assert_eq!(format_currency("₹", 19.5), "₹19.50");
        assert_eq!(format_currency("₹", -5.0), "-₹5.00");
        assert_eq!(format_currency("$", 0.0), "$0.00");
    }

    #[test]
    fn test_to_paise_rounds() {
        assert_eq!(to_paise(20.0), 2000);
        assert_eq!(to_paise(19.999), 2000);
        assert_eq!(to_paise(0.005), 1);
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("+91 98765-43210"), "919876543210");
        assert!(is_valid_phone("9876543210"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("not a phone"));
    }

    #[test]
    fn test_rating_bounds() {
        assert!(is_valid_rating(0));
        assert!(is_valid_rating(5));
        assert!(!is_valid_rating(6));
        assert!(!is_valid_rating(-1));
    }

    #[test]
    fn test_comment_validation() {
        assert_eq!(validate_comment(None).unwrap(), None);
        assert_eq!(validate_comment(Some("   ")).unwrap(), None);
        assert_eq!(
            validate_comment(Some(" great chai ")).unwrap(),
            Some("great chai".to_string())
        );
        let long = "x".repeat(MAX_COMMENT_LEN + 1);
        assert!(validate_comment(Some(&long)).is_err());
    }
}
