//! Single accessor over the legacy `customerData` blob.
//!
//! Older builds of the webview wrote an ad-hoc JSON blob to local storage
//! and parsed it raw at four independent call sites (role lookup, ledger
//! auto-fill, pre-order auto-login, profile screen), each with its own
//! fallback defaults. All reads and writes now go through this module:
//! one deserialization point, one set of defaults, a typed result.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::{self, DbState};
use crate::helpers;

/// `local_settings` key the legacy blob lives under. The key name is kept
/// so existing installs rehydrate without migration.
const PROFILE_KEY: &str = "customerData";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomerRole {
    #[default]
    Customer,
    Employee,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: CustomerRole,
}

impl CustomerProfile {
    pub fn is_employee(&self) -> bool {
        self.role == CustomerRole::Employee
    }

    /// Usable for ledger auto-fill and pre-order auto-login only when a
    /// valid phone is present.
    pub fn has_usable_phone(&self) -> bool {
        helpers::is_valid_phone(&self.phone)
    }
}

/// Load the stored profile. Missing or malformed blobs resolve to `None`
/// rather than a half-filled default, so callers can distinguish "no
/// profile" from "anonymous defaults".
pub fn load(db: &DbState) -> Option<CustomerProfile> {
    let raw = match db::read_local_json(db, PROFILE_KEY) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to read customer profile blob");
            return None;
        }
    };
    if raw.is_null() {
        return None;
    }
    match serde_json::from_value::<CustomerProfile>(raw) {
        Ok(profile) if !profile.phone.trim().is_empty() || !profile.name.trim().is_empty() => {
            Some(profile)
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "customer profile blob is malformed");
            None
        }
    }
}

/// Persist the profile. The phone is normalized on the way in so every
/// later read site sees the same digits.
pub fn save(db: &DbState, profile: &CustomerProfile) -> Result<(), String> {
    let normalized = CustomerProfile {
        phone: helpers::normalize_phone(&profile.phone),
        ..profile.clone()
    };
    let blob =
        serde_json::to_value(&normalized).map_err(|e| format!("serialize profile: {e}"))?;
    db::write_local_json(db, PROFILE_KEY, &blob)
}

/// Remove the stored profile.
pub fn clear(db: &DbState) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    db::delete_setting(&conn, "local", PROFILE_KEY)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn test_db() -> DbState {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::run_migrations_for_test(&conn);
        DbState {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        }
    }

    #[test]
    fn test_roundtrip_normalizes_phone() {
        let db = test_db();
        save(
            &db,
            &CustomerProfile {
                name: "Ravi".to_string(),
                phone: "+91 98765 43210".to_string(),
                email: None,
                role: CustomerRole::Employee,
            },
        )
        .unwrap();

        let loaded = load(&db).expect("profile present");
        assert_eq!(loaded.phone, "919876543210");
        assert!(loaded.is_employee());
        assert!(loaded.has_usable_phone());
    }

    #[test]
    fn test_missing_and_malformed_resolve_to_none() {
        let db = test_db();
        assert!(load(&db).is_none());

        db::write_local_json(&db, PROFILE_KEY, &serde_json::json!(42)).unwrap();
        assert!(load(&db).is_none());

        // An empty object is "no profile", not an anonymous default.
        db::write_local_json(&db, PROFILE_KEY, &serde_json::json!({})).unwrap();
        assert!(load(&db).is_none());
    }

    #[test]
    fn test_clear_removes_blob() {
        let db = test_db();
        save(
            &db,
            &CustomerProfile {
                name: "Ravi".to_string(),
                phone: "9876543210".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(load(&db).is_some());
        clear(&db).unwrap();
        assert!(load(&db).is_none());
    }
}
