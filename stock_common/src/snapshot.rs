//! Client-side stock snapshot and merge semantics.
//!
//! A `StockSnapshot` is the last known set of stock fields for one product. It is
//! never mutated in place by an update: [`StockSnapshot::merged`] produces a new
//! value in which only the fields present in the update are replaced.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::update::StockUpdate;

/// Last known stock fields for a single product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    /// Textual status, e.g. `IN_STOCK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_status: Option<String>,
    /// Units available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    /// Whether the product can currently be bought.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_for_sale: Option<bool>,
    /// Timestamp of the most recent update that carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl StockSnapshot {
    /// True when no field is known yet.
    pub fn is_empty(&self) -> bool {
        self.stock_status.is_none()
            && self.stock_quantity.is_none()
            && self.available_for_sale.is_none()
            && self.last_updated.is_none()
    }

    /// Apply `update` on top of this snapshot and return the result.
    ///
    /// Fields absent from the update keep their current value; present fields win.
    /// The update's product id is not checked here, routing is the caller's job.
    pub fn merged(&self, update: &StockUpdate) -> StockSnapshot {
        StockSnapshot {
            stock_status: update
                .stock_status
                .clone()
                .or_else(|| self.stock_status.clone()),
            stock_quantity: update.stock_quantity.or(self.stock_quantity),
            available_for_sale: update.available_for_sale.or(self.available_for_sale),
            last_updated: update
                .timestamp
                .clone()
                .or_else(|| self.last_updated.clone()),
        }
    }

    /// `last_updated` parsed as a UTC instant, if present and well formed.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Whether the snapshot should be treated as stale at `now`.
    ///
    /// A snapshot without a usable `last_updated` is always stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_updated_at() {
            Some(updated) => now.signed_duration_since(updated) > max_age,
            None => true,
        }
    }
}

/// A snapshot emitted to a consumer after an update was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotChange {
    /// Product the snapshot belongs to.
    pub product_id: String,
    /// Snapshot after the update was merged.
    #[serde(flatten)]
    pub snapshot: StockSnapshot,
}

impl SnapshotChange {
    /// Encode the change to JSON bytes for the data socket.
    pub fn to_json_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
