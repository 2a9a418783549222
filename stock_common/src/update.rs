//! Stock update events delivered through the update channel.
//!
//! A `StockUpdate` is addressed to exactly one product and carries any subset of the
//! stock fields. Producers are not trusted: every update is validated before the
//! channel routes it, see [`StockUpdate::validate`].

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::StockError;
use crate::result::Result;

/// Partial stock information for a single product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    /// Product the update is addressed to.
    pub product_id: String,
    /// Textual status, e.g. `IN_STOCK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_status: Option<String>,
    /// Units available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    /// Whether the product can currently be bought.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_for_sale: Option<bool>,
    /// RFC 3339 time the producer observed the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl StockUpdate {
    /// Create an update for `product_id` with no fields set.
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            ..Self::default()
        }
    }

    /// Set the stock status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.stock_status = Some(status.into());
        self
    }

    /// Set the stock quantity.
    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.stock_quantity = Some(quantity);
        self
    }

    /// Set the availability flag.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available_for_sale = Some(available);
        self
    }

    /// Set the producer timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Check the update before it is routed.
    ///
    /// Rejects an empty product id, a negative quantity and a timestamp that is not
    /// RFC 3339.
    pub fn validate(&self) -> Result<()> {
        if self.product_id.trim().is_empty() {
            return Err(StockError::EmptyProductId);
        }
        if let Some(quantity) = self.stock_quantity {
            if quantity < 0 {
                return Err(StockError::InvalidUpdate(format!(
                    "negative stock quantity {} for product {}",
                    quantity, self.product_id
                )));
            }
        }
        if let Some(timestamp) = &self.timestamp {
            DateTime::parse_from_rfc3339(timestamp).map_err(|e| {
                StockError::InvalidUpdate(format!("bad timestamp {:?}: {}", timestamp, e))
            })?;
        }
        Ok(())
    }

    /// Decode an update from JSON and validate it.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let update: StockUpdate = serde_json::from_slice(bytes)?;
        update.validate()?;
        Ok(update)
    }
}
