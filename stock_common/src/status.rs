//! Well-known stock status values shared between client and server.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Textual stock status carried in updates and snapshots.
///
/// Snapshots keep the status as free text so unknown values from other producers
/// survive untouched; this enum names the values the feed and the CLI produce.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    Hash,
    Eq,
    PartialEq,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum StockStatus {
    /// Comfortably above the low-stock threshold.
    InStock,
    /// Still sellable, but below the low-stock threshold.
    LowStock,
    /// Nothing left to sell.
    OutOfStock,
}

impl StockStatus {
    /// Derive the status for `quantity` given a low-stock `threshold`.
    pub fn for_quantity(quantity: i64, threshold: i64) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity < threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}
