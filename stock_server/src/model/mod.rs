//! Core subscription machinery of the stock server.
//!
//! - `update_channel`: product-keyed callback registry that routes `StockUpdate`s.
//! - `subscription`: one consumer's live `StockSnapshot` for a single product.
//! - `stock_feed`: background generator publishing synthetic updates.

pub mod stock_feed;
pub mod subscription;
pub mod update_channel;
