//!
//! Common types and utilities shared by the stock server and client.
//!
//! This crate aggregates:
//! - `error`: unified error type `StockError` used across the workspace.
//! - `result`: handy `Result<T, StockError>` alias.
//! - `update`: validated `StockUpdate` events routed by the update channel.
//! - `snapshot`: `StockSnapshot` merge semantics and the `SnapshotChange` payload.
//! - `status`: well-known stock status values.
//! - `command`: TCP command and reply payloads exchanged between client and server.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod error;
pub mod net;
pub mod result;
pub mod snapshot;
pub mod status;
pub mod update;

pub use command::{Command, Reply};
pub use error::StockError;
pub use result::Result;
pub use snapshot::{SnapshotChange, StockSnapshot};
pub use status::StockStatus;
pub use update::StockUpdate;
