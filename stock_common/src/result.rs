//! Result type alias shared across the workspace.
//!
//! This module defines a convenient alias that defaults the error type to the
//! common `StockError`, so functions can simply return `Result<T>`.
use crate::error::StockError;

/// Workspace-wide `Result` alias with `StockError` as the default error.
pub type Result<T, E = StockError> = std::result::Result<T, E>;
