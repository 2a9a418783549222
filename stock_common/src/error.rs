//! Error types shared between client and server.
//!
//! The `StockError` enum unifies I/O, serialization, channel and registry failures
//! together with the validation errors raised at the update channel boundary, so
//! every crate in the workspace can propagate a single error type.
use std::io;
use std::string::FromUtf8Error;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by client and server.
#[derive(Error, Debug)]
pub enum StockError {
    /// I/O error originating from sockets or files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// A command line was not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An update or subscription was addressed to an empty product identifier.
    #[error("Product identifier must not be empty")]
    EmptyProductId,

    /// An update carried a field value that failed validation.
    #[error("Invalid stock update: {0}")]
    InvalidUpdate(String),

    /// The update channel no longer accepts subscriptions or deliveries.
    #[error("Update channel is closed")]
    ChannelClosed,

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for StockError {
    fn from(err: PoisonError<T>) -> Self {
        StockError::MutexLock(err.to_string())
    }
}
