//! Shared protocol command and reply types used by client and server.
//!
//! Commands travel over the TCP command connection as newline-delimited JSON objects
//! discriminated by an `action` field. Every command is answered with exactly one
//! `Reply` line.
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::result::Result;
use crate::snapshot::StockSnapshot;
use crate::update::StockUpdate;

/// Command payload sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Watch `product_id`, streaming snapshot changes to the caller's UDP `port`.
    ///
    /// Sending it again on the same connection switches the watched product.
    Subscribe {
        /// Product to watch.
        #[serde(rename = "productId")]
        product_id: String,
        /// Client UDP port receiving snapshot changes.
        port: u16,
        /// Snapshot to start from instead of the empty one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial: Option<StockSnapshot>,
    },
    /// Stop watching.
    Unsubscribe,
    /// Push an update into the server's update channel.
    Publish(StockUpdate),
}

impl Command {
    /// Creates a new subscription command.
    pub fn subscribe(product_id: &str, port: u16) -> Self {
        Command::Subscribe {
            product_id: product_id.to_string(),
            port,
            initial: None,
        }
    }

    /// Parse a single command line.
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Write the command as one JSON line.
    pub fn write_line<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_json_line(writer, self)
    }
}

/// Server answer to a single command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    /// The command was applied. `delivered` is set for `publish`.
    Ok {
        /// Number of callbacks an update reached.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delivered: Option<usize>,
    },
    /// The command was rejected; the connection stays usable.
    Error {
        /// Why the command failed.
        message: String,
    },
}

impl Reply {
    /// Plain success.
    pub fn ok() -> Self {
        Reply::Ok { delivered: None }
    }

    /// Failure with a message.
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            message: message.into(),
        }
    }

    /// Parse a single reply line.
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Write the reply as one JSON line.
    pub fn write_line<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_json_line(writer, self)
    }
}

fn write_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subscribe() {
        let cmd = Command::from_line(r#"{"action":"subscribe","productId":"42","port":55555}"#)
            .unwrap();
        assert_eq!(cmd, Command::subscribe("42", 55555));
    }

    #[test]
    fn test_parse_publish_flattens_update() {
        let cmd = Command::from_line(
            r#"{"action":"publish","productId":"42","stockQuantity":3}"#,
        )
        .unwrap();
        assert_eq!(cmd, Command::Publish(StockUpdate::new("42").with_quantity(3)));
    }

    #[test]
    fn test_unknown_action_is_error() {
        assert!(Command::from_line(r#"{"action":"create_cart"}"#).is_err());
    }

    #[test]
    fn test_write_line_terminates_with_newline() {
        let mut out = Vec::new();
        Command::Unsubscribe.write_line(&mut out).unwrap();
        assert_eq!(out, b"{\"action\":\"unsubscribe\"}\n");
    }

    #[test]
    fn test_reply_lines() {
        let mut out = Vec::new();
        Reply::error("nope").write_line(&mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(line, "{\"status\":\"error\",\"message\":\"nope\"}\n");
        assert_eq!(Reply::from_line(&line).unwrap(), Reply::error("nope"));
        assert_eq!(Reply::from_line(r#"{"status":"ok"}"#).unwrap(), Reply::ok());
    }
}
