//! Command-line arguments for the stock client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::{Parser, Subcommand};
use stock_common::StockStatus;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server IP address (IPv4 or IPv6) where the stock service is running.
    #[clap(long, global = true, default_value = "127.0.0.1")]
    pub server_ip: String,

    /// What to do.
    #[command(subcommand)]
    pub mode: Mode,
}

/// Client operating mode.
#[derive(Debug, Subcommand)]
pub enum Mode {
    /// Subscribe to one product and print every snapshot change.
    Watch {
        /// Product to watch.
        #[clap(long)]
        product_id: String,

        /// Local UDP port to bind for receiving snapshots. 0 picks a free port.
        #[clap(long, default_value_t = 0)]
        listen_port: u16,

        /// Warn when no update arrived for this many seconds.
        #[clap(long)]
        stale_after_secs: Option<i64>,
    },
    /// Push a single stock update through the server.
    Publish {
        /// Product the update is addressed to.
        #[clap(long)]
        product_id: String,

        /// New stock status.
        #[clap(long, value_enum)]
        status: Option<StockStatus>,

        /// New stock quantity.
        #[clap(long)]
        quantity: Option<i64>,

        /// New availability flag (`true` or `false`).
        #[clap(long, action = clap::ArgAction::Set)]
        available: Option<bool>,
    },
}
