//! Stock level streaming server.
//!
//! This binary keeps live per-product stock snapshots for connected clients. It wires
//! together four building blocks:
//!
//! - `UpdateChannel`: process-wide registry routing `StockUpdate`s to the callbacks
//!   subscribed under the update's product id.
//! - `StockFeed`: background thread publishing synthetic stock movements into the
//!   channel.
//! - `CommandReceiver`: TCP listener; every connection gets a `ClientSession` that
//!   owns one `StockSubscription` and answers JSON line commands
//!   (`subscribe`, `unsubscribe`, `publish`).
//! - Per-session forwarder: thread sending each snapshot change as a JSON datagram
//!   from the UDP data socket to the client's port.
//!
//! Network protocol (high-level):
//! - Commands on TCP `COMMAND_PORT`, one JSON object per line, one reply line each.
//! - Snapshots from UDP `DATA_PORT` to `(client ip, port from subscribe)`.
//! - Closing the TCP connection ends the subscription.
#![warn(missing_docs)]
use crate::args::Args;
use clap::Parser;
use log::info;
use std::net::UdpSocket;
use std::sync::Arc;
use stock_common::Result;
use stock_common::StockError;
use stock_common::net::{COMMAND_PORT, DATA_PORT, addr};
use stock_server::model::stock_feed::StockFeed;
use stock_server::model::update_channel::UpdateChannel;
use stock_server::receiver::CommandReceiver;

mod args;

fn main() -> Result<(), StockError> {
    init_logger();
    let args = Args::parse();

    let channel = Arc::new(UpdateChannel::new());
    let data_socket = Arc::new(UdpSocket::bind(addr(&args.bind_ip, DATA_PORT))?);
    info!("UDP data socket created on: {}", data_socket.local_addr()?);

    let feed_stop = StockFeed::start(Arc::clone(&channel), args.feed_config());

    let receiver = CommandReceiver::new(&addr(&args.bind_ip, COMMAND_PORT))?;
    let result = receiver.accept_loop(Arc::clone(&channel), data_socket);

    let _ = feed_stop.send(());
    channel.close();
    result
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
