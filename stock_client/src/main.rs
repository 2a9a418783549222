//! Stock client. Subscribes to live stock levels of one product and prints every
//! snapshot change, or pushes a single manual update through the server.
//!
//! Usage example (CLI):
//! ```bash
//! stock_client --server-ip 192.168.0.10 watch --product-id 42 --stale-after-secs 30
//! stock_client publish --product-id 42 --status out-of-stock --quantity 0 --available false
//! ```
//!
//! In `watch` mode the client binds a UDP socket, sends a `subscribe` command over
//! TCP and keeps that connection open for as long as it wants updates; the server
//! ends the subscription when the connection closes.
#![warn(missing_docs)]
mod args;
mod sender;

use crate::args::{Args, Mode};
use crate::sender::CommandSender;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use clap::Parser;
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use stock_common::net::{COMMAND_PORT, addr};
use stock_common::{Command, Reply, Result, SnapshotChange, StockError, StockStatus, StockUpdate};

/// How long a single blocking receive may wait before shutdown and staleness are checked.
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs a blocking loop that receives `SnapshotChange` datagrams from `socket` and
/// logs them until `shutdown` is set.
fn start_receiver_loop(
    socket: &UdpSocket,
    shutdown: Arc<AtomicBool>,
    stale_after: Option<ChronoDuration>,
) -> Result<(), StockError> {
    info!("Snapshot receiver running on: {}", socket.local_addr()?);
    let mut buf = [0u8; 2048];
    let mut last: Option<SnapshotChange> = None;
    let mut stale_reported = false;

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(size) => match serde_json::from_slice::<SnapshotChange>(&buf[..size]) {
                Ok(change) => {
                    print_change(&change);
                    last = Some(change);
                    stale_reported = false;
                }
                Err(_) => {
                    debug!(
                        "Received non-JSON message: {}",
                        String::from_utf8_lossy(&buf[..size])
                    );
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                error!("Receive data error: {}", e);
                return Err(StockError::Io(e));
            }
        }

        if let (Some(max_age), Some(change)) = (stale_after, last.as_ref()) {
            if !stale_reported && change.snapshot.is_stale(Utc::now(), max_age) {
                warn!(
                    "Product {} looks stale, last updated {}",
                    change.product_id,
                    change.snapshot.last_updated.as_deref().unwrap_or("never")
                );
                stale_reported = true;
            }
        }
    }
    info!("Receiver loop stopping...");
    Ok(())
}

fn print_change(change: &SnapshotChange) {
    let snapshot = &change.snapshot;
    info!(
        "STOCK: {} status={} quantity={} available={} updated={}",
        change.product_id,
        snapshot.stock_status.as_deref().unwrap_or("-"),
        snapshot
            .stock_quantity
            .map_or_else(|| "-".to_string(), |q| q.to_string()),
        snapshot
            .available_for_sale
            .map_or_else(|| "-".to_string(), |a| a.to_string()),
        snapshot.last_updated.as_deref().unwrap_or("-"),
    );
}

fn watch(
    server_address: &str,
    product_id: &str,
    listen_port: u16,
    stale_after_secs: Option<i64>,
) -> Result<(), StockError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| StockError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let socket = UdpSocket::bind(addr("0.0.0.0", listen_port))?;
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    let local_port = socket.local_addr()?.port();
    info!("UDP client listening on port {}", local_port);

    let mut sender = CommandSender::connect(server_address)?;
    sender.send_command(&Command::subscribe(product_id, local_port))?;
    info!("Subscribed to product {}. Press Ctrl+C to exit.", product_id);

    let stale_after = stale_after_secs.map(ChronoDuration::seconds);
    let result = start_receiver_loop(&socket, shutdown, stale_after);

    if let Err(e) = sender.send_command(&Command::Unsubscribe) {
        warn!("Unsubscribe failed: {}", e);
    }
    result
}

fn publish(
    server_address: &str,
    product_id: &str,
    status: Option<StockStatus>,
    quantity: Option<i64>,
    available: Option<bool>,
) -> Result<(), StockError> {
    let mut update = StockUpdate::new(product_id)
        .with_timestamp(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
    update.stock_status = status.map(|s| s.to_string());
    update.stock_quantity = quantity;
    update.available_for_sale = available;
    update.validate()?;

    let mut sender = CommandSender::connect(server_address)?;
    match sender.send_command(&Command::Publish(update))? {
        Reply::Ok {
            delivered: Some(delivered),
        } => info!(
            "Update for {} delivered to {} subscriber(s)",
            product_id, delivered
        ),
        reply => info!("Update for {} accepted: {:?}", product_id, reply),
    }
    Ok(())
}

fn main() -> Result<(), StockError> {
    init_logger();
    let args = Args::parse();

    let server_ip = args.server_ip.trim().replace('"', "");
    let server_command_address = addr(&server_ip, COMMAND_PORT);

    match args.mode {
        Mode::Watch {
            product_id,
            listen_port,
            stale_after_secs,
        } => watch(
            &server_command_address,
            &product_id,
            listen_port,
            stale_after_secs,
        ),
        Mode::Publish {
            product_id,
            status,
            quantity,
            available,
        } => publish(
            &server_command_address,
            &product_id,
            status,
            quantity,
            available,
        ),
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
