//! Per-connection command handling.
//!
//! A `ClientSession` owns at most one `StockSubscription` for the TCP connection it
//! serves. Commands arrive as JSON lines and each one is answered with one `Reply`
//! line. Snapshot changes are forwarded as JSON datagrams from the shared UDP data
//! socket to `(peer ip, port)` given in the last `subscribe` command.
//!
//! A bad command only produces an error reply; the session keeps serving. When the
//! connection reaches EOF the subscription is torn down.

use crate::model::subscription::{StockSubscription, SubscriptionStatus};
use crate::model::update_channel::UpdateChannel;
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use log::{debug, error, info, warn};
use std::io::{BufRead, Write};
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use stock_common::{Command, Reply, Result, SnapshotChange, StockSnapshot, StockUpdate};

/// Forward snapshot changes for one subscription to `target_addr`.
///
/// Sends `first` (the snapshot at subscribe time) before anything from `changes`.
/// The task terminates when either:
/// - a signal arrives on `stop_rx` or its sender is dropped, or
/// - the subscription side of `changes` goes away, or
/// - a send error occurs.
pub fn forward_changes(
    socket: Arc<UdpSocket>,
    target_addr: SocketAddr,
    first: Option<SnapshotChange>,
    changes: Receiver<SnapshotChange>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    if let Some(change) = first {
        socket.send_to(&change.to_json_bytes()?, target_addr)?;
    }

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(changes) -> msg => match msg {
                Ok(change) => {
                    let data = change.to_json_bytes()?;
                    socket.send_to(&data, target_addr)?;
                },
                Err(_) => break,
            }
        }
    }
    Ok(())
}

/// Decode one raw command line. Blank lines yield `None`.
fn parse_line(bytes: &[u8]) -> Result<Option<Command>> {
    let line = String::from_utf8(bytes.to_vec())?;
    if line.trim().is_empty() {
        return Ok(None);
    }
    Command::from_line(&line).map(Some)
}

/// State of one command connection.
pub struct ClientSession {
    channel: Arc<UpdateChannel>,
    data_socket: Arc<UdpSocket>,
    peer_ip: IpAddr,
    subscription: Option<StockSubscription>,
    forwarder: Option<Sender<()>>,
}

impl ClientSession {
    /// Create a session for a client connected from `peer_ip`.
    pub fn new(channel: Arc<UpdateChannel>, data_socket: Arc<UdpSocket>, peer_ip: IpAddr) -> Self {
        Self {
            channel,
            data_socket,
            peer_ip,
            subscription: None,
            forwarder: None,
        }
    }

    /// Serve command lines from `reader` until EOF, writing one reply per command.
    pub fn serve<R: BufRead, W: Write>(&mut self, mut reader: R, writer: &mut W) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let reply = match parse_line(&buf) {
                Ok(None) => continue,
                Ok(Some(command)) => self.handle(command),
                Err(e) => {
                    warn!("Rejected command from {}: {}", self.peer_ip, e);
                    Reply::error(format!("invalid command: {}", e))
                }
            };
            reply.write_line(writer)?;
        }
        self.close();
        Ok(())
    }

    /// Apply a single command.
    pub fn handle(&mut self, command: Command) -> Reply {
        debug!("Command from {}: {:?}", self.peer_ip, command);
        match command {
            Command::Subscribe {
                product_id,
                port,
                initial,
            } => self.subscribe(&product_id, port, initial),
            Command::Unsubscribe => {
                self.stop_forwarder();
                if let Some(subscription) = self.subscription.as_mut() {
                    subscription.teardown();
                }
                Reply::ok()
            }
            Command::Publish(update) => self.publish(&update),
        }
    }

    /// Tear everything down. Safe to call more than once.
    pub fn close(&mut self) {
        self.stop_forwarder();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.teardown();
        }
    }

    /// Status of the session's subscription.
    pub fn status(&self) -> SubscriptionStatus {
        self.subscription
            .as_ref()
            .map_or(SubscriptionStatus::Unsubscribed, StockSubscription::status)
    }

    fn subscribe(&mut self, product_id: &str, port: u16, initial: Option<StockSnapshot>) -> Reply {
        self.stop_forwarder();

        match self.subscription.as_mut() {
            Some(subscription) if initial.is_none() => subscription.reconfigure(product_id),
            _ => {
                // Dropping the previous subscription tears it down first.
                self.subscription = None;
                self.subscription = Some(StockSubscription::initialize(
                    Arc::clone(&self.channel),
                    product_id,
                    initial,
                ));
            }
        }

        let Some(subscription) = self.subscription.as_ref() else {
            return Reply::error("subscription could not be created");
        };
        let Some(active_product) = subscription.product_id().map(str::to_string) else {
            info!("Client {} has no active subscription", self.peer_ip);
            return Reply::ok();
        };

        let target_addr = SocketAddr::new(self.peer_ip, port);
        let first = SnapshotChange {
            product_id: active_product.clone(),
            snapshot: subscription.snapshot(),
        };
        let changes = subscription.changes();
        let (stop_tx, stop_rx) = unbounded::<()>();
        let socket = Arc::clone(&self.data_socket);

        thread::spawn(move || {
            if let Err(e) = forward_changes(socket, target_addr, Some(first), changes, stop_rx) {
                error!("Snapshot stream to {} failed: {}", target_addr, e);
            }
        });
        self.forwarder = Some(stop_tx);

        info!(
            "Streaming product {} to {} (UDP)",
            active_product, target_addr
        );
        Reply::ok()
    }

    fn publish(&self, update: &StockUpdate) -> Reply {
        match self.channel.dispatch(update) {
            Ok(delivered) => Reply::Ok {
                delivered: Some(delivered),
            },
            Err(e) => {
                warn!("Rejected update from {}: {}", self.peer_ip, e);
                Reply::error(e.to_string())
            }
        }
    }

    fn stop_forwarder(&mut self) {
        if let Some(stop_tx) = self.forwarder.take() {
            let _ = stop_tx.send(());
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.close();
    }
}
