//! Synthetic stock feed driving the update channel.
//!
//! `StockFeed` runs a background thread that walks the stock quantity of a fixed set
//! of products and dispatches a `StockUpdate` per product on every tick. The first
//! tick and every status change produce a full update (status, quantity, availability,
//! timestamp); in between only the quantity and timestamp are sent, so consumers
//! rely on merge semantics to keep the rest.
//!
//! The thread stops when the `Sender<()>` returned by [`StockFeed::start`] sends or is
//! dropped.

use crate::model::update_channel::UpdateChannel;
use chrono::{SecondsFormat, Utc};
use crossbeam_channel::{Sender, select, unbounded};
use log::{info, warn};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use stock_common::{StockStatus, StockUpdate};

/// Feed settings, usually taken from the command line.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Products the feed produces updates for.
    pub products: Vec<String>,
    /// Pause between two ticks.
    pub interval: Duration,
    /// Quantity every product starts with.
    pub initial_quantity: i64,
    /// Quantities below this are reported as `LOW_STOCK`.
    pub low_stock_threshold: i64,
}

/// Largest quantity change applied to a product in a single tick.
const MAX_STEP: i64 = 3;

/// Simulated stock level of one product.
#[derive(Debug, Clone)]
struct ProductStock {
    quantity: i64,
    status: Option<StockStatus>,
}

impl ProductStock {
    fn new(quantity: i64) -> Self {
        Self {
            quantity: quantity.max(0),
            status: None,
        }
    }

    /// Apply `delta` and build the update describing the new level.
    fn next_update(
        &mut self,
        product_id: &str,
        delta: i64,
        threshold: i64,
        timestamp: &str,
    ) -> StockUpdate {
        self.quantity = self.quantity.saturating_add(delta).max(0);
        let status = StockStatus::for_quantity(self.quantity, threshold);

        let update = StockUpdate::new(product_id)
            .with_quantity(self.quantity)
            .with_timestamp(timestamp);

        if self.status == Some(status) {
            return update;
        }
        self.status = Some(status);
        update
            .with_status(status.to_string())
            .with_available(self.quantity > 0)
    }
}

/// Background stock generator that publishes into an [`UpdateChannel`].
pub struct StockFeed;

impl StockFeed {
    /// Start the feed thread and return its shutdown handle.
    pub fn start(channel: Arc<UpdateChannel>, config: FeedConfig) -> Sender<()> {
        let (stop_tx, stop_rx) = unbounded::<()>();

        thread::spawn(move || {
            let mut rng = rand::rng();
            let mut stock: HashMap<String, ProductStock> = config
                .products
                .iter()
                .map(|p| (p.clone(), ProductStock::new(config.initial_quantity)))
                .collect();

            info!(
                "Stock feed started for {} product(s), interval {:?}",
                config.products.len(),
                config.interval
            );

            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    default(config.interval) => {
                        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                        for product_id in &config.products {
                            let Some(level) = stock.get_mut(product_id) else {
                                continue;
                            };
                            let delta = rng.random_range(-MAX_STEP..=MAX_STEP);
                            let update = level.next_update(
                                product_id,
                                delta,
                                config.low_stock_threshold,
                                &timestamp,
                            );
                            if let Err(e) = channel.dispatch(&update) {
                                warn!("Feed update for {} rejected: {}", product_id, e);
                            }
                        }
                    },
                }
            }
            info!("Stock feed stopped");
        });

        stop_tx
    }
}
