//! Live per-product stock snapshot bound to one consumer.
//!
//! A `StockSubscription` registers a callback on an [`UpdateChannel`] for a single
//! product id and keeps the latest `StockSnapshot` for it. Every applied update
//! replaces the snapshot with a merged copy and is announced to every receiver
//! handed out by `changes()`.
//!
//! Lifecycle:
//! - `initialize`: `Subscribed` when the product id is non-empty and the channel
//!   accepts the callback, otherwise `Unsubscribed` with a static snapshot.
//! - `teardown`: deregisters the callback. Also runs on drop.
//! - `reconfigure`: teardown, then initialize for another product.
//!
//! Fencing: the callback captures the generation it was created for. Teardown bumps
//! the generation under the snapshot lock, so an update that was already in flight
//! when teardown returned finds a different generation and is discarded.

use crate::model::update_channel::{UpdateCallback, UpdateChannel};
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use stock_common::{SnapshotChange, StockSnapshot, StockUpdate};

/// Whether a subscription currently has a callback registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// No callback registered; the snapshot is static.
    Unsubscribed,
    /// Receiving updates for `product_id()`.
    Subscribed,
}

struct SnapshotState {
    snapshot: StockSnapshot,
    generation: u64,
    listeners: Vec<Sender<SnapshotChange>>,
}

/// One consumer's subscription to one product.
pub struct StockSubscription {
    channel: Arc<UpdateChannel>,
    product_id: Option<String>,
    callback: Option<UpdateCallback>,
    state: Arc<Mutex<SnapshotState>>,
}

impl StockSubscription {
    /// Create a subscription for `product_id` starting from `initial` (or empty).
    ///
    /// The id is used exactly as given; updates must carry the same string to match.
    /// A blank `product_id` or a channel that refuses the callback leaves the
    /// subscription `Unsubscribed`; the snapshot then stays at its initial value.
    pub fn initialize(
        channel: Arc<UpdateChannel>,
        product_id: &str,
        initial: Option<StockSnapshot>,
    ) -> Self {
        let mut subscription = Self {
            channel,
            product_id: None,
            callback: None,
            state: Arc::new(Mutex::new(SnapshotState {
                snapshot: StockSnapshot::default(),
                generation: 0,
                listeners: Vec::new(),
            })),
        };
        subscription.activate(product_id, initial.unwrap_or_default());
        subscription
    }

    /// Switch to `product_id`.
    ///
    /// The old callback is removed before the new one is registered and the snapshot
    /// restarts empty, so nothing from the previous product leaks into the new one.
    pub fn reconfigure(&mut self, product_id: &str) {
        self.teardown();
        self.activate(product_id, StockSnapshot::default());
    }

    /// Deregister the callback. Returns `false` if there was nothing to tear down.
    ///
    /// Once this returns no further update is applied, even one already being
    /// delivered on another thread.
    pub fn teardown(&mut self) -> bool {
        let Some(callback) = self.callback.take() else {
            return false;
        };
        let product_id = self.product_id.take().unwrap_or_default();

        match self.state.lock() {
            Ok(mut state) => state.generation += 1,
            Err(poisoned) => poisoned.into_inner().generation += 1,
        }
        if let Err(e) = self.channel.unsubscribe(&product_id, &callback) {
            warn!("Failed to unsubscribe from product {}: {}", product_id, e);
        }
        debug!("Subscription for product {} torn down", product_id);
        true
    }

    /// Current snapshot value.
    pub fn snapshot(&self) -> StockSnapshot {
        match self.state.lock() {
            Ok(state) => state.snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().snapshot.clone(),
        }
    }

    /// Product id of the active subscription, if any.
    pub fn product_id(&self) -> Option<&str> {
        self.product_id.as_deref()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SubscriptionStatus {
        if self.callback.is_some() {
            SubscriptionStatus::Subscribed
        } else {
            SubscriptionStatus::Unsubscribed
        }
    }

    /// New receiver for the snapshots produced by applied updates, in application order.
    ///
    /// Every receiver sees every change made after it was created. Dropped receivers
    /// are pruned on the next change.
    pub fn changes(&self) -> Receiver<SnapshotChange> {
        let (tx, rx) = unbounded();
        match self.state.lock() {
            Ok(mut state) => state.listeners.push(tx),
            Err(poisoned) => poisoned.into_inner().listeners.push(tx),
        }
        rx
    }

    fn activate(&mut self, product_id: &str, initial: StockSnapshot) {
        let generation = match self.state.lock() {
            Ok(mut state) => {
                state.snapshot = initial;
                state.generation
            }
            Err(poisoned) => {
                let mut state = poisoned.into_inner();
                state.snapshot = initial;
                state.generation
            }
        };

        if product_id.trim().is_empty() {
            debug!("No product id given, snapshot stays static");
            return;
        }

        let callback = self.make_callback(product_id.to_string(), generation);
        match self.channel.subscribe(product_id, Arc::clone(&callback)) {
            Ok(_) => {
                debug!("Subscribed to stock updates for product {}", product_id);
                self.product_id = Some(product_id.to_string());
                self.callback = Some(callback);
            }
            Err(e) => warn!(
                "Stock updates for product {} unavailable, showing static snapshot: {}",
                product_id, e
            ),
        }
    }

    fn make_callback(&self, product_id: String, generation: u64) -> UpdateCallback {
        let state = Arc::clone(&self.state);

        Arc::new(move |update: &StockUpdate| {
            if update.product_id != product_id {
                return;
            }
            let Ok(mut state) = state.lock() else {
                return;
            };
            if state.generation != generation {
                return;
            }
            let snapshot = state.snapshot.merged(update);
            let change = SnapshotChange {
                product_id: product_id.clone(),
                snapshot: snapshot.clone(),
            };
            state.snapshot = snapshot;
            // Sent under the lock so every receiver sees application order.
            state
                .listeners
                .retain(|listener| listener.send(change.clone()).is_ok());
        })
    }
}

impl Drop for StockSubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Arc<UpdateChannel> {
        Arc::new(UpdateChannel::new())
    }

    #[test]
    fn test_initialize_without_snapshot_is_empty() {
        let subscription = StockSubscription::initialize(channel(), "1", None);
        assert_eq!(subscription.status(), SubscriptionStatus::Subscribed);
        assert_eq!(subscription.snapshot(), StockSnapshot::default());
    }

    #[test]
    fn test_other_products_are_ignored() {
        let channel = channel();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);
        let changes = subscription.changes();

        channel
            .dispatch(&StockUpdate::new("2").with_quantity(9))
            .unwrap();

        assert!(subscription.snapshot().is_empty());
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_updates_merge_present_fields() {
        let channel = channel();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);

        channel
            .dispatch(&StockUpdate::new("1").with_quantity(5))
            .unwrap();
        channel
            .dispatch(&StockUpdate::new("1").with_status("OUT_OF_STOCK"))
            .unwrap();

        let snapshot = subscription.snapshot();
        assert_eq!(snapshot.stock_quantity, Some(5));
        assert_eq!(snapshot.stock_status.as_deref(), Some("OUT_OF_STOCK"));
    }

    #[test]
    fn test_changes_follow_application_order() {
        let channel = channel();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);
        let changes = subscription.changes();

        for quantity in [3, 2, 1] {
            channel
                .dispatch(&StockUpdate::new("1").with_quantity(quantity))
                .unwrap();
        }

        let seen: Vec<Option<i64>> = changes
            .try_iter()
            .map(|change| change.snapshot.stock_quantity)
            .collect();
        assert_eq!(seen, vec![Some(3), Some(2), Some(1)]);
    }

    #[test]
    fn test_every_receiver_sees_every_change() {
        let channel = channel();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);
        let first = subscription.changes();
        let second = subscription.changes();
        drop(subscription.changes());

        channel
            .dispatch(&StockUpdate::new("1").with_available(false))
            .unwrap();

        assert_eq!(first.try_iter().count(), 1);
        let change = second.try_recv().unwrap();
        assert_eq!(change.product_id, "1");
        assert_eq!(change.snapshot.available_for_sale, Some(false));
    }

    #[test]
    fn test_initial_snapshot_is_kept_until_update() {
        let initial = StockSnapshot {
            stock_status: Some("IN_STOCK".to_string()),
            stock_quantity: Some(4),
            ..StockSnapshot::default()
        };
        let channel = channel();
        let subscription =
            StockSubscription::initialize(Arc::clone(&channel), "1", Some(initial.clone()));
        assert_eq!(subscription.snapshot(), initial);

        channel
            .dispatch(&StockUpdate::new("1").with_quantity(3))
            .unwrap();
        let snapshot = subscription.snapshot();
        assert_eq!(snapshot.stock_status.as_deref(), Some("IN_STOCK"));
        assert_eq!(snapshot.stock_quantity, Some(3));
    }

    #[test]
    fn test_empty_product_id_stays_static() {
        let channel = channel();
        let initial = StockSnapshot {
            stock_quantity: Some(1),
            ..StockSnapshot::default()
        };
        let subscription =
            StockSubscription::initialize(Arc::clone(&channel), "", Some(initial.clone()));

        assert_eq!(subscription.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(subscription.product_id(), None);
        assert_eq!(channel.product_count(), 0);
        assert_eq!(subscription.snapshot(), initial);
    }

    #[test]
    fn test_product_id_matches_exactly() {
        let channel = channel();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), " 42", None);
        assert_eq!(subscription.product_id(), Some(" 42"));

        channel
            .dispatch(&StockUpdate::new("42").with_quantity(1))
            .unwrap();
        assert!(subscription.snapshot().is_empty());

        channel
            .dispatch(&StockUpdate::new(" 42").with_quantity(2))
            .unwrap();
        assert_eq!(subscription.snapshot().stock_quantity, Some(2));
    }

    #[test]
    fn test_blank_product_id_stays_static() {
        let channel = channel();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), "  ", None);

        assert_eq!(subscription.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(channel.product_count(), 0);
    }

    #[test]
    fn test_unavailable_channel_degrades_to_static() {
        let channel = channel();
        channel.close();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);

        assert_eq!(subscription.status(), SubscriptionStatus::Unsubscribed);
        channel
            .dispatch(&StockUpdate::new("1").with_quantity(1))
            .unwrap();
        assert!(subscription.snapshot().is_empty());
    }

    #[test]
    fn test_teardown_stops_updates() {
        let channel = channel();
        let mut subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);

        assert!(subscription.teardown());
        assert!(!subscription.teardown());
        channel
            .dispatch(&StockUpdate::new("1").with_quantity(5))
            .unwrap();

        assert_eq!(subscription.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(channel.subscriber_count("1"), 0);
        assert!(subscription.snapshot().is_empty());
    }

    #[test]
    fn test_in_flight_update_after_teardown_is_discarded() {
        let channel = channel();
        let mut subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);
        let changes = subscription.changes();
        // Grab the callback the way a dispatcher that already copied it out would.
        let in_flight = subscription.callback.clone().unwrap();

        subscription.teardown();
        in_flight(&StockUpdate::new("1").with_quantity(5));

        assert!(subscription.snapshot().is_empty());
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_reconfigure_switches_products() {
        let channel = channel();
        let mut subscription = StockSubscription::initialize(Arc::clone(&channel), "A", None);
        let stale = subscription.callback.clone().unwrap();

        subscription.reconfigure("B");
        channel
            .dispatch(&StockUpdate::new("A").with_quantity(1))
            .unwrap();
        stale(&StockUpdate::new("A").with_quantity(2));
        channel
            .dispatch(&StockUpdate::new("B").with_quantity(7))
            .unwrap();

        assert_eq!(subscription.product_id(), Some("B"));
        assert_eq!(channel.subscriber_count("A"), 0);
        assert_eq!(channel.subscriber_count("B"), 1);
        assert_eq!(subscription.snapshot().stock_quantity, Some(7));
    }

    #[test]
    fn test_reconfigure_to_empty_unsubscribes() {
        let channel = channel();
        let mut subscription = StockSubscription::initialize(Arc::clone(&channel), "A", None);

        subscription.reconfigure("");

        assert_eq!(subscription.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(channel.product_count(), 0);
    }

    #[test]
    fn test_drop_deregisters() {
        let channel = channel();
        {
            let _subscription = StockSubscription::initialize(Arc::clone(&channel), "1", None);
            assert_eq!(channel.subscriber_count("1"), 1);
        }
        assert_eq!(channel.subscriber_count("1"), 0);
    }

    #[test]
    fn test_independent_consumers_own_their_snapshots() {
        let channel = channel();
        let first = StockSubscription::initialize(Arc::clone(&channel), "1", None);
        let mut second = StockSubscription::initialize(Arc::clone(&channel), "1", None);

        channel
            .dispatch(&StockUpdate::new("1").with_quantity(2))
            .unwrap();
        second.teardown();
        channel
            .dispatch(&StockUpdate::new("1").with_quantity(8))
            .unwrap();

        assert_eq!(first.snapshot().stock_quantity, Some(8));
        assert_eq!(second.snapshot().stock_quantity, Some(2));
    }

    #[test]
    fn test_end_to_end_product_42() {
        let channel = channel();
        let subscription = StockSubscription::initialize(Arc::clone(&channel), "42", None);

        channel
            .publish_json(
                br#"{"productId":"42","stockStatus":"IN_STOCK","stockQuantity":10,
                    "availableForSale":true,"timestamp":"2024-01-01T00:00:00Z"}"#,
            )
            .unwrap();

        assert_eq!(
            subscription.snapshot(),
            StockSnapshot {
                stock_status: Some("IN_STOCK".to_string()),
                stock_quantity: Some(10),
                available_for_sale: Some(true),
                last_updated: Some("2024-01-01T00:00:00Z".to_string()),
            }
        );
    }
}
