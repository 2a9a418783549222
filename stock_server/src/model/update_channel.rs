//! Product-keyed update registry.
//!
//! `UpdateChannel` routes `StockUpdate`s to the callbacks registered for the update's
//! product id. It is a plain constructed object shared as `Arc<UpdateChannel>`, so
//! independent registries can coexist (one per server, one per test).
//!
//! Design notes:
//! - Each product key holds a set of callbacks. Identity is the `Arc` allocation, so
//!   registering the same callback twice is a no-op and it is delivered once.
//! - `dispatch` copies the matching callbacks out of the lock before invoking them;
//!   callbacks may therefore subscribe/unsubscribe from inside a delivery.
//! - A closed channel refuses new subscriptions and drops every update. This is how
//!   an unavailable channel is modelled.

use log::{debug, trace};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use stock_common::{Result, StockError, StockUpdate};

/// Callback invoked for every update routed to its product.
pub type UpdateCallback = Arc<dyn Fn(&StockUpdate) + Send + Sync>;

/// Process-wide registry of per-product update callbacks.
#[derive(Default)]
pub struct UpdateChannel {
    routes: RwLock<HashMap<String, Vec<UpdateCallback>>>,
    closed: AtomicBool,
}

fn same_callback(a: &UpdateCallback, b: &UpdateCallback) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl UpdateChannel {
    /// Create an empty, open channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for updates addressed to `product_id`.
    ///
    /// Returns `Ok(false)` if this exact callback is already registered for the product.
    pub fn subscribe(&self, product_id: &str, callback: UpdateCallback) -> Result<bool> {
        if product_id.trim().is_empty() {
            return Err(StockError::EmptyProductId);
        }
        if self.is_closed() {
            return Err(StockError::ChannelClosed);
        }

        let mut routes = self.routes.write()?;
        let callbacks = routes.entry(product_id.to_string()).or_default();
        if callbacks.iter().any(|existing| same_callback(existing, &callback)) {
            return Ok(false);
        }
        callbacks.push(callback);
        debug!(
            "Subscribed to product {}. Callbacks for product: {}",
            product_id,
            callbacks.len()
        );
        Ok(true)
    }

    /// Remove `callback` from `product_id`. Other callbacks are left untouched.
    ///
    /// Returns whether the callback was registered.
    pub fn unsubscribe(&self, product_id: &str, callback: &UpdateCallback) -> Result<bool> {
        let mut routes = self.routes.write()?;
        let Some(callbacks) = routes.get_mut(product_id) else {
            return Ok(false);
        };

        let before = callbacks.len();
        callbacks.retain(|existing| !same_callback(existing, callback));
        let removed = callbacks.len() != before;
        if callbacks.is_empty() {
            routes.remove(product_id);
        }
        if removed {
            debug!("Unsubscribed from product {}", product_id);
        }
        Ok(removed)
    }

    /// Validate `update` and deliver it to every callback registered for its product.
    ///
    /// Callbacks run synchronously on the calling thread. Returns how many were invoked.
    pub fn dispatch(&self, update: &StockUpdate) -> Result<usize> {
        update.validate()?;
        if self.is_closed() {
            trace!("Channel closed, dropping update for {}", update.product_id);
            return Ok(0);
        }

        let callbacks: Vec<UpdateCallback> = {
            let routes = self.routes.read()?;
            match routes.get(&update.product_id) {
                Some(callbacks) => callbacks.clone(),
                None => return Ok(0),
            }
        };

        for callback in &callbacks {
            callback(update);
        }
        trace!(
            "Delivered update for {} to {} callback(s)",
            update.product_id,
            callbacks.len()
        );
        Ok(callbacks.len())
    }

    /// Decode a JSON update, validate it and dispatch it.
    pub fn publish_json(&self, bytes: &[u8]) -> Result<usize> {
        let update = StockUpdate::from_json(bytes)?;
        self.dispatch(&update)
    }

    /// Number of callbacks registered for `product_id`.
    pub fn subscriber_count(&self, product_id: &str) -> usize {
        self.routes
            .read()
            .map(|routes| routes.get(product_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Number of products with at least one callback.
    pub fn product_count(&self) -> usize {
        self.routes.read().map(|routes| routes.len()).unwrap_or(0)
    }

    /// Stop accepting subscriptions and drop all registered callbacks.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut routes) = self.routes.write() {
            routes.clear();
        }
    }

    /// Whether [`UpdateChannel::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
