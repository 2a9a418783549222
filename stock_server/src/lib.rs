//! Stock level streaming server library.
//!
//! - `model`: update channel, per-consumer subscriptions and the synthetic feed.
//! - `session`: per-connection command handling and snapshot forwarding.
//! - `receiver`: TCP accept loop spawning one session per connection.
#![warn(missing_docs)]
pub mod model;
pub mod receiver;
pub mod session;
