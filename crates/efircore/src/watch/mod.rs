//! Live-broadcast polling engine.
//!
//! Architecture: the engine is independent from teloxide. It emits
//! `LiveNotification` structs through a `tokio::mpsc` channel. The
//! Telegram layer (`efirbot`) receives and formats them.

pub mod scheduler;
pub mod traits;

pub use scheduler::{run_sweep, start_poller, PollerConfig};
pub use traits::{DeliveryStatus, LiveNotification, LiveSource, LiveStateStore, SubscriptionStore};
