//! Efirka core — watches YouTube channels and detects new live broadcasts.
//!
//! This library has zero Telegram dependency. The polling engine emits
//! `LiveNotification` structs through a `tokio::mpsc` channel; the bot
//! crate receives and formats them.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, metrics
//! - `storage`: SQLite persistence (subscriptions, destinations, live state)
//! - `youtube`: quota-aware Data API client and live-status resolver
//! - `watch`: the polling engine (cooldown gate, dedup, fan-out)

pub mod core;
pub mod storage;
pub mod watch;
pub mod youtube;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool, Store};
pub use watch::{start_poller, LiveNotification, PollerConfig};
pub use youtube::{LiveBroadcast, LiveResolver, YoutubeApi};
