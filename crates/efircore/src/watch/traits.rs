//! Seams and event types for the polling engine.
//!
//! The stores are implemented by `crate::storage::Store` in production and
//! by in-memory fakes in tests; the live source is `LiveResolver`.

use crate::core::AppResult;
use crate::youtube::LiveBroadcast;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Answers "is this channel live right now".
///
/// `None` covers both "not live" and "status unknown this cycle" — the
/// engine handles them identically (skip, no state change, no penalty).
#[async_trait]
pub trait LiveSource: Send + Sync {
    async fn live_now(&self, channel_id: &str) -> Option<LiveBroadcast>;
}

/// Read side of the subscription data the engine consumes.
pub trait SubscriptionStore: Send + Sync {
    /// Every channel referenced by any subscription or destination mapping.
    fn tracked_channels(&self) -> AppResult<BTreeSet<String>>;

    /// Private chats subscribed to the channel.
    fn subscribers_of(&self, channel_id: &str) -> AppResult<BTreeSet<i64>>;

    /// Explicit delivery destinations registered for the channel.
    fn destinations_of(&self, channel_id: &str) -> AppResult<BTreeSet<i64>>;
}

/// Per-channel dedup and cooldown bookkeeping.
///
/// Timestamps are RFC 3339 UTC strings; readers must treat unparsable
/// stored values as absent (fail open) rather than blocking the channel.
pub trait LiveStateStore: Send + Sync {
    fn last_video(&self, channel_id: &str) -> AppResult<Option<String>>;

    /// Records the newly notified broadcast id together with the
    /// notification timestamp, in one write.
    fn set_last_video(&self, channel_id: &str, video_id: &str, at: DateTime<Utc>) -> AppResult<()>;

    fn cooldown_until(&self, channel_id: &str) -> AppResult<Option<String>>;

    fn set_cooldown_until(&self, channel_id: &str, until: DateTime<Utc>) -> AppResult<()>;
}

/// Notification sent through the mpsc channel to the Telegram layer.
/// One per recipient per newly detected broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveNotification {
    pub chat_id: i64,
    pub channel_id: String,
    pub channel_title: Option<String>,
    pub video_title: Option<String>,
    pub video_url: String,
}

/// Outcome of one delivery attempt. Collected by the dispatcher for
/// logging; a failed recipient never aborts the batch and is never
/// retried.
#[derive(Debug)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}
