//! Background scheduler that periodically sweeps tracked channels for new
//! live broadcasts.
//!
//! Runs as a `tokio::spawn`ed task, emitting `LiveNotification`s through an
//! mpsc channel. One iteration = one sweep over every tracked channel:
//! cooldown gate, live detection, dedup by broadcast id, state commit,
//! fan-out to subscribers and destinations. Sweeps never overlap — the
//! inter-sweep sleep starts only after the sweep finishes.

use crate::core::{config, metrics};
use crate::watch::traits::{LiveNotification, LiveSource, LiveStateStore, SubscriptionStore};
use crate::youtube::resolver;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    /// Sleep between sweeps.
    pub interval: Duration,
    /// Per-channel poll suppression after a notification; zero disables.
    /// Gates polling only — dedup stays id-based and unaffected.
    pub cooldown: Duration,
}

impl PollerConfig {
    pub fn from_env() -> Self {
        Self {
            interval: config::poller::interval(),
            cooldown: config::poller::cooldown(),
        }
    }
}

/// Start the polling background task.
///
/// Returns a receiver for `LiveNotification`s that should be consumed by
/// the Telegram notification dispatcher. Cancelling `shutdown` interrupts
/// both the inter-sweep sleep and an in-flight sweep; persisted writes only
/// ever happen after a complete detect+dedup decision, so abandoning a
/// sweep mid-flight cannot corrupt state.
pub fn start_poller(
    subs: Arc<dyn SubscriptionStore>,
    state: Arc<dyn LiveStateStore>,
    source: Arc<dyn LiveSource>,
    config: PollerConfig,
    shutdown: CancellationToken,
) -> mpsc::UnboundedReceiver<LiveNotification> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        log::info!(
            "Live poller started (interval: {}s, cooldown: {}s)",
            config.interval.as_secs(),
            config.cooldown.as_secs()
        );

        loop {
            let receiver_alive = tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("Live poller shutdown requested");
                    break;
                }
                alive = run_sweep(subs.as_ref(), state.as_ref(), source.as_ref(), config.cooldown, &tx) => alive,
            };
            if !receiver_alive {
                log::warn!("Notification channel closed, stopping poller");
                break;
            }
            metrics::POLL_SWEEPS_TOTAL.inc();

            tokio::select! {
                _ = shutdown.cancelled() => {
                    log::info!("Live poller shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(config.interval) => {}
            }
        }
    });

    rx
}

/// Run one sweep over all tracked channels.
///
/// Per-channel failures are logged and isolated — they never abort the
/// sweep for the remaining channels. Returns `false` once the notification
/// receiver has been dropped.
pub async fn run_sweep(
    subs: &dyn SubscriptionStore,
    state: &dyn LiveStateStore,
    source: &dyn LiveSource,
    cooldown: Duration,
    tx: &mpsc::UnboundedSender<LiveNotification>,
) -> bool {
    let channels = match subs.tracked_channels() {
        Ok(channels) => channels,
        Err(e) => {
            log::error!("Failed to list tracked channels: {}", e);
            return true;
        }
    };
    if channels.is_empty() {
        return true;
    }

    log::debug!("Poll sweep: {} tracked channel(s)", channels.len());

    for channel_id in &channels {
        let notifications = match check_channel(subs, state, source, cooldown, channel_id).await {
            Ok(notifications) => notifications,
            Err(e) => {
                log::warn!("Check failed for {}: {}", channel_id, e);
                continue;
            }
        };

        for notification in notifications {
            if tx.send(notification).is_err() {
                return false;
            }
            metrics::LIVE_NOTIFICATIONS_TOTAL.inc();
        }
    }

    true
}

/// Check one channel: cooldown gate → detect → dedup → commit.
///
/// Returns the notifications to emit — empty when the channel is gated,
/// not live, or already notified for this broadcast.
async fn check_channel(
    subs: &dyn SubscriptionStore,
    state: &dyn LiveStateStore,
    source: &dyn LiveSource,
    cooldown: Duration,
    channel_id: &str,
) -> crate::core::AppResult<Vec<LiveNotification>> {
    // Cooldown gate: skip the API call entirely while the window is open.
    // An unparsable stored timestamp fails open.
    if let Some(raw) = state.cooldown_until(channel_id)? {
        match parse_timestamp(&raw) {
            Some(until) if Utc::now() < until => {
                log::debug!("{}: cooling down until {}", channel_id, until);
                return Ok(Vec::new());
            }
            Some(_) => {}
            None => {
                log::debug!("{}: ignoring unparsable cooldown timestamp {:?}", channel_id, raw);
            }
        }
    }

    let Some(live) = source.live_now(channel_id).await else {
        // Not live, or status unknown this cycle — same handling.
        return Ok(Vec::new());
    };

    // Dedup is purely by broadcast id, independent of the cooldown.
    if state.last_video(channel_id)?.as_deref() == Some(live.video_id.as_str()) {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    state.set_last_video(channel_id, &live.video_id, now)?;
    if !cooldown.is_zero() {
        let until = now + chrono::Duration::seconds(cooldown.as_secs() as i64);
        state.set_cooldown_until(channel_id, until)?;
    }

    let mut recipients = subs.subscribers_of(channel_id)?;
    recipients.extend(subs.destinations_of(channel_id)?);

    log::info!(
        "{}: new live broadcast {} — notifying {} recipient(s)",
        channel_id,
        live.video_id,
        recipients.len()
    );

    let video_url = resolver::video_url(&live.video_id);
    Ok(recipients
        .into_iter()
        .map(|chat_id| LiveNotification {
            chat_id,
            channel_id: channel_id.to_string(),
            channel_title: live.channel_title.clone(),
            video_title: live.video_title.clone(),
            video_url: video_url.clone(),
        })
        .collect())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_utc() {
        let ts = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn parse_failure_is_none() {
        assert!(parse_timestamp("not a timestamp").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
