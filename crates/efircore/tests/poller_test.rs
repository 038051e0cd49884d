//! Engine-level tests for the polling scheduler, driven through in-memory
//! fakes of the store and live-source seams.

use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use efircore::core::{AppError, AppResult};
use efircore::watch::{
    run_sweep, start_poller, LiveNotification, LiveSource, LiveStateStore, PollerConfig,
    SubscriptionStore,
};
use efircore::youtube::LiveBroadcast;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeSubs {
    subscribers: HashMap<String, BTreeSet<i64>>,
    destinations: HashMap<String, BTreeSet<i64>>,
}

impl FakeSubs {
    fn with_subscriber(mut self, channel: &str, chat: i64) -> Self {
        self.subscribers.entry(channel.to_string()).or_default().insert(chat);
        self
    }

    fn with_destination(mut self, channel: &str, chat: i64) -> Self {
        self.destinations.entry(channel.to_string()).or_default().insert(chat);
        self
    }
}

impl SubscriptionStore for FakeSubs {
    fn tracked_channels(&self) -> AppResult<BTreeSet<String>> {
        Ok(self
            .subscribers
            .keys()
            .chain(self.destinations.keys())
            .cloned()
            .collect())
    }

    fn subscribers_of(&self, channel_id: &str) -> AppResult<BTreeSet<i64>> {
        Ok(self.subscribers.get(channel_id).cloned().unwrap_or_default())
    }

    fn destinations_of(&self, channel_id: &str) -> AppResult<BTreeSet<i64>> {
        Ok(self.destinations.get(channel_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct MemState {
    last: Mutex<HashMap<String, String>>,
    cooldown: Mutex<HashMap<String, String>>,
    /// Channels whose state writes fail, to simulate per-channel faults.
    broken: HashSet<String>,
}

impl MemState {
    fn with_cooldown(self, channel: &str, raw: &str) -> Self {
        self.cooldown.lock().unwrap().insert(channel.to_string(), raw.to_string());
        self
    }

    fn broken_for(mut self, channel: &str) -> Self {
        self.broken.insert(channel.to_string());
        self
    }

    fn last_of(&self, channel: &str) -> Option<String> {
        self.last.lock().unwrap().get(channel).cloned()
    }

    fn cooldown_of(&self, channel: &str) -> Option<String> {
        self.cooldown.lock().unwrap().get(channel).cloned()
    }
}

impl LiveStateStore for MemState {
    fn last_video(&self, channel_id: &str) -> AppResult<Option<String>> {
        Ok(self.last.lock().unwrap().get(channel_id).cloned())
    }

    fn set_last_video(&self, channel_id: &str, video_id: &str, _at: DateTime<Utc>) -> AppResult<()> {
        if self.broken.contains(channel_id) {
            return Err(AppError::Validation(format!("state write failed for {}", channel_id)));
        }
        self.last
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), video_id.to_string());
        Ok(())
    }

    fn cooldown_until(&self, channel_id: &str) -> AppResult<Option<String>> {
        Ok(self.cooldown.lock().unwrap().get(channel_id).cloned())
    }

    fn set_cooldown_until(&self, channel_id: &str, until: DateTime<Utc>) -> AppResult<()> {
        self.cooldown
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), until.to_rfc3339());
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedSource {
    live: Mutex<HashMap<String, LiveBroadcast>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn set_live(&self, channel: &str, video: &str) {
        self.live.lock().unwrap().insert(
            channel.to_string(),
            LiveBroadcast {
                channel_id: channel.to_string(),
                channel_title: Some(format!("{} title", channel)),
                video_id: video.to_string(),
                video_title: Some("stream".to_string()),
                started_at: None,
            },
        );
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LiveSource for ScriptedSource {
    async fn live_now(&self, channel_id: &str) -> Option<LiveBroadcast> {
        self.calls.lock().unwrap().push(channel_id.to_string());
        self.live.lock().unwrap().get(channel_id).cloned()
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<LiveNotification>) -> Vec<LiveNotification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

const CHANNEL: &str = "UCchannel000000000000a";

#[tokio::test]
async fn first_detection_notifies_subscribers_and_destinations() {
    let subs = FakeSubs::default()
        .with_subscriber(CHANNEL, 100)
        .with_subscriber(CHANNEL, 200)
        .with_destination(CHANNEL, -1001);
    let state = MemState::default();
    let source = ScriptedSource::default();
    source.set_live(CHANNEL, "v1");

    let (tx, mut rx) = mpsc::unbounded_channel();
    assert!(run_sweep(&subs, &state, &source, Duration::from_secs(60), &tx).await);

    let notifications = drain(&mut rx);
    let chats: BTreeSet<i64> = notifications.iter().map(|n| n.chat_id).collect();
    assert_eq!(chats.into_iter().collect::<Vec<_>>(), vec![-1001, 100, 200]);
    assert!(notifications
        .iter()
        .all(|n| n.video_url == "https://www.youtube.com/watch?v=v1"));

    assert_eq!(state.last_of(CHANNEL).as_deref(), Some("v1"));
    assert!(state.cooldown_of(CHANNEL).is_some());
}

#[tokio::test]
async fn same_broadcast_is_notified_at_most_once() {
    let subs = FakeSubs::default().with_subscriber(CHANNEL, 100);
    let state = MemState::default();
    let source = ScriptedSource::default();
    source.set_live(CHANNEL, "v1");

    let (tx, mut rx) = mpsc::unbounded_channel();
    // Cooldown disabled so the gate cannot mask a dedup failure.
    run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await;
    run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await;
    run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await;

    assert_eq!(drain(&mut rx).len(), 1);
    assert!(state.cooldown_of(CHANNEL).is_none());
}

#[tokio::test]
async fn cooldown_gate_spends_no_api_call() {
    let subs = FakeSubs::default().with_subscriber(CHANNEL, 100);
    let until = (Utc::now() + TimeDelta::hours(1)).to_rfc3339();
    let state = MemState::default().with_cooldown(CHANNEL, &until);
    let source = ScriptedSource::default();
    source.set_live(CHANNEL, "v1");

    let (tx, mut rx) = mpsc::unbounded_channel();
    run_sweep(&subs, &state, &source, Duration::from_secs(3600), &tx).await;
    run_sweep(&subs, &state, &source, Duration::from_secs(3600), &tx).await;

    assert!(source.calls().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn expired_cooldown_polls_again() {
    let subs = FakeSubs::default().with_subscriber(CHANNEL, 100);
    let until = (Utc::now() - TimeDelta::minutes(5)).to_rfc3339();
    let state = MemState::default().with_cooldown(CHANNEL, &until);
    let source = ScriptedSource::default();
    source.set_live(CHANNEL, "v1");

    let (tx, mut rx) = mpsc::unbounded_channel();
    run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await;

    assert_eq!(source.calls(), vec![CHANNEL.to_string()]);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn corrupt_cooldown_timestamp_fails_open() {
    let subs = FakeSubs::default().with_subscriber(CHANNEL, 100);
    let state = MemState::default().with_cooldown(CHANNEL, "definitely-not-a-timestamp");
    let source = ScriptedSource::default();
    source.set_live(CHANNEL, "v1");

    let (tx, mut rx) = mpsc::unbounded_channel();
    run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await;

    assert_eq!(source.calls(), vec![CHANNEL.to_string()]);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn a_new_broadcast_id_is_a_new_notification() {
    let subs = FakeSubs::default().with_subscriber(CHANNEL, 100);
    let state = MemState::default();
    let source = ScriptedSource::default();

    let (tx, mut rx) = mpsc::unbounded_channel();
    source.set_live(CHANNEL, "v1");
    run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await;
    // The first stream ends; a different one starts.
    source.set_live(CHANNEL, "v2");
    run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await;

    let notifications = drain(&mut rx);
    assert_eq!(notifications.len(), 2);
    assert_eq!(state.last_of(CHANNEL).as_deref(), Some("v2"));
}

#[tokio::test]
async fn channel_failure_does_not_abort_the_sweep() {
    let broken = "UCbroken00000000000000";
    let healthy = "UChealthy0000000000000";
    let subs = FakeSubs::default()
        .with_subscriber(broken, 100)
        .with_subscriber(healthy, 200);
    // BTreeSet ordering puts the broken channel first in the sweep.
    assert!(broken < healthy);
    let state = MemState::default().broken_for(broken);
    let source = ScriptedSource::default();
    source.set_live(broken, "v1");
    source.set_live(healthy, "v2");

    let (tx, mut rx) = mpsc::unbounded_channel();
    assert!(run_sweep(&subs, &state, &source, Duration::ZERO, &tx).await);

    let notifications = drain(&mut rx);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].chat_id, 200);
    assert_eq!(notifications[0].channel_id, healthy);
}

#[tokio::test]
async fn cancellation_stops_the_poller_promptly() {
    let subs = Arc::new(FakeSubs::default());
    let state = Arc::new(MemState::default());
    let source = Arc::new(ScriptedSource::default());
    let shutdown = CancellationToken::new();

    let mut rx = start_poller(
        subs,
        state,
        source,
        PollerConfig {
            interval: Duration::from_secs(3600),
            cooldown: Duration::ZERO,
        },
        shutdown.clone(),
    );

    shutdown.cancel();

    // The task drops its sender once the (hour-long) sleep is interrupted.
    let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    assert_eq!(closed.expect("poller did not stop in time").map(|_| ()), None);
}
