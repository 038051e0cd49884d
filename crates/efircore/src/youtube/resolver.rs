//! Live-status resolution on top of the Data API client.
//!
//! Every operation maps underlying call failures to `None` — for the
//! polling engine that means "status unknown this cycle", which is handled
//! the same as "not live": skip, retry on the next sweep, never escalate.

use crate::core::config;
use crate::watch::LiveSource;
use crate::youtube::client::YoutubeApi;
use async_trait::async_trait;
use moka::future::Cache;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Matches channel URLs of the `/channel/<id>` and `/@handle` forms.
static CHANNEL_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(www\.)?youtube\.com/(channel/|@)([A-Za-z0-9_\-\.]+)")
        .expect("Failed to compile channel URL regex")
});

/// Canonical watch URL for a broadcast.
pub fn video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// A currently running (or just-scheduled) live broadcast.
///
/// Transient: assembled fresh each poll; only the video id and the
/// notification timestamps are ever persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveBroadcast {
    pub channel_id: String,
    pub channel_title: Option<String>,
    pub video_id: String,
    pub video_title: Option<String>,
    /// Scheduled start if announced, otherwise the actual start (RFC 3339
    /// as returned by the API).
    pub started_at: Option<String>,
}

/// Resolves channel references and answers "is this channel live".
pub struct LiveResolver {
    api: YoutubeApi,
    /// Channel titles change rarely; cache them to keep `/list` and the
    /// notification path from spending quota on every lookup.
    titles: Cache<String, String>,
}

impl LiveResolver {
    pub fn new(api: YoutubeApi) -> Self {
        Self {
            api,
            titles: Cache::builder()
                .max_capacity(config::youtube::TITLE_CACHE_CAPACITY)
                .time_to_live(config::youtube::title_cache_ttl())
                .build(),
        }
    }

    /// Extract a handle or channel-path segment from a recognized URL.
    pub fn extract_channel_hint(text: &str) -> Option<&str> {
        CHANNEL_URL_RE
            .captures(text.trim())
            .and_then(|c| c.get(3))
            .map(|m| m.as_str())
    }

    /// Resolves a canonical id, `@handle`, profile URL or free-text name to
    /// a channel id.
    ///
    /// Canonical ids pass through unchecked and without any network call;
    /// everything else costs one search query.
    pub async fn resolve_channel_id(&self, reference: &str) -> Option<String> {
        let hint = Self::extract_channel_hint(reference).unwrap_or_else(|| reference.trim());
        if hint.starts_with("UC") && hint.len() >= 20 {
            return Some(hint.to_string());
        }

        let body = match self
            .api
            .call(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", hint),
                    ("type", "channel"),
                    ("maxResults", "1"),
                ],
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Channel search for {:?} failed: {}", hint, e);
                return None;
            }
        };

        first_item(&body)
            .and_then(|item| item.pointer("/snippet/channelId"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }

    /// Channel display title, memoized with a TTL. No freshness guarantee.
    pub async fn channel_title(&self, channel_id: &str) -> Option<String> {
        if let Some(title) = self.titles.get(channel_id).await {
            return Some(title);
        }

        let body = match self
            .api
            .call("channels", &[("part", "snippet"), ("id", channel_id)])
            .await
        {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Channel title lookup for {} failed: {}", channel_id, e);
                return None;
            }
        };

        let title = first_item(&body)
            .and_then(|item| item.pointer("/snippet/title"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)?;

        self.titles.insert(channel_id.to_string(), title.clone()).await;
        Some(title)
    }

    /// The channel's current live broadcast, if any.
    ///
    /// One live-event search; on a hit, a videos lookup for title/schedule
    /// and a channel-title lookup for display. Failures of the follow-up
    /// lookups degrade the descriptor (nullable fields) instead of
    /// dropping the detection.
    pub async fn live_now(&self, channel_id: &str) -> Option<LiveBroadcast> {
        let body = match self
            .api
            .call(
                "search",
                &[
                    ("part", "snippet"),
                    ("channelId", channel_id),
                    ("eventType", "live"),
                    ("type", "video"),
                    ("order", "date"),
                    ("maxResults", "1"),
                ],
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Live search for {} failed: {}", channel_id, e);
                return None;
            }
        };

        let video_id = first_item(&body)
            .and_then(|item| item.pointer("/id/videoId"))
            .and_then(JsonValue::as_str)?
            .to_string();

        let (video_title, started_at) = self.video_details(&video_id).await;
        let channel_title = self.channel_title(channel_id).await;

        Some(LiveBroadcast {
            channel_id: channel_id.to_string(),
            channel_title,
            video_id,
            video_title,
            started_at,
        })
    }

    async fn video_details(&self, video_id: &str) -> (Option<String>, Option<String>) {
        let body = match self
            .api
            .call(
                "videos",
                &[("part", "snippet,liveStreamingDetails"), ("id", video_id)],
            )
            .await
        {
            Ok(body) => body,
            Err(e) => {
                log::debug!("Video details lookup for {} failed: {}", video_id, e);
                return (None, None);
            }
        };

        let Some(item) = first_item(&body) else {
            return (None, None);
        };

        let title = item
            .pointer("/snippet/title")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let started_at = item
            .get("liveStreamingDetails")
            .and_then(|d| d.get("scheduledStartTime").or_else(|| d.get("actualStartTime")))
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        (title, started_at)
    }
}

#[async_trait]
impl LiveSource for LiveResolver {
    async fn live_now(&self, channel_id: &str) -> Option<LiveBroadcast> {
        LiveResolver::live_now(self, channel_id).await
    }
}

fn first_item(body: &JsonValue) -> Option<&JsonValue> {
    body.get("items")
        .and_then(JsonValue::as_array)
        .and_then(|items| items.first())
}
