use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: efirka.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "efirka.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: efirka.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "efirka.log".to_string()));

/// YouTube Data API keys, in rotation order.
///
/// Read from YT_API_KEYS (comma, semicolon or newline separated), falling
/// back to the single-key YT_API_KEY. An empty list is a fatal startup
/// error — the binary refuses to run without at least one key.
pub static YT_API_KEYS: Lazy<Vec<String>> = Lazy::new(|| {
    let multi = env::var("YT_API_KEYS").unwrap_or_default();
    if !multi.trim().is_empty() {
        return parse_key_list(&multi);
    }
    env::var("YT_API_KEY")
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .map(|k| vec![k])
        .unwrap_or_default()
});

/// Interval between polling sweeps (in seconds)
/// Read from POLL_INTERVAL environment variable
/// Default: 120
pub static POLL_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| parse_env_u64("POLL_INTERVAL", 120));

/// Per-channel cooldown after a detected broadcast (in seconds).
///
/// While the cooldown is active the channel is not polled at all, to
/// conserve API quota. It does NOT reset dedup: a different broadcast
/// starting inside the window is detected on the first sweep after the
/// window expires. 0 disables the cooldown.
/// Read from COOLDOWN_SECONDS environment variable, default 3600.
pub static COOLDOWN_SECONDS: Lazy<u64> = Lazy::new(|| parse_env_u64("COOLDOWN_SECONDS", 3600));

/// Optional allow-list of Telegram user IDs permitted to issue commands.
/// Read from ALLOWED_USER_IDS (comma or semicolon separated integers).
/// Unset or empty means everyone is allowed.
pub static ALLOWED_USER_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
    env::var("ALLOWED_USER_IDS")
        .unwrap_or_default()
        .replace(';', ",")
        .split(',')
        .filter_map(|s| s.trim().parse::<i64>().ok())
        .collect()
});

/// Prometheus endpoint port; unset disables the metrics server.
/// Read from METRICS_PORT environment variable
pub static METRICS_PORT: Lazy<Option<u16>> =
    Lazy::new(|| env::var("METRICS_PORT").ok().and_then(|v| v.trim().parse().ok()));

fn parse_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// Split a key list on commas, semicolons and newlines, dropping blanks.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.replace(';', ",")
        .replace('\n', ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// YouTube API client configuration
pub mod youtube {
    use super::Duration;

    /// Attempts per API key before giving up on a call
    pub const RETRY_ATTEMPTS: u32 = 3;

    /// Initial backoff delay between attempts (doubles each attempt)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Timeout for a single HTTP request to the Data API
    pub const HTTP_TIMEOUT_SECS: u64 = 15;

    /// Channel-title cache capacity
    pub const TITLE_CACHE_CAPACITY: u64 = 1_000;

    /// Channel-title cache time-to-live (seconds)
    pub const TITLE_CACHE_TTL_SECS: u64 = 3600;

    /// Initial backoff delay duration
    pub fn base_delay() -> Duration {
        Duration::from_millis(RETRY_BASE_DELAY_MS)
    }

    /// HTTP request timeout duration
    pub fn http_timeout() -> Duration {
        Duration::from_secs(HTTP_TIMEOUT_SECS)
    }

    /// Title cache TTL duration
    pub fn title_cache_ttl() -> Duration {
        Duration::from_secs(TITLE_CACHE_TTL_SECS)
    }
}

/// Polling engine configuration helpers
pub mod poller {
    use super::Duration;

    /// Poll interval duration
    pub fn interval() -> Duration {
        Duration::from_secs(*super::POLL_INTERVAL_SECS)
    }

    /// Cooldown duration (zero disables the gate)
    pub fn cooldown() -> Duration {
        Duration::from_secs(*super::COOLDOWN_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key_list_splits_on_all_separators() {
        let keys = parse_key_list("aaa, bbb;ccc\nddd");
        assert_eq!(keys, vec!["aaa", "bbb", "ccc", "ddd"]);
    }

    #[test]
    fn parse_key_list_drops_blanks() {
        let keys = parse_key_list(" , key1 ,, ;\n key2 ");
        assert_eq!(keys, vec!["key1", "key2"]);
    }

    #[test]
    fn parse_key_list_empty_input() {
        assert!(parse_key_list("").is_empty());
        assert!(parse_key_list("  \n ; , ").is_empty());
    }
}
