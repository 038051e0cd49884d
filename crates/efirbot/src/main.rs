use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dptree;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;

use efircore::core::metrics_server::start_metrics_server;
use efircore::core::{config, init_logger, metrics};
use efircore::watch::{start_poller, LiveSource, LiveStateStore, PollerConfig, SubscriptionStore};
use efircore::{create_pool, LiveResolver, Store, YoutubeApi};
use efirka::telegram::{create_bot, schema, setup_bot_commands, start_notification_dispatcher, AddFlow};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration,
/// database, bot creation). Missing credentials are fatal here — the
/// polling engine assumes they exist once it starts.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;
    metrics::init_metrics();

    if config::BOT_TOKEN.is_empty() {
        return Err(anyhow::anyhow!("Missing BOT_TOKEN (or TELOXIDE_TOKEN) in environment/.env"));
    }
    let api_keys = config::YT_API_KEYS.clone();
    if api_keys.is_empty() {
        return Err(anyhow::anyhow!("Missing YT_API_KEY or YT_API_KEYS in environment/.env"));
    }
    log::info!("Loaded {} YouTube API key(s)", api_keys.len());

    let pool = Arc::new(create_pool(&config::DATABASE_PATH)?);
    let store = Arc::new(Store::new(pool));
    let resolver = Arc::new(LiveResolver::new(YoutubeApi::new(api_keys)?));

    // Background poller: emits LiveNotifications; cancelled on shutdown so
    // its inter-sweep sleep is interrupted promptly.
    let shutdown = CancellationToken::new();
    let notifications = start_poller(
        store.clone() as Arc<dyn SubscriptionStore>,
        store.clone() as Arc<dyn LiveStateStore>,
        resolver.clone() as Arc<dyn LiveSource>,
        PollerConfig::from_env(),
        shutdown.clone(),
    );

    let bot = create_bot()?;
    start_notification_dispatcher(bot.clone(), notifications);

    if let Some(port) = *config::METRICS_PORT {
        tokio::spawn(async move {
            if let Err(e) = start_metrics_server(port).await {
                log::error!("Metrics server failed: {}", e);
            }
        });
    }

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    log::info!(
        "Starting bot in long polling mode (poll interval: {}s, cooldown: {}s)",
        *config::POLL_INTERVAL_SECS,
        *config::COOLDOWN_SECONDS
    );

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            store.clone(),
            resolver.clone(),
            InMemStorage::<AddFlow>::new()
        ])
        .default_handler(|upd| async move {
            log::debug!("Unhandled update: {:?}", upd.id);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher stopped, shutting down poller");
    shutdown.cancel();

    Ok(())
}
