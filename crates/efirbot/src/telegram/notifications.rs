//! Notification dispatcher: receives `LiveNotification`s from the engine
//! and sends formatted Telegram messages.
//!
//! Delivery is fire-and-forget per recipient: each send maps to a
//! `DeliveryStatus`, failures are counted and logged, nothing is retried
//! here and nothing aborts the batch.

use efircore::core::metrics;
use efircore::watch::{DeliveryStatus, LiveNotification};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use teloxide::utils::html;
use tokio::sync::mpsc;

/// Start the dispatcher task consuming the engine's receiver.
pub fn start_notification_dispatcher(bot: Bot, mut rx: mpsc::UnboundedReceiver<LiveNotification>) {
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            match deliver(&bot, &notification).await {
                DeliveryStatus::Delivered => {
                    log::info!(
                        "Notified {} about {} on {}",
                        notification.chat_id,
                        notification.video_url,
                        notification.channel_id
                    );
                }
                DeliveryStatus::Failed(reason) => {
                    metrics::DELIVERY_FAILURES_TOTAL.inc();
                    log::error!("Failed to notify {}: {}", notification.chat_id, reason);
                }
            }
        }
        log::warn!("Notification dispatcher channel closed");
    });
}

async fn deliver(bot: &Bot, notification: &LiveNotification) -> DeliveryStatus {
    let channel_name = notification
        .channel_title
        .as_deref()
        .unwrap_or(&notification.channel_id);
    let title = notification.video_title.as_deref().unwrap_or("Прямая трансляция");

    let text = format!(
        "{} в эфире: {}\n{}",
        html::bold(&html::escape(channel_name)),
        html::escape(title),
        notification.video_url
    );

    match bot
        .send_message(ChatId(notification.chat_id), text)
        .parse_mode(ParseMode::Html)
        .await
    {
        Ok(_) => DeliveryStatus::Delivered,
        Err(e) => DeliveryStatus::Failed(e.to_string()),
    }
}
