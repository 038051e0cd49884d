//! Subscription command surface: the `/add` wizard, `/remove` picker and
//! `/list`.
//!
//! Commands are honored in private chats only. Wizard state lives in a
//! teloxide dialogue backed by `InMemStorage`; notifications themselves are
//! produced by the engine and delivered by `notifications.rs`, so losing
//! wizard state on restart loses nothing but an unfinished prompt.

use crate::telegram::bot::{is_user_allowed, Command};
use crate::telegram::HandlerResult;
use efircore::storage::{get_connection, subscriptions as subs_db};
use efircore::watch::LiveStateStore;
use efircore::youtube::video_url;
use efircore::{LiveResolver, Store};
use std::sync::Arc;
use teloxide::dispatching::{dialogue, dialogue::InMemStorage, UpdateHandler};
use teloxide::dptree::{self, case};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode, Recipient};
use teloxide::utils::html;

const HELP_TEXT: &str = "Я уведомляю выбранные чаты Telegram, когда каналы YouTube выходят в эфир.\n\n\
Команды (личный чат):\n\
/add — добавить канал и назначения через мастер\n\
/remove — удалить канал (по номеру)\n\
/list — показать каналы и куда уходят уведомления\n\
/cancel — отменить текущее действие";

const PROMPT_CHANNEL: &str = "Отправьте ссылку/ID/@хэндл канала YouTube или /cancel";
const PROMPT_DESTINATIONS: &str = "Теперь отправьте назначения в Telegram (через пробел):\n\
- @username или t.me/username или числовой ID чата\n\
Отправьте 'skip' или 'пропустить', чтобы использовать только личный чат. Либо /cancel";

/// Wizard state. `Idle` is the default for chats with no active flow.
#[derive(Clone, Default)]
pub enum AddFlow {
    #[default]
    Idle,
    AwaitingChannel,
    AwaitingDestinations {
        channel_id: String,
    },
    PickingRemoval {
        channels: Vec<String>,
    },
}

pub type SubDialogue = Dialogue<AddFlow, InMemStorage<AddFlow>>;

/// Build the dispatcher handler tree.
pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(cmd_help))
        .branch(case![Command::Help].endpoint(cmd_help))
        .branch(case![Command::Add(reference)].endpoint(cmd_add))
        .branch(case![Command::Remove].endpoint(cmd_remove))
        .branch(case![Command::List].endpoint(cmd_list))
        .branch(case![Command::Cancel].endpoint(cmd_cancel));

    let message_handler = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(dptree::filter(|msg: Message| !is_user_allowed(&msg)).endpoint(access_denied))
        .branch(command_handler)
        .branch(case![AddFlow::AwaitingChannel].endpoint(receive_channel))
        .branch(case![AddFlow::AwaitingDestinations { channel_id }].endpoint(receive_destinations))
        .branch(case![AddFlow::PickingRemoval { channels }].endpoint(receive_removal_pick))
        .branch(dptree::endpoint(ignore_message));

    dialogue::enter::<Update, InMemStorage<AddFlow>, AddFlow, _>().branch(message_handler)
}

// ─── Commands ───

async fn cmd_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, HELP_TEXT).await?;
    Ok(())
}

async fn cmd_cancel(bot: Bot, dialogue: SubDialogue, msg: Message) -> HandlerResult {
    dialogue.exit().await?;
    bot.send_message(msg.chat.id, "Отменено.").await?;
    Ok(())
}

async fn access_denied(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "You are not allowed to use this bot.").await?;
    Ok(())
}

async fn ignore_message() -> HandlerResult {
    Ok(())
}

/// `/add` with an inline reference subscribes immediately; without one it
/// starts the wizard.
async fn cmd_add(
    bot: Bot,
    dialogue: SubDialogue,
    msg: Message,
    reference: String,
    store: Arc<Store>,
    resolver: Arc<LiveResolver>,
) -> HandlerResult {
    let reference = reference.trim();
    if reference.is_empty() {
        dialogue.update(AddFlow::AwaitingChannel).await?;
        bot.send_message(msg.chat.id, PROMPT_CHANNEL).await?;
        return Ok(());
    }

    let Some(channel_id) = resolver.resolve_channel_id(reference).await else {
        bot.send_message(msg.chat.id, "Канал не найден. Укажите корректный URL, @хэндл или ID.")
            .await?;
        return Ok(());
    };

    let conn = get_connection(store.pool())?;
    subs_db::add_subscription(&conn, msg.chat.id.0, &channel_id)?;
    drop(conn);

    let title = resolver
        .channel_title(&channel_id)
        .await
        .unwrap_or_else(|| channel_id.clone());
    bot.send_message(
        msg.chat.id,
        format!(
            "Оформлена подписка на {} ({}).",
            html::bold(&html::escape(&title)),
            channel_id
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;

    // If the channel is already live and was notified before, inform this
    // chat immediately — the poller won't re-emit for the same broadcast.
    if let Some(live) = resolver.live_now(&channel_id).await {
        if store.last_video(&channel_id)?.as_deref() == Some(live.video_id.as_str()) {
            let live_title = live.video_title.as_deref().unwrap_or("Прямая трансляция");
            let channel_name = live.channel_title.as_deref().unwrap_or(&channel_id);
            bot.send_message(
                msg.chat.id,
                format!(
                    "{} в эфире: {}\n{}",
                    html::escape(channel_name),
                    html::escape(live_title),
                    video_url(&live.video_id)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }

    Ok(())
}

async fn cmd_list(bot: Bot, msg: Message, store: Arc<Store>, resolver: Arc<LiveResolver>) -> HandlerResult {
    let conn = get_connection(store.pool())?;
    let subs = subs_db::list_subscriptions(&conn, msg.chat.id.0)?;
    let mut destinations = Vec::with_capacity(subs.len());
    for channel_id in &subs {
        destinations.push(subs_db::destinations_of(&conn, channel_id)?);
    }
    drop(conn);

    if subs.is_empty() {
        bot.send_message(msg.chat.id, "Каналы не настроены.").await?;
        return Ok(());
    }

    let mut lines = Vec::with_capacity(subs.len());
    for (i, (channel_id, dests)) in subs.iter().zip(&destinations).enumerate() {
        let title = resolver
            .channel_title(channel_id)
            .await
            .unwrap_or_else(|| channel_id.clone());
        let dest_list = if dests.is_empty() {
            "только личный чат".to_string()
        } else {
            dests.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        };
        lines.push(format!("{}. {} ({})\n   → {}", i + 1, title, channel_id, dest_list));
    }

    bot.send_message(msg.chat.id, format!("Ваши подписки:\n{}", lines.join("\n")))
        .await?;
    Ok(())
}

async fn cmd_remove(
    bot: Bot,
    dialogue: SubDialogue,
    msg: Message,
    store: Arc<Store>,
    resolver: Arc<LiveResolver>,
) -> HandlerResult {
    let conn = get_connection(store.pool())?;
    let subs = subs_db::list_subscriptions(&conn, msg.chat.id.0)?;
    drop(conn);

    if subs.is_empty() {
        bot.send_message(msg.chat.id, "Каналы не настроены.").await?;
        return Ok(());
    }

    let mut lines = Vec::with_capacity(subs.len());
    for (i, channel_id) in subs.iter().enumerate() {
        let title = resolver
            .channel_title(channel_id)
            .await
            .unwrap_or_else(|| channel_id.clone());
        lines.push(format!("{}. {} ({})", i + 1, title, channel_id));
    }

    dialogue.update(AddFlow::PickingRemoval { channels: subs }).await?;
    bot.send_message(
        msg.chat.id,
        format!("Отправьте номер для удаления (или /cancel):\n{}", lines.join("\n")),
    )
    .await?;
    Ok(())
}

// ─── Wizard states ───

async fn receive_channel(
    bot: Bot,
    dialogue: SubDialogue,
    msg: Message,
    resolver: Arc<LiveResolver>,
) -> HandlerResult {
    let text = msg.text().unwrap_or("").trim();
    if text.is_empty() {
        bot.send_message(msg.chat.id, PROMPT_CHANNEL).await?;
        return Ok(());
    }
    if is_cancel_word(text) {
        dialogue.exit().await?;
        bot.send_message(msg.chat.id, "Отменено.").await?;
        return Ok(());
    }

    match resolver.resolve_channel_id(text).await {
        None => {
            bot.send_message(msg.chat.id, "Канал не найден. Отправьте другую ссылку/ID/@хэндл или /cancel")
                .await?;
        }
        Some(channel_id) => {
            dialogue.update(AddFlow::AwaitingDestinations { channel_id }).await?;
            bot.send_message(msg.chat.id, PROMPT_DESTINATIONS).await?;
        }
    }
    Ok(())
}

async fn receive_destinations(
    bot: Bot,
    dialogue: SubDialogue,
    msg: Message,
    channel_id: String,
    store: Arc<Store>,
    resolver: Arc<LiveResolver>,
) -> HandlerResult {
    let text = msg.text().unwrap_or("").trim().to_string();
    if is_cancel_word(&text) {
        dialogue.exit().await?;
        bot.send_message(msg.chat.id, "Отменено.").await?;
        return Ok(());
    }

    // The current private chat is always subscribed, whatever happens with
    // the extra destinations.
    let conn = get_connection(store.pool())?;
    subs_db::add_subscription(&conn, msg.chat.id.0, &channel_id)?;
    drop(conn);

    let mut added = Vec::new();
    let mut failed = Vec::new();
    if !text.is_empty() && !is_skip_word(&text) {
        for token in text.split_whitespace() {
            let Some(target) = normalize_target(token) else {
                failed.push(token.to_string());
                continue;
            };
            match bot.get_chat(Recipient::from(target)).await {
                Ok(chat) => {
                    let conn = get_connection(store.pool())?;
                    subs_db::add_destination(&conn, &channel_id, chat.id.0)?;
                    added.push(chat.id.0.to_string());
                }
                Err(e) => {
                    log::warn!("Failed to resolve destination {:?}: {}", token, e);
                    failed.push(token.to_string());
                }
            }
        }
    }

    dialogue.exit().await?;

    let title = resolver
        .channel_title(&channel_id)
        .await
        .unwrap_or_else(|| channel_id.clone());
    let mut parts = vec![format!(
        "Следим за {} ({}).",
        html::bold(&html::escape(&title)),
        channel_id
    )];
    if !added.is_empty() {
        parts.push(format!("Добавлены назначения: {}", added.join(", ")));
    }
    if !failed.is_empty() {
        parts.push(format!("Не удалось: {}", failed.join(", ")));
    }
    bot.send_message(msg.chat.id, parts.join("\n"))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn receive_removal_pick(
    bot: Bot,
    dialogue: SubDialogue,
    msg: Message,
    channels: Vec<String>,
    store: Arc<Store>,
) -> HandlerResult {
    let text = msg.text().unwrap_or("").trim();
    if is_cancel_word(text) {
        dialogue.exit().await?;
        bot.send_message(msg.chat.id, "Отменено.").await?;
        return Ok(());
    }

    let Ok(index) = text.parse::<usize>() else {
        bot.send_message(msg.chat.id, "Пожалуйста, отправьте номер из списка или /cancel")
            .await?;
        return Ok(());
    };
    if index < 1 || index > channels.len() {
        bot.send_message(msg.chat.id, "Вне диапазона. Попробуйте снова или /cancel")
            .await?;
        return Ok(());
    }

    let channel_id = &channels[index - 1];
    let conn = get_connection(store.pool())?;
    subs_db::remove_subscription(&conn, msg.chat.id.0, channel_id)?;
    subs_db::clear_destinations(&conn, channel_id)?;
    drop(conn);

    dialogue.exit().await?;
    bot.send_message(msg.chat.id, format!("Канал {} и его назначения удалены.", channel_id))
        .await?;
    Ok(())
}

// ─── Destination parsing ───

/// A delivery destination as the user typed it, before the `get_chat`
/// round-trip that turns it into a chat id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(i64),
    Username(String),
}

impl From<Target> for Recipient {
    fn from(target: Target) -> Self {
        match target {
            Target::Id(id) => Recipient::Id(ChatId(id)),
            Target::Username(username) => Recipient::ChannelUsername(username),
        }
    }
}

/// Normalize a destination token: numeric chat id, `@username`, or a
/// `t.me/<username>` link. Invite links (`t.me/+…`) are rejected — they
/// carry no resolvable username.
pub fn normalize_target(token: &str) -> Option<Target> {
    let t = token.trim();
    if let Ok(id) = t.parse::<i64>() {
        return Some(Target::Id(id));
    }
    if let Some(rest) = t.strip_prefix('@') {
        if rest.is_empty() {
            return None;
        }
        return Some(Target::Username(t.to_string()));
    }

    let lower = t.to_lowercase();
    let after = if lower.starts_with("http://") || lower.starts_with("https://") {
        t.split_once("t.me/")?.1
    } else if let Some(after) = t.strip_prefix("t.me/") {
        after
    } else {
        return None;
    };

    let part = after.split(['?', '/']).next().unwrap_or("");
    if part.is_empty() || part.starts_with('+') {
        return None;
    }
    let username = if part.starts_with('@') {
        part.to_string()
    } else {
        format!("@{}", part)
    };
    Some(Target::Username(username))
}

fn is_cancel_word(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower == "/cancel" || lower == "cancel" || lower == "отмена"
}

fn is_skip_word(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower == "skip" || lower == "пропустить"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_ids_pass_through() {
        assert_eq!(normalize_target("123456"), Some(Target::Id(123456)));
        assert_eq!(normalize_target("-1001234567890"), Some(Target::Id(-1001234567890)));
    }

    #[test]
    fn usernames_keep_the_at_sign() {
        assert_eq!(
            normalize_target("@some_channel"),
            Some(Target::Username("@some_channel".to_string()))
        );
        assert_eq!(normalize_target("@"), None);
    }

    #[test]
    fn tme_links_become_usernames() {
        assert_eq!(
            normalize_target("t.me/some_channel"),
            Some(Target::Username("@some_channel".to_string()))
        );
        assert_eq!(
            normalize_target("https://t.me/some_channel"),
            Some(Target::Username("@some_channel".to_string()))
        );
        assert_eq!(
            normalize_target("https://t.me/some_channel?start=abc"),
            Some(Target::Username("@some_channel".to_string()))
        );
        assert_eq!(
            normalize_target("https://t.me/some_channel/42"),
            Some(Target::Username("@some_channel".to_string()))
        );
    }

    #[test]
    fn invite_links_are_rejected() {
        assert_eq!(normalize_target("https://t.me/+AbCdEfGh"), None);
        assert_eq!(normalize_target("t.me/+AbCdEfGh"), None);
    }

    #[test]
    fn unrelated_text_is_rejected() {
        assert_eq!(normalize_target("just words"), None);
        assert_eq!(normalize_target("https://example.com/foo"), None);
        assert_eq!(normalize_target(""), None);
    }

    #[test]
    fn cancel_and_skip_words() {
        assert!(is_cancel_word("/cancel"));
        assert!(is_cancel_word("Cancel"));
        assert!(is_cancel_word("отмена"));
        assert!(!is_cancel_word("continue"));

        assert!(is_skip_word("skip"));
        assert!(is_skip_word("Пропустить"));
        assert!(!is_skip_word("@user"));
    }
}
