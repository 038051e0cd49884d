//! Bot initialization and command definitions.

use efircore::core::config;
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "показать справку")]
    Start,
    #[command(description = "показать справку")]
    Help,
    /// Accepts an optional inline reference; an empty payload starts the
    /// wizard.
    #[command(description = "добавить канал YouTube (ссылка/ID/@хэндл)", parse_with = accept_rest)]
    Add(String),
    #[command(description = "удалить канал (по номеру)")]
    Remove,
    #[command(description = "показать каналы и куда уходят уведомления")]
    List,
    #[command(description = "отменить текущее действие")]
    Cancel,
}

/// Passes the rest of the message line through, empty included — the
/// default `split` parser rejects `/add` without arguments.
fn accept_rest(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_string(),))
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL)
pub fn create_bot() -> anyhow::Result<Bot> {
    let bot = Bot::new(config::BOT_TOKEN.as_str());
    if let Ok(api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", api_url);
        let url = url::Url::parse(&api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        return Ok(bot.set_api_url(url));
    }
    Ok(bot)
}

/// Sets up bot commands in the Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// Whether the sender passes the optional ALLOWED_USER_IDS allow-list.
/// An empty list allows everyone; messages without a sender are rejected
/// once a list is configured.
pub fn is_user_allowed(msg: &Message) -> bool {
    let allowed = &*config::ALLOWED_USER_IDS;
    if allowed.is_empty() {
        return true;
    }
    msg.from
        .as_ref()
        .and_then(|user| i64::try_from(user.id.0).ok())
        .map(|user_id| allowed.contains(&user_id))
        .unwrap_or(false)
}
