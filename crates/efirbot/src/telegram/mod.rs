//! Telegram bot integration: commands, the subscribe wizard and the
//! notification dispatcher.

pub mod bot;
pub mod notifications;
pub mod subscriptions;

pub use bot::{create_bot, is_user_allowed, setup_bot_commands, Command};
pub use notifications::start_notification_dispatcher;
pub use subscriptions::{schema, AddFlow};

/// Handler result used throughout the dispatcher tree.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
