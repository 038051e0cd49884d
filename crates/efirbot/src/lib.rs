//! Efirka — Telegram bot that notifies chats when YouTube channels go live.
//!
//! The heavy lifting (polling, dedup, storage, YouTube API) lives in
//! `efircore`; this crate is the Telegram surface: commands, the subscribe
//! wizard and the notification dispatcher.

pub mod telegram;

pub use telegram::{create_bot, schema, setup_bot_commands, start_notification_dispatcher, Command};
