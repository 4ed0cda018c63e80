// src/config/mod.rs
pub mod bot;
pub mod cookies;
pub mod interest;

pub use bot::{BotConfig, DigestConfig, FeedConfig, MailConfig, PacingConfig, WebhookConfig};
