//! Application configuration from environment variables.
//!
//! `.env` files are honored via dotenvy; every knob has a default so the
//! server starts with zero configuration against a local SQLite file.

use std::time::Duration;

use crate::compiler::DelayMode;

/// Mail provider settings.
#[derive(Clone, Debug)]
pub struct MailerConfig {
    /// Provider endpoint; when unset, outbound mail is recorded in memory
    /// only (development mode).
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub from: String,
}

/// Top-level server configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub poll_interval: Duration,
    pub delay_mode: DelayMode,
    pub mail: MailerConfig,
}

impl AppConfig {
    /// Load configuration from the environment (and `.env`, if present).
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let poll_secs = std::env::var("COLDFLOW_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(60);
        let delay_mode = match std::env::var("COLDFLOW_DELAY_MODE").as_deref() {
            Ok("since-last-email") => DelayMode::SinceLastEmail,
            _ => DelayMode::FromStart,
        };
        Self {
            bind_addr: std::env::var("COLDFLOW_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://coldflow.db".to_string()),
            poll_interval: Duration::from_secs(poll_secs),
            delay_mode,
            mail: MailerConfig {
                api_url: std::env::var("MAIL_API_URL").ok(),
                api_token: std::env::var("MAIL_API_TOKEN").ok(),
                from: std::env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@localhost".to_string()),
            },
        }
    }
}
