use async_trait::async_trait;
use pharos_core::config::TelegramConfig;
use pharos_core::RunSummary;
use teloxide::prelude::*;
use tracing::info;

use crate::error::{NotifyError, Result};
use crate::report::render_report;
use crate::send::send_text;

/// Sink for run summaries. Failures are reported, never fatal to the run.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs ("telegram", "log", ...).
    fn name(&self) -> &str;

    async fn notify(&self, summary: &RunSummary) -> Result<()>;
}

/// Writes the report through `tracing`. Used when Telegram is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, summary: &RunSummary) -> Result<()> {
        info!(run_id = %summary.run_id, "run report\n{}", render_report(summary));
        Ok(())
    }
}

/// Sends the report to one Telegram chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: i64) -> Self {
        Self {
            bot: Bot::new(bot_token),
            chat_id: ChatId(chat_id),
        }
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(NotifyError::Config("telegram.bot_token is empty".into()));
        }
        Ok(Self::new(config.bot_token.trim(), config.chat_id))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, summary: &RunSummary) -> Result<()> {
        let text = render_report(summary);
        send_text(&self.bot, self.chat_id, &text).await?;
        info!(run_id = %summary.run_id, chat_id = self.chat_id.0, "telegram: report delivered");
        Ok(())
    }
}
