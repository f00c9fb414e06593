use thiserror::Error;

/// Delivery failures. The engine logs these and carries on.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Notifier is misconfigured: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
