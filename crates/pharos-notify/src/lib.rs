//! `pharos-notify`: delivers run summaries to the operator.

pub mod error;
pub mod notifier;
pub mod report;
pub mod send;

pub use error::{NotifyError, Result};
pub use notifier::{LogNotifier, Notifier, TelegramNotifier};
pub use report::render_report;
