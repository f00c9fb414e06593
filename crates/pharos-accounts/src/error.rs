use thiserror::Error;

/// Errors raised while reading an account source or writing rejected rows.
///
/// Per-row validation problems are not errors. They become
/// [`RejectReason`](crate::types::RejectReason)s on the rejected channel.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The source has no column holding private keys.
    #[error("Account source is missing the `{0}` column")]
    MissingColumn(String),
}

pub type Result<T> = std::result::Result<T, AccountError>;
