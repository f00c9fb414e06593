use std::fmt;

use pharos_core::AccountId;
use serde::{Deserialize, Serialize};

/// One row as read from an account source, before any validation.
///
/// Empty strings mean the column was blank or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// 1-based position in the source, header excluded.
    pub row: usize,
    pub private_key: String,
    pub proxy: String,
    pub twitter_token: String,
    pub discord_token: String,
}

impl RawRecord {
    pub fn with_key(row: usize, private_key: impl Into<String>) -> Self {
        Self {
            row,
            private_key: private_key.into(),
            ..Default::default()
        }
    }
}

/// A validated account. Immutable for the whole run.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    /// Source row this account came from.
    pub row: usize,
    private_key: String,
    /// Normalized proxy URL (`scheme://[user:pass@]host:port`).
    pub proxy: Option<String>,
    pub twitter_token: Option<String>,
    pub discord_token: Option<String>,
}

impl Account {
    pub(crate) fn new(
        id: AccountId,
        row: usize,
        private_key: String,
        proxy: Option<String>,
        twitter_token: Option<String>,
        discord_token: Option<String>,
    ) -> Self {
        Self {
            id,
            row,
            private_key,
            proxy,
            twitter_token,
            discord_token,
        }
    }

    /// Normalized private key: 64 lowercase hex digits, no `0x` prefix.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Value of an optional field, `None` when the account lacks it.
    pub fn field(&self, field: AccountField) -> Option<&str> {
        match field {
            AccountField::Proxy => self.proxy.as_deref(),
            AccountField::TwitterToken => self.twitter_token.as_deref(),
            AccountField::DiscordToken => self.discord_token.as_deref(),
        }
    }

    pub fn has(&self, field: AccountField) -> bool {
        self.field(field).is_some()
    }
}

// Keys never reach logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("row", &self.row)
            .field("private_key", &"<redacted>")
            .field("proxy", &self.proxy.as_ref().map(|_| "<set>"))
            .field("twitter_token", &self.twitter_token.as_ref().map(|_| "<set>"))
            .field("discord_token", &self.discord_token.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Optional account fields a job handler may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountField {
    Proxy,
    TwitterToken,
    DiscordToken,
}

impl AccountField {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountField::Proxy => "proxy",
            AccountField::TwitterToken => "twitter_token",
            AccountField::DiscordToken => "discord_token",
        }
    }
}

impl fmt::Display for AccountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AccountField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proxy" => Ok(AccountField::Proxy),
            "twitter" | "twitter_token" => Ok(AccountField::TwitterToken),
            "discord" | "discord_token" => Ok(AccountField::DiscordToken),
            other => Err(format!("unknown account field: {other}")),
        }
    }
}

/// Machine-readable reason a record was quarantined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum RejectReason {
    MissingKey,
    MalformedKey,
    MalformedProxy { proxy: String },
    /// Same identity as an earlier row.
    Duplicate { first_row: usize },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingKey => "missing-key",
            RejectReason::MalformedKey => "malformed-key",
            RejectReason::MalformedProxy { .. } => "malformed-proxy",
            RejectReason::Duplicate { .. } => "duplicate",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingKey => write!(f, "private key is missing"),
            RejectReason::MalformedKey => write!(f, "private key is not 32 hex bytes"),
            RejectReason::MalformedProxy { proxy } => write!(f, "proxy `{proxy}` is malformed"),
            RejectReason::Duplicate { first_row } => {
                write!(f, "duplicate of the account on row {first_row}")
            }
        }
    }
}

/// A record that failed validation, kept for operator review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub record: RawRecord,
    pub reason: RejectReason,
}
