//! Outcome types shared by the scheduler, the aggregator and notifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::JobId;

/// Result of one job execution for one account in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The handler finished; `payload` is made available to later jobs of the
    /// same cycle through the cycle context.
    Success { payload: serde_json::Value },
    /// The job was not executed (or the handler declined to act).
    Skipped { reason: SkipReason },
    /// The handler failed. `retriable` reflects the last attempt's error.
    Failed { error: String, retriable: bool },
}

impl Outcome {
    pub fn success(payload: serde_json::Value) -> Self {
        Outcome::Success { payload }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Outcome::Skipped { reason }
    }

    pub fn failed(error: impl Into<String>, retriable: bool) -> Self {
        Outcome::Failed {
            error: error.into(),
            retriable,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::Skipped { .. } => OutcomeKind::Skipped,
            Outcome::Failed { .. } => OutcomeKind::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Discriminant of [`Outcome`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Machine-readable reason attached to a skipped job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum SkipReason {
    /// A prerequisite ran in this cycle and failed.
    PrerequisiteFailed { job: JobId },
    /// A prerequisite was skipped in this cycle, or is not part of the route
    /// and never succeeded in an earlier cycle.
    PrerequisiteNotMet { job: JobId },
    /// The account lacks a field the handler requires (e.g. a Twitter token).
    MissingField { field: String },
    /// The handler itself decided there was nothing to do.
    Handler { message: String },
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::PrerequisiteFailed { .. } => "prerequisite-failed",
            SkipReason::PrerequisiteNotMet { .. } => "prerequisite-not-met",
            SkipReason::MissingField { .. } => "missing-field",
            SkipReason::Handler { .. } => "handler",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PrerequisiteFailed { job } => write!(f, "prerequisite `{job}` failed"),
            SkipReason::PrerequisiteNotMet { job } => write!(f, "prerequisite `{job}` not met"),
            SkipReason::MissingField { field } => write!(f, "account has no {field}"),
            SkipReason::Handler { message } => write!(f, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_serializes_with_kebab_code() {
        let reason = SkipReason::PrerequisiteFailed { job: "connect_wallet".into() };
        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains(r#""code":"prerequisite-failed""#));
        assert_eq!(reason.code(), "prerequisite-failed");
    }

    #[test]
    fn failed_outcome_round_trips() {
        let outcome = Outcome::failed("timeout after 5000ms", true);
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains(r#""kind":"failed""#));
        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
        assert_eq!(back.kind(), OutcomeKind::Failed);
    }
}
