//! `pharos-accounts`: loads account records, validates them and quarantines
//! the ones that cannot be scheduled.

pub mod error;
pub mod registry;
pub mod source;
pub mod types;
pub mod validate;

pub use error::{AccountError, Result};
pub use registry::AccountRegistry;
pub use source::{
    AccountSource, CsvAccountSource, CsvRejectedSink, DiscardRejected, RejectedSink, StaticSource,
};
pub use types::{Account, AccountField, RawRecord, RejectReason, Rejected};
