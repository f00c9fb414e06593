//! `pharos-scheduler`: the orchestration core.
//!
//! # Overview
//!
//! A [`table::JobTable`] orders the configured jobs into a [`table::Route`].
//! The [`engine::Scheduler`] runs every account through that route with at
//! most `threads` accounts active at once, pacing work with a
//! [`pacing::PacingPolicy`] and gating new cycles on a
//! [`window::RouteWindow`]. Every outcome lands in the
//! [`aggregator::ResultAggregator`], whose snapshots are handed to notifiers
//! and, optionally, the SQLite [`db::SummaryStore`].
//!
//! # Account cycle
//!
//! | State      | Leaves when                                        |
//! |------------|----------------------------------------------------|
//! | Pending    | window open and a slot is free                     |
//! | Delaying   | startup jitter / inter-task pause elapsed          |
//! | Running    | handler returned (after retries)                   |
//! | Complete   | cycle gap elapsed (repeat) or run ends (no repeat) |
//! | Excluded   | never: a fatal job error ends the account          |

pub mod aggregator;
pub mod db;
pub mod engine;
pub mod error;
pub mod job;
pub mod pacing;
pub mod table;
pub mod window;

pub use aggregator::ResultAggregator;
pub use db::SummaryStore;
pub use engine::{Scheduler, SchedulerOptions};
pub use error::{DuplicateOutcome, JobError, SummaryStoreError};
pub use job::{CycleContext, JobDefinition, JobHandler};
pub use pacing::{DelayKind, PacingPolicy};
pub use table::{JobTable, Route, RouteSelection};
pub use window::{Clock, RouteWindow, SystemClock};
