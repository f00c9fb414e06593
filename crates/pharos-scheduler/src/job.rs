use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pharos_accounts::{Account, AccountField};
use pharos_core::JobId;
use serde_json::Value;

use crate::error::JobError;

/// A capability `(account, context) -> outcome`.
///
/// Handlers are shared by every account task and must not keep per-account
/// state; anything they need across jobs of a cycle travels through the
/// [`CycleContext`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Account fields this handler cannot run without. Accounts lacking one
    /// are skipped with `missing-field` instead of being dispatched.
    fn requirements(&self) -> &[AccountField] {
        &[]
    }

    async fn execute(&self, account: &Account, ctx: &CycleContext) -> Result<Value, JobError>;
}

/// Per-invocation context handed to a handler.
#[derive(Debug, Clone, Default)]
pub struct CycleContext {
    /// 1-based cycle number for this account.
    pub cycle: u64,
    /// 1-based attempt number within the retry budget.
    pub attempt: u32,
    payloads: HashMap<JobId, Value>,
}

impl CycleContext {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            attempt: 1,
            payloads: HashMap::new(),
        }
    }

    /// Payload of a job that succeeded earlier in this cycle.
    pub fn payload(&self, job: &JobId) -> Option<&Value> {
        self.payloads.get(job)
    }

    pub(crate) fn insert_payload(&mut self, job: JobId, payload: Value) {
        self.payloads.insert(job, payload);
    }
}

/// A named, prioritized job bound to its handler.
#[derive(Clone)]
pub struct JobDefinition {
    pub id: JobId,
    pub priority: i32,
    pub prerequisites: Vec<JobId>,
    pub handler: Arc<dyn JobHandler>,
}

impl JobDefinition {
    pub fn new(id: impl Into<JobId>, priority: i32, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            id: id.into(),
            priority,
            prerequisites: Vec::new(),
            handler,
        }
    }

    pub fn requires(mut self, prerequisite: impl Into<JobId>) -> Self {
        self.prerequisites.push(prerequisite.into());
        self
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("prerequisites", &self.prerequisites)
            .finish_non_exhaustive()
    }
}
