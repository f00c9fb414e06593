use async_trait::async_trait;
use pharos_accounts::Account;
use pharos_scheduler::{CycleContext, JobError, JobHandler};
use serde_json::{json, Value};

/// Succeeds immediately. Useful for dry runs of a route.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopJob;

#[async_trait]
impl JobHandler for NoopJob {
    async fn execute(&self, _account: &Account, ctx: &CycleContext) -> Result<Value, JobError> {
        Ok(json!({ "cycle": ctx.cycle }))
    }
}
