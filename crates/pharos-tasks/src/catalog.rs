//! Builds the job table from the `[[jobs]]` catalog.

use std::str::FromStr;
use std::sync::Arc;

use pharos_accounts::AccountField;
use pharos_core::config::{JobConfig, JobKindConfig, PharosConfig};
use pharos_core::ConfigError;
use pharos_scheduler::{JobDefinition, JobHandler, JobTable};
use reqwest::Method;
use tracing::info;

use crate::http::HttpJob;
use crate::noop::NoopJob;
use crate::rpc::RpcJob;

/// Turn every catalog entry into a [`JobDefinition`], in declaration order.
pub fn build_definitions(config: &PharosConfig) -> Result<Vec<JobDefinition>, ConfigError> {
    let endpoints = Arc::new(config.pharos_rpc_endpoints.clone());
    config
        .jobs
        .iter()
        .map(|job| {
            let handler = build_handler(job, &endpoints, &config.pharos_evm_explorer)?;
            let mut def = JobDefinition::new(job.name.as_str(), job.priority, handler);
            for pre in &job.prerequisites {
                def = def.requires(pre.as_str());
            }
            Ok(def)
        })
        .collect()
}

/// Build and validate the whole job table.
pub fn build_table(config: &PharosConfig) -> Result<JobTable, ConfigError> {
    let table = JobTable::new(build_definitions(config)?)?;
    info!(jobs = table.len(), "job table built");
    Ok(table)
}

fn build_handler(
    job: &JobConfig,
    endpoints: &Arc<Vec<String>>,
    explorer: &str,
) -> Result<Arc<dyn JobHandler>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidJob {
        job: job.name.clone(),
        reason,
    };

    let handler: Arc<dyn JobHandler> = match &job.kind {
        JobKindConfig::Http {
            method,
            url,
            body,
            expect_status,
            auth_token,
        } => {
            let method = Method::from_str(&method.to_ascii_uppercase())
                .map_err(|_| invalid(format!("unknown HTTP method `{method}`")))?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(format!("url `{url}` must be http(s)")));
            }

            let mut http = HttpJob::new(method, url.clone());
            if let Some(body) = body {
                http = http.with_body(body.clone());
            }
            if let Some(status) = expect_status {
                http = http.expecting(*status);
            }
            if let Some(token) = auth_token {
                let field = AccountField::from_str(token).map_err(invalid)?;
                if field == AccountField::Proxy {
                    return Err(invalid("auth_token must be `twitter` or `discord`".into()));
                }
                http = http.with_bearer(field);
            }
            Arc::new(http)
        }
        JobKindConfig::Rpc { method, params } => {
            if endpoints.is_empty() {
                return Err(invalid("pharos_rpc_endpoints is empty".into()));
            }
            Arc::new(
                RpcJob::new(method.clone(), params.clone(), Arc::clone(endpoints))
                    .with_explorer(explorer),
            )
        }
        JobKindConfig::Noop => Arc::new(NoopJob),
    };
    Ok(handler)
}
