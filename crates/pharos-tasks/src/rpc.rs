use std::sync::Arc;

use async_trait::async_trait;
use pharos_accounts::Account;
use pharos_scheduler::{CycleContext, JobError, JobHandler};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::classify::{classify_status, classify_transport};
use crate::client::{client_for, substitute_json};

/// A JSON-RPC 2.0 call tried against each endpoint in order.
///
/// Transport failures and retriable HTTP statuses move on to the next
/// endpoint; a JSON-RPC `error` object is final. The payload is
/// `{ "endpoint": <url>, "result": <result> }`, plus `explorer_url` when the
/// result is a transaction hash and an explorer is configured.
#[derive(Debug, Clone)]
pub struct RpcJob {
    method: String,
    params: Vec<Value>,
    endpoints: Arc<Vec<String>>,
    explorer: Option<String>,
}

impl RpcJob {
    pub fn new(method: impl Into<String>, params: Vec<Value>, endpoints: Arc<Vec<String>>) -> Self {
        Self {
            method: method.into(),
            params,
            endpoints,
            explorer: None,
        }
    }

    /// Base URL of the block explorer used to link transaction hashes.
    pub fn with_explorer(mut self, explorer: impl Into<String>) -> Self {
        let explorer = explorer.into();
        let explorer = explorer.trim().trim_end_matches('/');
        self.explorer = (!explorer.is_empty()).then(|| explorer.to_string());
        self
    }

    fn request_body(&self, account: &Account, id: u64) -> Value {
        let params: Vec<Value> = self.params.iter().map(|p| substitute_json(p, account)).collect();
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": self.method,
            "params": params,
        })
    }
}

/// `{explorer}/tx/{hash}` when `result` is a 32-byte `0x` hash.
pub fn tx_link(explorer: &str, result: &Value) -> Option<String> {
    let hash = result.as_str()?;
    let digits = hash.strip_prefix("0x")?;
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{explorer}/tx/{hash}"))
}

/// Interpret a decoded JSON-RPC response.
pub fn parse_response(resp: Value) -> Result<Value, JobError> {
    if let Some(err) = resp.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(JobError::Rejected(format!("rpc error {code}: {message}")));
    }
    match resp {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| JobError::Format("response has neither result nor error".into())),
        other => Err(JobError::Format(format!("not a JSON-RPC object: {other}"))),
    }
}

async fn call(client: &reqwest::Client, endpoint: &str, body: &Value) -> Result<Value, JobError> {
    let resp = client
        .post(endpoint)
        .json(body)
        .send()
        .await
        .map_err(|e| classify_transport(&e))?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(classify_status(status.as_u16(), &text));
    }
    let decoded: Value = resp
        .json()
        .await
        .map_err(|e| JobError::Format(e.to_string()))?;
    parse_response(decoded)
}

#[async_trait]
impl JobHandler for RpcJob {
    async fn execute(&self, account: &Account, ctx: &CycleContext) -> Result<Value, JobError> {
        let client = client_for(account)?;
        let body = self.request_body(account, ctx.cycle);
        let mut last_err: Option<JobError> = None;

        for endpoint in self.endpoints.iter() {
            debug!(account = %account.id, %endpoint, method = %self.method, "rpc call");

            match call(&client, endpoint, &body).await {
                Ok(result) => {
                    let mut payload = json!({ "endpoint": endpoint, "result": result });
                    if let Some(link) = self.explorer.as_deref().and_then(|e| tx_link(e, &result)) {
                        info!(account = %account.id, method = %self.method, tx = %link, "transaction sent");
                        payload["explorer_url"] = Value::String(link);
                    }
                    return Ok(payload);
                }
                Err(e) if e.is_retriable() => {
                    warn!(account = %account.id, %endpoint, err = %e, "rpc endpoint failed, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // every endpoint failed; return the last recorded error
        Err(last_err.unwrap_or_else(|| JobError::Network("no RPC endpoints configured".into())))
    }
}
