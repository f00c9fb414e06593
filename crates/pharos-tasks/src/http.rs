use async_trait::async_trait;
use pharos_accounts::{Account, AccountField};
use pharos_scheduler::{CycleContext, JobError, JobHandler};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::classify::{classify_status, classify_transport};
use crate::client::{client_for, substitute};

/// One HTTP request per invocation, sent through the account's proxy.
///
/// `{account}` in the URL or body is replaced by the account identity. The
/// payload is `{ "status": u16, "body": <JSON or text> }`.
#[derive(Debug, Clone)]
pub struct HttpJob {
    method: Method,
    url: String,
    body: Option<String>,
    expect_status: Option<u16>,
    auth: Option<AccountField>,
    requirements: Vec<AccountField>,
}

impl HttpJob {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            expect_status: None,
            auth: None,
            requirements: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn expecting(mut self, status: u16) -> Self {
        self.expect_status = Some(status);
        self
    }

    /// Send the account's `field` as a bearer token. Accounts without it are
    /// skipped by the engine.
    pub fn with_bearer(mut self, field: AccountField) -> Self {
        self.auth = Some(field);
        self.requirements = vec![field];
        self
    }

    fn accepts(&self, status: u16) -> bool {
        match self.expect_status {
            Some(expected) => status == expected,
            None => (200..300).contains(&status),
        }
    }
}

#[async_trait]
impl JobHandler for HttpJob {
    fn requirements(&self) -> &[AccountField] {
        &self.requirements
    }

    async fn execute(&self, account: &Account, ctx: &CycleContext) -> Result<Value, JobError> {
        let client = client_for(account)?;
        let url = substitute(&self.url, account);
        let mut request = client.request(self.method.clone(), &url);

        if let Some(body) = &self.body {
            let body = substitute(body, account);
            request = if serde_json::from_str::<Value>(&body).is_ok() {
                request.header("Content-Type", "application/json").body(body)
            } else {
                request.body(body)
            };
        }
        if let Some(field) = self.auth {
            let token = account
                .field(field)
                .ok_or_else(|| JobError::Skip(format!("account has no {field}")))?;
            request = request.bearer_auth(token);
        }

        debug!(account = %account.id, method = %self.method, attempt = ctx.attempt, "http request");
        let resp = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| classify_transport(&e))?;

        if !self.accepts(status) {
            return Err(classify_status(status, &text));
        }

        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        Ok(json!({ "status": status, "body": body }))
    }
}
