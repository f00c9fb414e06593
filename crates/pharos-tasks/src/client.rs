use std::time::Duration;

use pharos_accounts::Account;
use pharos_scheduler::JobError;

/// Per-request ceiling, independent of the engine's job timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client that routes through the account's proxy, if it has one.
///
/// Accounts without a proxy connect directly, ignoring proxy env vars. A
/// proxy reqwest refuses is fatal for the account.
pub fn client_for(account: &Account) -> Result<reqwest::Client, JobError> {
    let builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
    let builder = match &account.proxy {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| JobError::Fatal(format!("unusable proxy: {e}")))?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };
    builder
        .build()
        .map_err(|e| JobError::Fatal(format!("cannot build HTTP client: {e}")))
}

/// Replace every `{account}` placeholder with the account identity.
pub fn substitute(template: &str, account: &Account) -> String {
    template.replace("{account}", account.id.as_str())
}

/// [`substitute`] applied to every string inside a JSON value.
pub fn substitute_json(value: &serde_json::Value, account: &Account) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => Value::String(substitute(s, account)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_json(v, account)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_json(v, account)))
                .collect(),
        ),
        other => other.clone(),
    }
}
