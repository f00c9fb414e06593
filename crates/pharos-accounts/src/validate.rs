//! Field-level validation for raw account records.

use pharos_core::AccountId;
use sha2::{Digest, Sha256};

use crate::types::RejectReason;

const KEY_HEX_LEN: usize = 64;
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5"];
/// Bytes of the key digest kept in the account identity.
const IDENTITY_BYTES: usize = 10;

/// Strip the optional `0x` prefix and lowercase. Rejects anything that is not
/// exactly 32 bytes of hex, and the all-zero key.
pub fn normalize_key(raw: &str) -> Result<String, RejectReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RejectReason::MissingKey);
    }
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if body.len() != KEY_HEX_LEN || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RejectReason::MalformedKey);
    }
    if body.chars().all(|c| c == '0') {
        return Err(RejectReason::MalformedKey);
    }
    Ok(body.to_ascii_lowercase())
}

/// Normalize a proxy to `scheme://[user:pass@]host:port`.
///
/// Blank input means "no proxy". Scheme-less values are treated as HTTP.
pub fn normalize_proxy(raw: &str) -> Result<Option<String>, RejectReason> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let malformed = || RejectReason::MalformedProxy {
        proxy: trimmed.to_string(),
    };

    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("http".to_string(), trimmed),
    };
    if !PROXY_SCHEMES.contains(&scheme.as_str()) {
        return Err(malformed());
    }

    let rest = rest.trim_end_matches('/');
    let host_port = match rest.rsplit_once('@') {
        Some((creds, host_port)) => {
            let (user, _pass) = creds.split_once(':').ok_or_else(malformed)?;
            if user.is_empty() {
                return Err(malformed());
            }
            host_port
        }
        None => rest,
    };

    let (host, port) = host_port.rsplit_once(':').ok_or_else(malformed)?;
    if host.is_empty() || host.contains('/') || host.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => {}
        _ => return Err(malformed()),
    }

    Ok(Some(format!("{scheme}://{rest}")))
}

/// Trimmed token, `None` when blank.
pub fn normalize_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Stable account identity: a short SHA-256 fingerprint of the normalized key.
pub fn derive_identity(normalized_key: &str) -> AccountId {
    let digest = Sha256::digest(normalized_key.as_bytes());
    AccountId(format!("acct-{}", hex::encode(&digest[..IDENTITY_BYTES])))
}
