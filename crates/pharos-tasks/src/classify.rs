//! Maps transport and HTTP failures onto [`JobError`] so the engine can
//! decide whether to retry.

use pharos_scheduler::JobError;

/// Longest response excerpt kept in an error message.
const BODY_EXCERPT: usize = 200;

/// Classify a non-success HTTP status.
pub fn classify_status(status: u16, body: &str) -> JobError {
    let detail = format!("HTTP {status}: {}", excerpt(body));
    match status {
        429 => JobError::RateLimited(detail),
        401 | 403 => JobError::Auth(detail),
        408 | 500..=599 => JobError::Network(detail),
        _ => JobError::Rejected(detail),
    }
}

/// Classify an error raised by reqwest before a status was available.
pub fn classify_transport(err: &reqwest::Error) -> JobError {
    if err.is_timeout() {
        JobError::Network(format!("request timed out: {err}"))
    } else if err.is_decode() {
        JobError::Format(err.to_string())
    } else if err.is_builder() {
        JobError::Fatal(format!("cannot build request: {err}"))
    } else {
        // connect, redirect, body and request errors are all transient here.
        JobError::Network(err.to_string())
    }
}

fn excerpt(body: &str) -> &str {
    let body = body.trim();
    match body.char_indices().nth(BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(matches!(classify_status(429, ""), JobError::RateLimited(_)));
        assert!(matches!(classify_status(401, ""), JobError::Auth(_)));
        assert!(matches!(classify_status(403, ""), JobError::Auth(_)));
        assert!(matches!(classify_status(502, ""), JobError::Network(_)));
        assert!(matches!(classify_status(404, ""), JobError::Rejected(_)));
        assert!(matches!(classify_status(400, ""), JobError::Rejected(_)));
        assert!(classify_status(503, "").is_retriable());
        assert!(!classify_status(422, "").is_retriable());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "é".repeat(1000);
        let err = classify_status(400, &body);
        let JobError::Rejected(msg) = err else {
            panic!("expected rejection");
        };
        assert_eq!(msg.chars().count(), "HTTP 400: ".len() + BODY_EXCERPT);
    }
}
