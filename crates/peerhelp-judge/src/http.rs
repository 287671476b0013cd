//! Plumbing shared by the HTTP-backed judges.

use std::time::Duration;

use anyhow::{Context, Result};

use peerhelp_core::error::JudgeError;

pub(crate) fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> JudgeError {
    if e.is_timeout() {
        JudgeError::Timeout(timeout_secs)
    } else {
        JudgeError::NetworkError(e.to_string())
    }
}

/// Map non-success statuses to a `JudgeError`.
///
/// `message_of` pulls the human-readable message out of the provider's
/// error body; the raw body is used when it returns `None`.
pub(crate) async fn check_status(
    response: reqwest::Response,
    message_of: fn(&str) -> Option<String>,
) -> Result<reqwest::Response, JudgeError> {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5)
            * 1000;
        return Err(JudgeError::RateLimited {
            retry_after_ms: retry_after,
        });
    }
    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(JudgeError::AuthenticationFailed(
            message_of(&body).unwrap_or(body),
        ));
    }
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        let message = message_of(&body).unwrap_or(body);
        return Err(JudgeError::ApiError { status, message });
    }
    Ok(response)
}
