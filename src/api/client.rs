//! Shared HTTP plumbing for the Firestore, Gemini and Cloudinary clients.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::Config;

/// Error envelope shared by Google APIs and Cloudinary: `{"error":{"message":...}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceError {
    pub message: Option<String>,
}

impl ServiceError {
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("unknown error")
    }
}

/// Build the HTTP client used by every collaborator.
pub fn build_http(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("chatroom-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")
}

/// Check HTTP response status code and return a clear error on failure.
///
/// Prefers the service's own `error.message` over the raw body.
pub async fn check_response(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("{}", describe_failure(status, what, &body));
}

pub fn describe_failure(status: reqwest::StatusCode, what: &str, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message().to_string())
        .unwrap_or_else(|| body.trim().to_string());
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        format!(
            "HTTP {} for {}: {} (check the API key in the config file)",
            status.as_u16(),
            what,
            detail
        )
    } else {
        format!("HTTP {} for {}: {}", status.as_u16(), what, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_describe_failure_prefers_service_message() {
        let body = r#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            describe_failure(StatusCode::TOO_MANY_REQUESTS, "Gemini", body),
            "HTTP 429 for Gemini: quota exceeded"
        );
    }

    #[test]
    fn test_describe_failure_falls_back_to_body() {
        let msg = describe_failure(StatusCode::BAD_GATEWAY, "Firestore", " upstream down \n");
        assert_eq!(msg, "HTTP 502 for Firestore: upstream down");
    }

    #[test]
    fn test_describe_failure_hints_at_credentials() {
        let msg = describe_failure(StatusCode::FORBIDDEN, "Firestore", "{}");
        assert!(msg.contains("check the API key"));
    }
}
