//! Gemini `generateContent` client (AI Responder).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{describe_failure, ServiceError};
use crate::config::GeminiConfig;
use crate::room::context::{Turn, TurnRole};
use crate::room::AiResponder;

// -- Wire types --

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini names the assistant side `model`.
fn wire_role(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "model",
    }
}

fn build_request(turns: &[Turn]) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: turns
            .iter()
            .map(|t| Content {
                role: wire_role(t.role),
                parts: vec![Part { text: &t.text }],
            })
            .collect(),
    }
}

/// Interpret a response body.
///
/// A service-reported `error` fails regardless of status; a well-formed body
/// without text yields `Ok(None)`.
fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<Option<String>> {
    let parsed: GenerateResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(e) if status.is_success() => {
            return Err(e).context("Failed to parse Gemini response");
        }
        Err(_) => bail!("{}", describe_failure(status, "Gemini", body)),
    };

    if let Some(err) = parsed.error {
        bail!("Gemini error: {}", err.message());
    }
    if !status.is_success() {
        bail!("{}", describe_failure(status, "Gemini", body));
    }

    Ok(parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .and_then(|p| p.text))
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, config: GeminiConfig) -> Self {
        if config.api_key.is_empty() {
            tracing::warn!("No Gemini API key configured; AI replies will fail");
        }
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl AiResponder for GeminiClient {
    async fn generate(&self, turns: &[Turn]) -> Result<Option<String>> {
        if self.config.api_key.is_empty() {
            bail!("Gemini API key not configured (set GEMINI_API_KEY)");
        }

        let url = self.endpoint();
        tracing::debug!("Gemini POST {} ({} turns)", url, turns.len());

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&build_request(turns))
            .send()
            .await
            .with_context(|| format!("Gemini POST {} failed", url))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read Gemini response")?;
        parse_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_request_body_shape() {
        let turns = vec![Turn::user("sys"), Turn::assistant("hi"), Turn::user("hello")];
        let body = serde_json::to_value(build_request(&turns)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "sys"}]},
                    {"role": "model", "parts": [{"text": "hi"}]},
                    {"role": "user", "parts": [{"text": "hello"}]},
                ]
            })
        );
    }

    #[test]
    fn test_first_candidate_first_part() {
        let body = r#"{"candidates":[
            {"content":{"role":"model","parts":[{"text":"first"},{"text":"second"}]}},
            {"content":{"role":"model","parts":[{"text":"other"}]}}
        ]}"#;
        assert_eq!(
            parse_response(StatusCode::OK, body).unwrap().as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_missing_candidates_is_none() {
        assert_eq!(parse_response(StatusCode::OK, "{}").unwrap(), None);
        assert_eq!(
            parse_response(StatusCode::OK, r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_service_error_fails() {
        let err = parse_response(
            StatusCode::OK,
            r#"{"error":{"message":"quota exceeded"}}"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("quota exceeded"));

        let err = parse_response(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"quota exceeded"}}"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("quota exceeded"));
    }

    #[test]
    fn test_non_json_error_body_fails() {
        let err = parse_response(StatusCode::SERVICE_UNAVAILABLE, "<html>down</html>").unwrap_err();
        assert!(format!("{:#}", err).contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = GeminiClient::new(reqwest::Client::new(), GeminiConfig::default());
        assert!(client.generate(&[Turn::user("x")]).await.is_err());
    }

    #[test]
    fn test_endpoint_uses_model() {
        let client = GeminiClient::new(
            reqwest::Client::new(),
            GeminiConfig {
                api_key: "k".into(),
                model: "gemini-2.0-flash".into(),
                base_url: "https://generativelanguage.googleapis.com/v1beta/".into(),
            },
        );
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
