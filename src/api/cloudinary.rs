//! Cloudinary unsigned upload (Media Host).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::client::{describe_failure, ServiceError};
use crate::config::CloudinaryConfig;
use crate::room::{ImageFile, MediaHost};

const UPLOAD_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<ServiceError>,
}

fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<String> {
    let parsed: UploadResponse = match serde_json::from_str(body) {
        Ok(p) => p,
        Err(_) => bail!("{}", describe_failure(status, "Cloudinary upload", body)),
    };
    if let Some(err) = parsed.error {
        bail!("Cloudinary error: {}", err.message());
    }
    if !status.is_success() {
        bail!("{}", describe_failure(status, "Cloudinary upload", body));
    }
    parsed
        .secure_url
        .filter(|u| !u.is_empty())
        .context("Cloudinary response has no secure_url")
}

pub struct CloudinaryClient {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(http: reqwest::Client, config: CloudinaryConfig) -> Self {
        if config.cloud_name.is_empty() || config.upload_preset.is_empty() {
            tracing::warn!("Cloudinary cloud name or upload preset missing; uploads will fail");
        }
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/upload", UPLOAD_BASE, self.config.cloud_name)
    }
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    async fn upload(&self, file: ImageFile) -> Result<String> {
        if self.config.cloud_name.is_empty() || self.config.upload_preset.is_empty() {
            bail!("Cloudinary not configured (set CLOUDINARY_CLOUD_NAME and CLOUDINARY_UPLOAD_PRESET)");
        }

        let size = file.bytes.len();
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .with_context(|| format!("Invalid MIME type {}", file.mime_type))?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone());

        let url = self.endpoint();
        tracing::debug!("Cloudinary POST {} ({}, {} bytes)", url, file.file_name, size);

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Cloudinary POST {} failed", url))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read Cloudinary response")?;
        parse_response(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_secure_url_extracted() {
        let body = r#"{"public_id":"abc","secure_url":"https://res.cloudinary.com/dh1whb4lt/image/upload/abc.png","url":"http://x"}"#;
        assert_eq!(
            parse_response(StatusCode::OK, body).unwrap(),
            "https://res.cloudinary.com/dh1whb4lt/image/upload/abc.png"
        );
    }

    #[test]
    fn test_error_message_surfaces() {
        let body = r#"{"error":{"message":"Upload preset not found"}}"#;
        let err = parse_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(format!("{:#}", err).contains("Upload preset not found"));
    }

    #[test]
    fn test_missing_url_is_an_error() {
        assert!(parse_response(StatusCode::OK, "{}").is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_upload_fails_fast() {
        let client = CloudinaryClient::new(reqwest::Client::new(), CloudinaryConfig::default());
        let file = ImageFile {
            file_name: "a.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        assert!(client.upload(file).await.is_err());
    }

    #[test]
    fn test_endpoint_includes_cloud_name() {
        let client = CloudinaryClient::new(
            reqwest::Client::new(),
            CloudinaryConfig {
                cloud_name: "dh1whb4lt".into(),
                upload_preset: "chatroom_unsigned".into(),
            },
        );
        assert_eq!(
            client.endpoint(),
            "https://api.cloudinary.com/v1_1/dh1whb4lt/upload"
        );
    }
}
