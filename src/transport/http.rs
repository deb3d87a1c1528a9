//! HTTP transport on top of reqwest

use super::{ApiEnvelope, SubmitRequest, Transport, UploadRequest, classify_status};
use crate::config::Config;
use crate::error::{BusinessError, Error, Result, TransportError};
use crate::types::{ArtifactKind, StatusResult, TaskId};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Production [`Transport`] backed by a shared `reqwest::Client`
///
/// # Examples
///
/// ```no_run
/// use runninghub_client::transport::{HttpTransport, Transport};
/// use runninghub_client::{Config, TaskId};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new()?;
/// let config = Config::new("api-key", "1900000000000000001");
/// let status = transport.poll_once(&config, &TaskId::from("1234")).await?;
/// println!("{}", status.label());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a fresh connection pool
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("runninghub-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ExternalTool(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<ApiEnvelope> {
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, timeout.as_secs(), e))?;
        read_envelope(url, timeout, response).await
    }
}

async fn read_envelope(
    url: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<ApiEnvelope> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::from_reqwest(url, timeout.as_secs(), e))?;
    serde_json::from_slice(&body).map_err(|e| {
        TransportError::MalformedEnvelope {
            url: url.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, config: &Config, request: &SubmitRequest) -> Result<TaskId> {
        let url = format!("{}{}", config.api_base(), request.endpoint());
        let body = request.body(&config.api_key)?;
        let envelope = self.post_json(&url, &body, config.timeouts.submit).await?;

        if !envelope.is_success() {
            return Err(BusinessError::from_envelope(
                envelope.code,
                &envelope.msg,
                &request.workflow_or_app_id,
            )
            .into());
        }
        envelope.data_str("taskId").map(TaskId::from).ok_or_else(|| {
            TransportError::MissingField {
                url,
                field: "data.taskId",
            }
            .into()
        })
    }

    async fn poll_once(&self, config: &Config, task_id: &TaskId) -> Result<StatusResult> {
        let url = format!("{}/task/openapi/outputs", config.api_base());
        let body = json!({
            "taskId": task_id.as_str(),
            "apiKey": config.api_key,
        });
        let envelope = self.post_json(&url, &body, config.timeouts.poll).await?;
        Ok(classify_status(&envelope))
    }

    async fn cancel(&self, config: &Config, task_id: &TaskId) -> Result<bool> {
        let url = format!("{}/task/openapi/cancel", config.api_base());
        let body = json!({
            "taskId": task_id.as_str(),
            "apiKey": config.api_key,
        });
        let envelope = self.post_json(&url, &body, config.timeouts.poll).await?;
        if !envelope.is_success() {
            tracing::warn!(
                task_id = %task_id,
                code = envelope.code,
                msg = %envelope.msg,
                "server refused to cancel task"
            );
        }
        Ok(envelope.is_success())
    }

    async fn upload_file(&self, config: &Config, request: &UploadRequest) -> Result<String> {
        let url = format!("{}/task/openapi/upload", config.api_base());
        let timeout = config.timeouts.upload;

        let part = reqwest::multipart::Part::bytes(request.bytes.clone())
            .file_name(request.file_name.clone())
            .mime_str(&request.content_type)
            .map_err(|e| TransportError::from_reqwest(&url, timeout.as_secs(), e))?;
        let form = reqwest::multipart::Form::new()
            .text("apiKey", config.api_key.clone())
            .text("fileType", request.kind.as_str())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, timeout.as_secs(), e))?;
        let envelope = read_envelope(&url, timeout, response).await?;

        if !envelope.is_success() {
            return Err(BusinessError::from_envelope(
                envelope.code,
                &envelope.msg,
                &config.workflow_or_app_id,
            )
            .into());
        }
        envelope.data_str("fileName").ok_or_else(|| {
            TransportError::MissingField {
                url,
                field: "data.fileName",
            }
            .into()
        })
    }

    async fn download(&self, config: &Config, url: &str, kind: ArtifactKind) -> Result<Vec<u8>> {
        let timeout = config.timeouts.download_timeout(kind);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, timeout.as_secs(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url, timeout.as_secs(), e))?;
        Ok(body.to_vec())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
