//! RunningHub task API transport
//!
//! Every call is a single request/response with an explicit timeout. Responses
//! share the `{code, msg, data}` envelope; `code == 0` means success.
//!
//! ## Architecture
//!
//! The engine talks to the API only through the [`Transport`] trait so that
//! lifecycle, materialization and batch logic can be exercised against
//! scripted stubs. [`HttpTransport`] is the production implementation.
//!
//! Status polls are classified into a [`StatusResult`] by [`classify_status`]:
//!
//! | envelope | result |
//! |---|---|
//! | `msg == APIKEY_TASK_IS_QUEUED` | `Queued` |
//! | `msg == APIKEY_TASK_IS_RUNNING` | `Running` |
//! | `code == 0`, non-empty list | `Artifacts` |
//! | `code == 0`, empty list | `CompletedNoOutput` |
//! | `code == 0`, `data == null` | `Running` |
//! | `code != 0` | `Error` |
//! | anything else | `Running` |

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::types::{Artifact, ArtifactKind, ParamSet, StatusResult, TaskId};

/// `msg` reported while a task waits for a worker
pub const MSG_TASK_QUEUED: &str = "APIKEY_TASK_IS_QUEUED";

/// `msg` reported while a task executes
pub const MSG_TASK_RUNNING: &str = "APIKEY_TASK_IS_RUNNING";

/// Authenticated access to the RunningHub task API
///
/// Implementations perform exactly one request per call; retrying is the
/// caller's job (see [`crate::retry::with_retry`]).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create a task and return its server-issued id
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Transport`] for network faults, non-2xx statuses,
    ///   malformed envelopes or a success envelope without `data.taskId`
    /// - [`crate::Error::Business`] when the envelope carries `code != 0`
    async fn submit(&self, config: &Config, request: &SubmitRequest) -> Result<TaskId>;

    /// Poll the outputs endpoint once and classify the answer
    async fn poll_once(&self, config: &Config, task_id: &TaskId) -> Result<StatusResult>;

    /// Ask the server to cancel a task; `true` only when it answers `code == 0`
    async fn cancel(&self, config: &Config, task_id: &TaskId) -> Result<bool>;

    /// Upload a file and return the remote file name to use as a field value
    async fn upload_file(&self, config: &Config, request: &UploadRequest) -> Result<String>;

    /// Download an artifact body
    ///
    /// The timeout is chosen by `kind` (see [`crate::config::TimeoutConfig::download_timeout`]).
    async fn download(&self, config: &Config, url: &str, kind: ArtifactKind) -> Result<Vec<u8>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// The `{code, msg, data}` response envelope
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// `0` on success
    pub code: i64,
    /// Status or error token
    #[serde(default)]
    pub msg: String,
    /// Endpoint-specific payload
    #[serde(default)]
    pub data: Value,
}

impl ApiEnvelope {
    /// Whether the server reported success
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Render the failure details, including `data.error` when present
    pub fn error_details(&self) -> String {
        match &self.data {
            Value::Object(map) => {
                let details = match map.get("error") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => self.data.to_string(),
                };
                format!("{}: {}", self.msg, details)
            }
            _ => self.msg.clone(),
        }
    }

    /// Read a string field from an object payload; numbers are stringified
    pub(crate) fn data_str(&self, field: &str) -> Option<String> {
        match self.data.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One entry of the outputs manifest
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    file_type: Option<String>,
}

/// Classify an outputs envelope into a [`StatusResult`]
pub fn classify_status(envelope: &ApiEnvelope) -> StatusResult {
    if envelope.msg == MSG_TASK_QUEUED {
        return StatusResult::Queued;
    }
    if envelope.msg == MSG_TASK_RUNNING {
        return StatusResult::Running;
    }
    if !envelope.is_success() {
        return StatusResult::Error {
            message: envelope.error_details(),
        };
    }
    match &envelope.data {
        Value::Array(entries) if entries.is_empty() => StatusResult::CompletedNoOutput,
        Value::Array(entries) => StatusResult::Artifacts(parse_manifest(entries)),
        _ => StatusResult::Running,
    }
}

fn parse_manifest(entries: &[Value]) -> Vec<Artifact> {
    entries
        .iter()
        .filter_map(|entry| {
            let parsed: ManifestEntry = match serde_json::from_value(entry.clone()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed manifest entry");
                    return None;
                }
            };
            match parsed.file_url.filter(|u| !u.is_empty()) {
                Some(url) => Some(Artifact::new(url, parsed.file_type.as_deref().unwrap_or(""))),
                None => {
                    tracing::warn!("skipping manifest entry without fileUrl");
                    None
                }
            }
        })
        .collect()
}

/// Everything needed to create one task
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitRequest {
    /// Workflow id, or AI app id when `is_ai_app` is set
    pub workflow_or_app_id: String,
    /// Use the AI app endpoint
    pub is_ai_app: bool,
    /// Node overrides
    pub params: ParamSet,
    /// Request the high-performance instance type
    pub high_performance: bool,
}

impl SubmitRequest {
    /// Build a request for the workflow or app named in `config`
    pub fn from_config(config: &Config, params: ParamSet, high_performance: bool) -> Self {
        Self {
            workflow_or_app_id: config.workflow_or_app_id.trim().to_string(),
            is_ai_app: config.is_ai_app,
            params,
            high_performance,
        }
    }

    /// Build a workflow request for an explicit workflow id
    pub fn workflow(workflow_id: impl Into<String>, params: ParamSet) -> Self {
        Self {
            workflow_or_app_id: workflow_id.into(),
            is_ai_app: false,
            params,
            high_performance: false,
        }
    }

    /// Endpoint path relative to the base URL
    pub fn endpoint(&self) -> &'static str {
        if self.is_ai_app {
            "/task/openapi/ai-app/run"
        } else {
            "/task/openapi/create"
        }
    }

    /// JSON body for the create or ai-app/run endpoint
    pub fn body(&self, api_key: &str) -> Result<Value> {
        let mut body = serde_json::Map::new();
        if self.is_ai_app {
            let app_id: i64 = self.workflow_or_app_id.trim().parse().map_err(|_| {
                crate::Error::config(
                    format!("AI app id must be numeric, got '{}'", self.workflow_or_app_id),
                    "workflow_or_app_id",
                )
            })?;
            body.insert("webappId".into(), Value::from(app_id));
        } else {
            body.insert(
                "workflowId".into(),
                Value::from(self.workflow_or_app_id.clone()),
            );
        }
        body.insert("apiKey".into(), Value::from(api_key));
        body.insert("nodeInfoList".into(), serde_json::to_value(&self.params)?);
        if self.high_performance {
            body.insert("instanceType".into(), Value::from("plus"));
        }
        Ok(Value::Object(body))
    }
}

/// Declared category of an uploaded file (the multipart `fileType` field)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// Images and masks
    Image,
    /// Video files
    Video,
    /// Audio files
    Audio,
    /// Safetensors latents
    Latent,
    /// Anything else
    File,
}

impl FileKind {
    /// Value sent as `fileType`
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
            FileKind::Latent => "latent",
            FileKind::File => "file",
        }
    }
}

/// A file to upload
#[derive(Clone, Debug)]
pub struct UploadRequest {
    /// File contents
    pub bytes: Vec<u8>,
    /// File name sent in the multipart part
    pub file_name: String,
    /// MIME type of the part
    pub content_type: String,
    /// Declared category
    pub kind: FileKind,
}

impl UploadRequest {
    /// Build an upload request
    pub fn new(
        bytes: Vec<u8>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        kind: FileKind,
    ) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            content_type: content_type.into(),
            kind,
        }
    }
}
