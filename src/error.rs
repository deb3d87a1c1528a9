//! Error types for runninghub-client
//!
//! This module provides the error taxonomy used throughout the library:
//! - [`TransportError`] for network and HTTP-level faults (always retryable)
//! - [`BusinessError`] for requests the server rejected, split into a fixed
//!   non-retryable set and a retryable catch-all
//! - [`DecodeError`] for a single artifact that could not be downloaded or decoded
//! - Task-level faults (timeouts, server-reported task failure, batch failure)
//!
//! Retry eligibility is decided by [`Error::class`], which returns an explicit
//! [`FaultClass`] tag instead of relying on message inspection.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{ArtifactKind, TaskId};

/// Result type alias for runninghub-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// How a fault should be handled by the caller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultClass {
    /// Abort the operation and surface the error
    Fatal,
    /// Transient fault, the operation may be attempted again
    Retryable,
    /// Isolated fault, log it and continue without the affected item
    Skip,
}

/// Main error type for runninghub-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api_key")
        key: Option<String>,
    },

    /// Network or HTTP-level failure talking to the API
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API rejected the request
    #[error(transparent)]
    Business(#[from] BusinessError),

    /// The local monitoring deadline elapsed before the task finished
    #[error("task {task_id} timed out after {seconds} seconds")]
    Timeout {
        /// The task being monitored
        task_id: TaskId,
        /// The deadline that was exceeded
        seconds: u64,
    },

    /// The server reported the task itself as failed
    #[error("task {task_id} failed on RunningHub server: {message}")]
    TaskFailed {
        /// The failed task
        task_id: TaskId,
        /// The server-provided failure details
        message: String,
    },

    /// The task finished but its output manifest never became available
    #[error("timed out waiting for outputs of task {task_id} after {attempts} attempts")]
    OutputsUnavailable {
        /// The task whose outputs were requested
        task_id: TaskId,
        /// How many manifest polls were made
        attempts: u32,
    },

    /// A single artifact failed to download or decode
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Retry budget exhausted; carries the last underlying cause
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Name of the retried operation (e.g., "submit task")
        operation: String,
        /// Number of attempts made
        attempts: u32,
        /// The error from the final attempt
        #[source]
        source: Box<Error>,
    },

    /// Every submission in a batch failed
    #[error("all {count} task submissions failed for the batch")]
    BatchSubmission {
        /// Number of parameter sets that were submitted
        count: usize,
    },

    /// Requested image index is outside the result batch
    #[error("index {index} out of range (batch size: {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of available items
        len: usize,
    },

    /// An encoded upload exceeds the server's size limit
    #[error("{file_name} is {bytes} bytes, over the {limit}-byte upload limit")]
    UploadTooLarge {
        /// Name the file would have been uploaded as
        file_name: String,
        /// Encoded size
        bytes: usize,
        /// Largest accepted size
        limit: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, unsupported format)
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Network and HTTP-level faults
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the response body could not be read
    #[error("request to {url} failed: {source}")]
    Request {
        /// Endpoint that was called
        url: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded its timeout
    #[error("request to {url} timed out after {seconds} seconds")]
    Timeout {
        /// Endpoint that was called
        url: String,
        /// The timeout that elapsed
        seconds: u64,
    },

    /// Non-2xx HTTP status
    #[error("HTTP {status} from {url}")]
    Status {
        /// Endpoint that was called
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Response body was not a valid `{code, msg, data}` envelope
    #[error("malformed response from {url}: {reason}")]
    MalformedEnvelope {
        /// Endpoint that was called
        url: String,
        /// What was wrong with the body
        reason: String,
    },

    /// A successful envelope was missing an expected field
    #[error("response from {url} is missing {field}")]
    MissingField {
        /// Endpoint that was called
        url: String,
        /// The missing field (e.g., "data.taskId")
        field: &'static str,
    },
}

impl TransportError {
    /// Build a transport error from a reqwest error, separating timeouts
    pub(crate) fn from_reqwest(url: &str, seconds: u64, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                seconds,
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Requests rejected by the API (`code != 0`)
///
/// The first five variants form the fixed non-retryable set; each renders a
/// message telling the user what to fix. Everything else lands in `Other` and
/// is retried.
#[derive(Debug, Error)]
pub enum BusinessError {
    /// Workflow exists but is a draft, unsaved, or not accessible
    #[error(
        "workflow error: {msg}\nPlease check:\n\
         1. Workflow ID '{workflow_id}' exists on RunningHub\n\
         2. Workflow is saved\n\
         3. Workflow status is set to 'Running' (not Draft)\n\
         4. You have access to this workflow"
    )]
    WorkflowNotRunning {
        /// Workflow or app id that was submitted
        workflow_id: String,
        /// Server message
        msg: String,
    },

    /// Workflow id does not exist
    #[error("workflow '{workflow_id}' was not found on RunningHub ({msg})")]
    WorkflowNotFound {
        /// Workflow or app id that was submitted
        workflow_id: String,
        /// Server message
        msg: String,
    },

    /// Workflow id is malformed
    #[error("workflow id '{workflow_id}' is invalid ({msg})")]
    InvalidWorkflowId {
        /// Workflow or app id that was submitted
        workflow_id: String,
        /// Server message
        msg: String,
    },

    /// API key rejected
    #[error("invalid API key; check the api_key in your configuration")]
    InvalidApiKey,

    /// Account cannot pay for the task
    #[error("insufficient balance; top up your RunningHub account")]
    InsufficientBalance,

    /// Any other rejection
    #[error("API error (code {code}): {msg}")]
    Other {
        /// Envelope code
        code: i64,
        /// Server message
        msg: String,
    },
}

impl BusinessError {
    /// Map an envelope `code`/`msg` pair onto a business error
    ///
    /// `msg` is compared as a whole token against the known server codes.
    pub fn from_envelope(code: i64, msg: &str, workflow_id: &str) -> Self {
        let token = msg.trim();
        let workflow_id = workflow_id.to_string();
        let msg = msg.to_string();
        match token {
            "WORKFLOW_NOT_SAVED_OR_NOT_RUNNING" => {
                BusinessError::WorkflowNotRunning { workflow_id, msg }
            }
            "WORKFLOW_NOT_FOUND" => BusinessError::WorkflowNotFound { workflow_id, msg },
            "INVALID_WORKFLOW_ID" => BusinessError::InvalidWorkflowId { workflow_id, msg },
            "INVALID_API_KEY" => BusinessError::InvalidApiKey,
            "INSUFFICIENT_BALANCE" => BusinessError::InsufficientBalance,
            _ => BusinessError::Other { code, msg },
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusinessError::Other { .. })
    }
}

/// Failure to materialize a single artifact
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Image bytes could not be decoded or encoded
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// WAV bytes could not be decoded or encoded
    #[error("audio codec error: {0}")]
    Audio(#[from] hound::Error),

    /// Safetensors payload could not be parsed or written
    #[error("latent codec error: {0}")]
    Latent(#[from] safetensors::SafeTensorError),

    /// Tensor uses an element type this crate does not convert
    #[error("tensor '{name}' has unsupported dtype {dtype}")]
    UnsupportedDtype {
        /// Tensor name inside the safetensors file
        name: String,
        /// The dtype reported by the file
        dtype: String,
    },

    /// Text artifact was not valid UTF-8
    #[error("text is not valid UTF-8: {0}")]
    Text(#[from] std::string::FromUtf8Error),

    /// The artifact kind cannot be decoded at all
    #[error("unsupported artifact type '{extension}'")]
    Unsupported {
        /// Reported file extension
        extension: String,
    },

    /// Decoding needs a capability that is not available
    #[error("{kind} artifact '{extension}' needs {capability}, which is unavailable")]
    MissingCapability {
        /// Artifact kind being decoded
        kind: ArtifactKind,
        /// Reported file extension
        extension: String,
        /// Name of the missing capability
        capability: &'static str,
    },

    /// The artifact could not be downloaded
    #[error("download of {url} failed: {source}")]
    Download {
        /// Artifact URL
        url: String,
        /// Underlying transport fault
        #[source]
        source: Box<Error>,
    },

    /// External media tool failed
    #[error("media tool failed: {0}")]
    MediaTool(String),

    /// Writing the persisted copy failed
    #[error("failed to write {path}: {source}")]
    Persist {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Classify this error for retry and isolation decisions
    pub fn class(&self) -> FaultClass {
        match self {
            // Network blips, HTTP 5xx, malformed responses
            Error::Transport(_) => FaultClass::Retryable,
            Error::Business(e) if e.is_retryable() => FaultClass::Retryable,
            Error::Business(_) => FaultClass::Fatal,
            // A bad artifact never takes down its siblings
            Error::Decode(_) => FaultClass::Skip,
            Error::Config { .. }
            | Error::Timeout { .. }
            | Error::TaskFailed { .. }
            | Error::OutputsUnavailable { .. }
            | Error::RetryExhausted { .. }
            | Error::BatchSubmission { .. }
            | Error::IndexOutOfRange { .. }
            | Error::UploadTooLarge { .. }
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::ExternalTool(_)
            | Error::NotSupported(_) => FaultClass::Fatal,
        }
    }

    /// Machine-readable error code for collaborators that render failures
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Transport(_) => "transport_error",
            Error::Business(e) => match e {
                BusinessError::WorkflowNotRunning { .. } => "workflow_not_running",
                BusinessError::WorkflowNotFound { .. } => "workflow_not_found",
                BusinessError::InvalidWorkflowId { .. } => "invalid_workflow_id",
                BusinessError::InvalidApiKey => "invalid_api_key",
                BusinessError::InsufficientBalance => "insufficient_balance",
                BusinessError::Other { .. } => "api_error",
            },
            Error::Timeout { .. } => "timeout",
            Error::TaskFailed { .. } => "task_failed",
            Error::OutputsUnavailable { .. } => "outputs_unavailable",
            Error::Decode(_) => "decode_error",
            Error::RetryExhausted { .. } => "retry_exhausted",
            Error::BatchSubmission { .. } => "batch_submission_failed",
            Error::IndexOutOfRange { .. } => "index_out_of_range",
            Error::UploadTooLarge { .. } => "upload_too_large",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
        }
    }

    /// Shorthand for a configuration error on a specific key
    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
