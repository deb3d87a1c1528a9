//! Core types for runninghub-client

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Server-issued task identifier
///
/// Opaque to the client; never modified after the server assigns it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap a server-issued id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma-separated list of task ids, ignoring blanks
    ///
    /// ```
    /// use runninghub_client::TaskId;
    ///
    /// let ids = TaskId::parse_list(" a1, ,b2,c3 ");
    /// assert_eq!(ids.len(), 3);
    /// assert_eq!(ids[1].as_str(), "b2");
    /// ```
    pub fn parse_list(input: &str) -> Vec<TaskId> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(TaskId::from)
            .collect()
    }

    /// Join task ids into the comma-separated form accepted by [`TaskId::parse_list`]
    pub fn join(ids: &[TaskId]) -> String {
        ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(",")
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a remote task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Built locally, not yet accepted by the server
    Created,
    /// Waiting for a worker
    Queued,
    /// Executing on the server
    Running,
    /// Finished with at least one output artifact
    Completed,
    /// Finished without producing any output
    CompletedNoOutput,
    /// Server reported a failure
    Error,
    /// Local monitoring deadline elapsed
    TimedOut,
    /// Cancelled on request
    Cancelled,
}

impl TaskState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed
                | TaskState::CompletedNoOutput
                | TaskState::Error
                | TaskState::TimedOut
                | TaskState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Created, Queued | Running) => true,
            (Queued | Running, Queued | Running) => true,
            (Queued | Running, Completed | CompletedNoOutput | Error) => true,
            (s, TimedOut | Cancelled) => !s.is_terminal(),
            _ => false,
        }
    }

    /// Label as the server spells it (`QUEUED`, `RUNNING`, `completed_no_output`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Queued => "QUEUED",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "completed",
            TaskState::CompletedNoOutput => "completed_no_output",
            TaskState::Error => "error",
            TaskState::TimedOut => "timed_out",
            TaskState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task and its current lifecycle state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    state: TaskState,
}

impl Task {
    /// Track a task the server has just accepted
    pub fn submitted(id: TaskId) -> Self {
        Self {
            id,
            state: TaskState::Queued,
        }
    }

    /// The task id
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// The current state
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    ///
    /// Returns `true` when the state actually changed.
    pub fn transition(&mut self, next: TaskState) -> Result<bool> {
        if self.state == next {
            return Ok(false);
        }
        if !self.state.can_transition_to(next) {
            return Err(Error::NotSupported(format!(
                "task {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(true)
    }
}

/// Output category of an artifact, decided once from the server-reported file type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// png, jpg, jpeg, webp, bmp
    Image,
    /// mp4, avi, mov, webm
    Video,
    /// wav, mp3, flac, ogg
    Audio,
    /// txt
    Text,
    /// safetensors
    Latent,
    /// Anything else
    Unknown,
}

impl ArtifactKind {
    /// Classify a file extension (case-insensitive, leading dot allowed)
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "bmp" => ArtifactKind::Image,
            "mp4" | "avi" | "mov" | "webm" => ArtifactKind::Video,
            "wav" | "mp3" | "flac" | "ogg" => ArtifactKind::Audio,
            "txt" => ArtifactKind::Text,
            "safetensors" => ArtifactKind::Latent,
            _ => ArtifactKind::Unknown,
        }
    }

    /// Lowercase name, also the aggregation sort key
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Video => "video",
            ArtifactKind::Audio => "audio",
            ArtifactKind::Text => "text",
            ArtifactKind::Latent => "latent",
            ArtifactKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One output file produced by a completed task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Download URL
    pub url: String,
    /// Category derived from `extension`
    pub kind: ArtifactKind,
    /// Lowercased file type as reported by the server
    pub extension: String,
}

impl Artifact {
    /// Build an artifact from the server's `fileUrl` / `fileType` pair
    pub fn new(url: impl Into<String>, file_type: &str) -> Self {
        let extension = file_type.trim().trim_start_matches('.').to_ascii_lowercase();
        Self {
            url: url.into(),
            kind: ArtifactKind::from_extension(&extension),
            extension,
        }
    }
}

/// Classified result of one status poll
#[derive(Clone, Debug, PartialEq)]
pub enum StatusResult {
    /// Task finished and produced these artifacts
    Artifacts(Vec<Artifact>),
    /// Waiting for a worker
    Queued,
    /// Executing, or the poll was inconclusive
    Running,
    /// Task finished with an empty output list
    CompletedNoOutput,
    /// Server reported a failure
    Error {
        /// Failure details (server message plus any `data.error`)
        message: String,
    },
}

impl StatusResult {
    /// The lifecycle state this poll result implies
    pub fn state(&self) -> TaskState {
        match self {
            StatusResult::Artifacts(_) => TaskState::Completed,
            StatusResult::Queued => TaskState::Queued,
            StatusResult::Running => TaskState::Running,
            StatusResult::CompletedNoOutput => TaskState::CompletedNoOutput,
            StatusResult::Error { .. } => TaskState::Error,
        }
    }

    /// Status label as reported to users
    pub fn label(&self) -> &'static str {
        self.state().as_str()
    }
}

/// One field override for one workflow node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamAssignment {
    /// Node id inside the workflow
    pub node_id: String,
    /// Input field on that node
    pub field_name: String,
    /// Value to assign (uploaded file names are passed here too)
    pub field_value: String,
}

impl ParamAssignment {
    /// Build an assignment, trimming the node id and field name
    pub fn new(
        node_id: impl Into<String>,
        field_name: impl Into<String>,
        field_value: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into().trim().to_string(),
            field_name: field_name.into().trim().to_string(),
            field_value: field_value.into(),
        }
    }
}

/// Ordered field overrides for one task
pub type ParamSet = Vec<ParamAssignment>;

/// One [`ParamSet`] per task in a batch
pub type ParamBundle = Vec<ParamSet>;

/// Event emitted during task lifecycles
///
/// Subscribe with [`crate::RunningHubClient::subscribe`]. Events are purely
/// observational; dropping the receiver never affects control flow.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The server accepted a submission
    TaskSubmitted {
        /// New task id
        task_id: TaskId,
    },
    /// A poll observed a different state than the previous one
    TaskStatusChanged {
        /// Task being monitored
        task_id: TaskId,
        /// Newly observed state
        state: TaskState,
        /// Time since monitoring started
        elapsed: Duration,
    },
    /// Periodic reminder that a task is still in the same state
    TaskHeartbeat {
        /// Task being monitored
        task_id: TaskId,
        /// Unchanged state
        state: TaskState,
        /// Time since monitoring started
        elapsed: Duration,
    },
    /// Monitoring finished successfully
    TaskCompleted {
        /// Finished task
        task_id: TaskId,
        /// Number of artifacts in the manifest
        artifacts: usize,
        /// Final lifecycle state (`completed` or `completed_no_output`)
        state: TaskState,
    },
    /// Monitoring or fetching ended in a fatal error
    TaskFailed {
        /// Failed task
        task_id: TaskId,
        /// Final lifecycle state (`error` or `timed_out`)
        state: TaskState,
        /// Rendered error
        error: String,
    },
    /// The server accepted a cancellation request
    TaskCancelled {
        /// Cancelled task
        task_id: TaskId,
    },
    /// An artifact was dropped during materialization
    ArtifactSkipped {
        /// Owning task
        task_id: TaskId,
        /// Artifact URL
        url: String,
        /// Why it was dropped
        reason: String,
    },
    /// An artifact was written to local storage
    ArtifactPersisted {
        /// Owning task
        task_id: TaskId,
        /// Destination path
        path: std::path::PathBuf,
    },
    /// A batch element was replaced by a placeholder
    BatchElementFailed {
        /// Position in the batch (0-based)
        index: usize,
        /// Rendered error
        error: String,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_kind_from_extension() {
        assert_eq!(ArtifactKind::from_extension("PNG"), ArtifactKind::Image);
        assert_eq!(ArtifactKind::from_extension(".jpeg"), ArtifactKind::Image);
        assert_eq!(ArtifactKind::from_extension("webm"), ArtifactKind::Video);
        assert_eq!(ArtifactKind::from_extension("flac"), ArtifactKind::Audio);
        assert_eq!(ArtifactKind::from_extension("txt"), ArtifactKind::Text);
        assert_eq!(
            ArtifactKind::from_extension("safetensors"),
            ArtifactKind::Latent
        );
        assert_eq!(ArtifactKind::from_extension("zip"), ArtifactKind::Unknown);
        assert_eq!(ArtifactKind::from_extension(""), ArtifactKind::Unknown);
    }

    #[test]
    fn artifact_normalizes_extension() {
        let a = Artifact::new("https://cdn/x.JPG", " JPG ");
        assert_eq!(a.extension, "jpg");
        assert_eq!(a.kind, ArtifactKind::Image);
    }

    #[test]
    fn kind_names_sort_deterministically() {
        let mut kinds = vec![
            ArtifactKind::Video,
            ArtifactKind::Text,
            ArtifactKind::Image,
            ArtifactKind::Audio,
            ArtifactKind::Latent,
        ];
        kinds.sort_by_key(|k| k.as_str());
        assert_eq!(
            kinds,
            vec![
                ArtifactKind::Audio,
                ArtifactKind::Image,
                ArtifactKind::Latent,
                ArtifactKind::Text,
                ArtifactKind::Video,
            ]
        );
    }

    #[test]
    fn task_transitions_follow_lifecycle() {
        let mut task = Task::submitted(TaskId::from("t"));
        assert!(task.transition(TaskState::Running).unwrap());
        assert!(!task.transition(TaskState::Running).unwrap());
        assert!(task.transition(TaskState::Completed).unwrap());
        assert!(task.state().is_terminal());

        // Terminal states are final
        assert!(task.transition(TaskState::Running).is_err());
        assert!(task.transition(TaskState::Cancelled).is_err());
    }

    #[test]
    fn created_cannot_complete_directly() {
        assert!(!TaskState::Created.can_transition_to(TaskState::Completed));
        assert!(TaskState::Created.can_transition_to(TaskState::Cancelled));
        assert!(TaskState::Queued.can_transition_to(TaskState::TimedOut));
    }

    #[test]
    fn task_id_list_round_trip() {
        let ids = TaskId::parse_list("a,b , c");
        assert_eq!(TaskId::join(&ids), "a,b,c");
        assert!(TaskId::parse_list(" , ").is_empty());
    }

    #[test]
    fn param_assignment_serializes_camel_case() {
        let p = ParamAssignment::new(" 6 ", "text ", "a cat");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["nodeId"], "6");
        assert_eq!(json["fieldName"], "text");
        assert_eq!(json["fieldValue"], "a cat");
    }
}
