//! Out-of-band status queries and cancellation

use super::RunningHubClient;
use crate::error::{Error, Result};
use crate::types::{Event, StatusResult, TaskId};

/// Action for [`RunningHubClient::manage_task`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskAction {
    /// Report the current status
    GetStatus,
    /// Request cancellation
    Cancel,
}

impl RunningHubClient {
    /// Poll a task once without waiting
    ///
    /// Uses the same classification as monitoring; transport faults read as
    /// `Running`. Has no side effects, so repeated calls for a finished task
    /// return the same result.
    pub async fn get_status(&self, task_id: &TaskId) -> StatusResult {
        self.check_status(task_id).await
    }

    /// Ask the server to cancel a task
    ///
    /// Returns `true` only when the server accepted the request. Every fault
    /// is logged and reported as `false`; this never fails.
    pub async fn cancel_task(&self, task_id: &TaskId) -> bool {
        match self.transport.cancel(&self.config, task_id).await {
            Ok(accepted) => {
                if accepted {
                    tracing::info!(task_id = %task_id, "cancellation requested");
                    self.emit_event(Event::TaskCancelled {
                        task_id: task_id.clone(),
                    });
                }
                accepted
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "failed to cancel task");
                false
            }
        }
    }

    /// Run a management action and render a one-line report
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `task_id` is blank.
    pub async fn manage_task(&self, task_id: &TaskId, action: TaskAction) -> Result<String> {
        if task_id.as_str().trim().is_empty() {
            return Err(Error::config("task id is required", "task_id"));
        }
        let task_id = TaskId::from(task_id.as_str().trim());

        let report = match action {
            TaskAction::GetStatus => {
                let status = self.get_status(&task_id).await;
                let mut report = format!("Status for {}: {}", task_id, status.label());
                match status {
                    StatusResult::Artifacts(artifacts) => {
                        report.push_str(&format!(" ({} outputs)", artifacts.len()));
                    }
                    StatusResult::Error { message } => {
                        report.push_str(&format!(" - Error: {}", message));
                    }
                    _ => {}
                }
                report
            }
            TaskAction::Cancel => {
                if self.cancel_task(&task_id).await {
                    format!("Successfully requested cancellation for task {}.", task_id)
                } else {
                    format!(
                        "Failed to cancel task {}. It may have already completed or failed.",
                        task_id
                    )
                }
            }
        };
        tracing::info!(task_id = %task_id, action = ?action, report = %report, "task management");
        Ok(report)
    }
}
