//! Task submission, monitoring and the execute pipeline

use std::time::Duration;
use tokio::time::Instant;

use super::RunningHubClient;
use crate::error::{Error, Result};
use crate::media::AggregatedResult;
use crate::retry::with_retry;
use crate::transport::SubmitRequest;
use crate::types::{Artifact, Event, ParamSet, StatusResult, Task, TaskId, TaskState};

/// How a monitored task finished
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    /// The task produced these artifacts
    Artifacts(Vec<Artifact>),
    /// The task finished with an empty output list
    NoOutput,
}

/// Result of [`RunningHubClient::execute`]
#[derive(Clone, Debug)]
pub struct ExecuteOutput {
    /// Id of the task that produced the result, for later out-of-band queries
    pub task_id: TaskId,
    /// Materialized outputs (placeholders when the task produced nothing)
    pub result: AggregatedResult,
}

impl RunningHubClient {
    /// Submit a task for the configured workflow or AI app
    ///
    /// Transport faults and unrecognized API rejections are retried with the
    /// configured backoff. The fixed set of configuration-level rejections
    /// (unsaved workflow, unknown id, bad key, no balance) fails on the first
    /// attempt.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use runninghub_client::{Config, ParamAssignment, RunningHubClient};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = RunningHubClient::new(Config::new("api-key", "1900000000000000001"))?;
    /// let params = vec![ParamAssignment::new("6", "text", "a watercolor fox")];
    /// let task_id = client.submit(params, false).await?;
    /// println!("submitted {}", task_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit(&self, params: ParamSet, high_performance: bool) -> Result<TaskId> {
        self.config.validate_for_submit()?;
        let request = SubmitRequest::from_config(&self.config, params, high_performance);
        self.submit_request(&request).await
    }

    /// Retrying submission of an already-built request
    pub(crate) async fn submit_request(&self, request: &SubmitRequest) -> Result<TaskId> {
        tracing::debug!(
            id = %request.workflow_or_app_id,
            ai_app = request.is_ai_app,
            params = request.params.len(),
            high_performance = request.high_performance,
            "submitting task"
        );

        let task_id = with_retry(&self.config.retry, "create task", || {
            self.transport.submit(&self.config, request)
        })
        .await?;

        tracing::info!(task_id = %task_id, "task created");
        self.emit_event(Event::TaskSubmitted {
            task_id: task_id.clone(),
        });
        Ok(task_id)
    }

    /// Poll once, folding transport faults into [`StatusResult::Running`]
    ///
    /// A network blip must never abort monitoring, so this never fails.
    pub(crate) async fn check_status(&self, task_id: &TaskId) -> StatusResult {
        match self.transport.poll_once(&self.config, task_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(
                    task_id = %task_id,
                    error = %e,
                    "status poll failed, treating task as still running"
                );
                StatusResult::Running
            }
        }
    }

    /// Poll a task until it completes, fails, or `timeout` elapses
    ///
    /// The first poll happens immediately, then every
    /// `polling.poll_interval`. The deadline is measured from the start of
    /// this call.
    ///
    /// # Errors
    ///
    /// - [`Error::TaskFailed`] as soon as the server reports a failure
    /// - [`Error::Timeout`] when the deadline passes
    pub async fn monitor(&self, task_id: &TaskId, timeout: Duration) -> Result<Completion> {
        let polling = &self.config.polling;
        let start = Instant::now();
        let deadline = start + timeout;
        let mut task = Task::submitted(task_id.clone());
        let mut last_state: Option<TaskState> = None;
        let mut last_log = start;

        tracing::info!(
            task_id = %task_id,
            timeout_secs = timeout.as_secs(),
            detail_url = %format!("{}/task/detail/{}", self.config.api_base(), task_id),
            "monitoring task"
        );

        loop {
            let status = self.check_status(task_id).await;
            let now = Instant::now();
            let elapsed = now - start;
            let state = status.state();

            if last_state != Some(state) {
                tracing::info!(
                    task_id = %task_id,
                    status = %state,
                    elapsed_secs = elapsed.as_secs(),
                    "task status changed"
                );
                self.emit_event(Event::TaskStatusChanged {
                    task_id: task_id.clone(),
                    state,
                    elapsed,
                });
                last_state = Some(state);
                last_log = now;
            } else if now - last_log >= polling.heartbeat_interval {
                tracing::info!(
                    task_id = %task_id,
                    status = %state,
                    elapsed_secs = elapsed.as_secs(),
                    "task is still in progress"
                );
                self.emit_event(Event::TaskHeartbeat {
                    task_id: task_id.clone(),
                    state,
                    elapsed,
                });
                last_log = now;
            }

            if let Err(e) = task.transition(state) {
                tracing::debug!(task_id = %task_id, error = %e, "ignoring unexpected status");
            }

            match status {
                StatusResult::Artifacts(artifacts) => {
                    tracing::info!(
                        task_id = %task_id,
                        artifacts = artifacts.len(),
                        "task completed"
                    );
                    self.emit_event(Event::TaskCompleted {
                        task_id: task_id.clone(),
                        artifacts: artifacts.len(),
                        state: task.state(),
                    });
                    return Ok(Completion::Artifacts(artifacts));
                }
                StatusResult::CompletedNoOutput => {
                    tracing::info!(task_id = %task_id, "task completed without output");
                    self.emit_event(Event::TaskCompleted {
                        task_id: task_id.clone(),
                        artifacts: 0,
                        state: task.state(),
                    });
                    return Ok(Completion::NoOutput);
                }
                StatusResult::Error { message } => {
                    let err = Error::TaskFailed {
                        task_id: task_id.clone(),
                        message,
                    };
                    return Err(self.fail_task(&task, err));
                }
                StatusResult::Queued | StatusResult::Running => {}
            }

            let now = Instant::now();
            if now >= deadline {
                if let Err(e) = task.transition(TaskState::TimedOut) {
                    tracing::debug!(task_id = %task_id, error = %e, "timeout after terminal state");
                }
                let err = Error::Timeout {
                    task_id: task_id.clone(),
                    seconds: timeout.as_secs(),
                };
                return Err(self.fail_task(&task, err));
            }
            tokio::time::sleep(polling.poll_interval.min(deadline - now)).await;
        }
    }

    /// Submit, monitor and materialize a task in one call
    ///
    /// A task that completes without output yields an all-placeholder result
    /// rather than an error.
    pub async fn execute(
        &self,
        params: ParamSet,
        timeout: Duration,
        high_performance: bool,
        persist: bool,
        prefix: &str,
    ) -> Result<ExecuteOutput> {
        let task_id = self.submit(params, high_performance).await?;

        let result = match self.monitor(&task_id, timeout).await? {
            Completion::Artifacts(artifacts) => {
                self.materialize(&task_id, artifacts, persist, prefix).await?
            }
            Completion::NoOutput => AggregatedResult::no_output(),
        };

        tracing::info!(task_id = %task_id, "execution completed");
        Ok(ExecuteOutput { task_id, result })
    }

    fn fail_task(&self, task: &Task, err: Error) -> Error {
        tracing::warn!(task_id = %task.id(), state = %task.state(), error = %err, "task failed");
        self.emit_event(Event::TaskFailed {
            task_id: task.id().clone(),
            state: task.state(),
            error: err.to_string(),
        });
        err
    }
}
