//! Batch fan-out/fan-in over many tasks

use futures::stream::{self, StreamExt};
use std::time::Duration;

use super::RunningHubClient;
use super::outputs::FetchOutcome;
use crate::error::{Error, Result};
use crate::media::{AggregatedResult, Audio, Latent};
use crate::transport::SubmitRequest;
use crate::types::{Event, ParamBundle, TaskId};

impl RunningHubClient {
    /// Submit one task per parameter set against `workflow_id`
    ///
    /// Submissions run concurrently (at most `output.max_concurrency` at a
    /// time), each with the retry policy. Failed submissions are logged and
    /// dropped; the ids of the successful ones are returned in bundle order.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when `workflow_id` or `bundle` is empty
    /// - [`Error::BatchSubmission`] when every submission failed
    pub async fn run_batch(&self, workflow_id: &str, bundle: ParamBundle) -> Result<Vec<TaskId>> {
        let workflow_id = workflow_id.trim();
        if workflow_id.is_empty() {
            return Err(Error::config("workflow id is required", "workflow_id"));
        }
        if bundle.is_empty() {
            return Err(Error::config("parameter bundle is empty", "bundle"));
        }

        let count = bundle.len();
        let width = self.config.output.max_concurrency.min(count).max(1);
        tracing::info!(tasks = count, concurrency = width, "starting batch submission");

        let mut results: Vec<(usize, Result<TaskId>)> = stream::iter(bundle.into_iter().enumerate())
            .map(|(index, params)| async move {
                let request = SubmitRequest::workflow(workflow_id, params);
                (index, self.submit_request(&request).await)
            })
            .buffer_unordered(width)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut task_ids = Vec::with_capacity(count);
        for (index, result) in results {
            match result {
                Ok(task_id) => task_ids.push(task_id),
                Err(e) => {
                    tracing::warn!(index, error = %e, "task submission failed");
                    self.emit_event(Event::BatchElementFailed {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        if task_ids.is_empty() {
            return Err(Error::BatchSubmission { count });
        }
        tracing::info!(
            submitted = task_ids.len(),
            failed = count - task_ids.len(),
            task_ids = %TaskId::join(&task_ids),
            "batch submission complete"
        );
        Ok(task_ids)
    }

    /// Monitor and fetch every task, then merge the results in input order
    ///
    /// Each element runs monitor + fetch concurrently with its siblings. A
    /// failing element (timeout, server failure, no output) contributes a
    /// placeholder whose text is `ERROR: {error}` and never aborts the rest.
    /// With more than one task, element `i` persists under `{prefix}_{i+1}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `task_ids` is empty.
    pub async fn download_batch(
        &self,
        task_ids: &[TaskId],
        timeout: Duration,
        persist: bool,
        prefix: &str,
    ) -> Result<AggregatedResult> {
        if task_ids.is_empty() {
            return Err(Error::config("at least one task id is required", "task_id"));
        }

        let is_batch = task_ids.len() > 1;
        let width = self.config.output.max_concurrency.min(task_ids.len()).max(1);
        tracing::info!(tasks = task_ids.len(), concurrency = width, "starting download");

        let mut results: Vec<(usize, AggregatedResult)> = stream::iter(task_ids.iter().enumerate())
            .map(|(index, task_id)| async move {
                let element_prefix = if is_batch {
                    format!("{}_{}", prefix, index + 1)
                } else {
                    prefix.to_string()
                };
                let result = match self
                    .process_single_task(task_id, timeout, persist, &element_prefix)
                    .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(task_id = %task_id, error = %e, "failed to process task");
                        self.emit_event(Event::BatchElementFailed {
                            index,
                            error: e.to_string(),
                        });
                        AggregatedResult::failed(Some(task_id.as_str()), &e.to_string())
                    }
                };
                (index, result)
            })
            .buffer_unordered(width)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let merged = merge_results(results.into_iter().map(|(_, r)| r).collect());
        tracing::info!(tasks = task_ids.len(), "download completed");
        Ok(merged)
    }

    async fn process_single_task(
        &self,
        task_id: &TaskId,
        timeout: Duration,
        persist: bool,
        prefix: &str,
    ) -> Result<AggregatedResult> {
        self.monitor(task_id, timeout).await?;
        match self.fetch_outputs(task_id, persist, prefix).await? {
            FetchOutcome::Outputs(result) => Ok(result),
            FetchOutcome::NoOutput => Err(Error::TaskFailed {
                task_id: task_id.clone(),
                message: "task completed with no output".into(),
            }),
        }
    }
}

/// Fan-in of per-element results already in input order
///
/// Images and frames are concatenated, texts joined with `\n`, the first
/// real audio and first video win, and latents are concatenated along dim 0
/// when their shapes agree (first real latent otherwise).
pub(crate) fn merge_results(results: Vec<AggregatedResult>) -> AggregatedResult {
    let latent = {
        let latents: Vec<&Latent> = results.iter().map(|r| &r.latent).collect();
        Latent::concat(&latents).unwrap_or_else(|| {
            tracing::debug!("latent shapes differ across batch, keeping the first");
            latents
                .iter()
                .find(|l| !l.placeholder)
                .map(|l| (*l).clone())
                .unwrap_or_else(Latent::placeholder)
        })
    };
    let audio = results
        .iter()
        .map(|r| &r.audio)
        .find(|a| !a.placeholder)
        .cloned()
        .unwrap_or_else(Audio::placeholder);
    let video = results.iter().find_map(|r| r.video.clone());
    let text = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut images = Vec::new();
    let mut video_frames = Vec::new();
    for result in results {
        images.extend(result.images);
        video_frames.extend(result.video_frames);
    }

    AggregatedResult {
        images,
        video_frames,
        text,
        audio,
        video,
        latent,
    }
}
