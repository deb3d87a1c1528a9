//! Output materialization: manifest retrieval, concurrent downloads and aggregation

use futures::stream::{self, StreamExt};

use super::RunningHubClient;
use super::lifecycle::Completion;
use super::persist::OutputWriter;
use crate::error::{DecodeError, Error, Result};
use crate::media::decode::{decode_image, decode_latent, decode_text, decode_wav};
use crate::media::{AggregatedResult, Audio, DecodedArtifact, Image, Latent, VideoRef};
use crate::types::{Artifact, ArtifactKind, Event, StatusResult, TaskId};

/// Outcome of [`RunningHubClient::fetch_outputs`]
#[derive(Clone, Debug)]
pub enum FetchOutcome {
    /// Materialized outputs
    Outputs(AggregatedResult),
    /// The task finished without producing anything
    NoOutput,
}

impl FetchOutcome {
    /// The outputs, or an all-placeholder result for [`FetchOutcome::NoOutput`]
    pub fn into_result(self) -> AggregatedResult {
        match self {
            FetchOutcome::Outputs(result) => result,
            FetchOutcome::NoOutput => AggregatedResult::no_output(),
        }
    }
}

/// A decoded artifact together with the bytes it came from
struct Downloaded {
    decoded: DecodedArtifact,
    raw: Vec<u8>,
}

impl RunningHubClient {
    /// Retrieve, download and decode every output of a completed task
    ///
    /// The manifest is polled up to `polling.output_fetch_attempts` times
    /// since outputs can lag behind the completion status. Artifacts are then
    /// downloaded concurrently; any artifact that fails to download or decode
    /// is logged and skipped. With `persist`, accepted artifacts are written
    /// to the output directory under names derived from `prefix`.
    ///
    /// # Errors
    ///
    /// - [`Error::TaskFailed`] if the server reports the task as failed
    /// - [`Error::OutputsUnavailable`] if the manifest never appears
    pub async fn fetch_outputs(
        &self,
        task_id: &TaskId,
        persist: bool,
        prefix: &str,
    ) -> Result<FetchOutcome> {
        match self.fetch_manifest(task_id).await? {
            Completion::Artifacts(artifacts) => Ok(FetchOutcome::Outputs(
                self.materialize(task_id, artifacts, persist, prefix).await?,
            )),
            Completion::NoOutput => Ok(FetchOutcome::NoOutput),
        }
    }

    async fn fetch_manifest(&self, task_id: &TaskId) -> Result<Completion> {
        let attempts = self.config.polling.output_fetch_attempts.max(1);
        for attempt in 1..=attempts {
            match self.check_status(task_id).await {
                StatusResult::Artifacts(artifacts) => return Ok(Completion::Artifacts(artifacts)),
                StatusResult::CompletedNoOutput => {
                    tracing::info!(task_id = %task_id, "task completed but produced no output");
                    return Ok(Completion::NoOutput);
                }
                StatusResult::Error { message } => {
                    return Err(Error::TaskFailed {
                        task_id: task_id.clone(),
                        message,
                    });
                }
                StatusResult::Queued | StatusResult::Running => {
                    tracing::debug!(task_id = %task_id, attempt, "outputs not ready yet");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.polling.output_fetch_interval).await;
            }
        }
        Err(Error::OutputsUnavailable {
            task_id: task_id.clone(),
            attempts,
        })
    }

    /// Download, decode, aggregate and optionally persist a manifest
    pub(crate) async fn materialize(
        &self,
        task_id: &TaskId,
        artifacts: Vec<Artifact>,
        persist: bool,
        prefix: &str,
    ) -> Result<AggregatedResult> {
        let width = self
            .config
            .output
            .max_concurrency
            .min(artifacts.len())
            .max(1);
        tracing::info!(
            task_id = %task_id,
            artifacts = artifacts.len(),
            concurrency = width,
            "processing output files"
        );

        // Workers only return messages; aggregation below owns all state
        let mut accepted: Vec<(usize, Artifact, Downloaded)> = Vec::with_capacity(artifacts.len());
        let results: Vec<_> = stream::iter(artifacts.into_iter().enumerate())
            .map(|(index, artifact)| async move {
                let outcome = self.download_artifact(&artifact).await;
                (index, artifact, outcome)
            })
            .buffer_unordered(width)
            .collect()
            .await;

        for (index, artifact, outcome) in results {
            match outcome {
                Ok(downloaded) => accepted.push((index, artifact, downloaded)),
                Err(e) => {
                    tracing::warn!(
                        task_id = %task_id,
                        url = %artifact.url,
                        kind = %artifact.kind,
                        error = %e,
                        "skipping artifact"
                    );
                    self.emit_event(Event::ArtifactSkipped {
                        task_id: task_id.clone(),
                        url: artifact.url,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Stable order: by kind name, then manifest position
        accepted.sort_by(|a, b| (a.1.kind.as_str(), a.0).cmp(&(b.1.kind.as_str(), b.0)));

        let mut writer = if persist {
            let writer = OutputWriter::create(self.config.output_dir(), prefix).await?;
            tracing::info!(dir = %writer.dir().display(), "saving outputs");
            Some(writer)
        } else {
            None
        };

        let mut images: Vec<Image> = Vec::new();
        let mut video_frames: Vec<Image> = Vec::new();
        let mut text: Option<String> = None;
        let mut audio: Option<Audio> = None;
        let mut video: Option<VideoRef> = None;
        let mut latent: Option<Latent> = None;

        for (_, artifact, Downloaded { decoded, raw }) in accepted {
            match decoded {
                DecodedArtifact::Image(image) => {
                    if let Some(w) = writer.as_mut() {
                        let written = w.write_image(&raw, &artifact.extension).await;
                        self.record_persist(task_id, written);
                    }
                    images.push(image);
                }
                DecodedArtifact::Video {
                    frames,
                    video: mut video_ref,
                } => {
                    if let Some(w) = writer.as_mut() {
                        let written = w.write_video(&raw, &artifact.extension).await;
                        video_ref.local_path = self.record_persist(task_id, written);
                    }
                    video_frames.extend(frames);
                    if video.is_none() {
                        video = Some(video_ref);
                    }
                }
                DecodedArtifact::Text(content) if text.is_none() => {
                    if let Some(w) = writer.as_ref() {
                        let written = w.write_text(&content).await;
                        self.record_persist(task_id, written);
                    }
                    text = Some(content);
                }
                DecodedArtifact::Audio(waveform) if audio.is_none() => {
                    if let Some(w) = writer.as_ref() {
                        let written = w.write_audio(&waveform).await;
                        self.record_persist(task_id, written);
                    }
                    audio = Some(waveform);
                }
                DecodedArtifact::Latent(value) if latent.is_none() => {
                    if let Some(w) = writer.as_ref() {
                        let written = w.write_latent(&raw).await;
                        self.record_persist(task_id, written);
                    }
                    latent = Some(value);
                }
                _ => {
                    tracing::debug!(
                        task_id = %task_id,
                        kind = %artifact.kind,
                        url = %artifact.url,
                        "ignoring additional output of an already-filled category"
                    );
                }
            }
        }

        if images.is_empty() {
            images.push(Image::placeholder("No images"));
        }
        if video_frames.is_empty() {
            video_frames.push(Image::placeholder("No video frames"));
        }

        Ok(AggregatedResult {
            images,
            video_frames,
            text: text.unwrap_or_default(),
            audio: audio.unwrap_or_else(Audio::placeholder),
            video,
            latent: latent.unwrap_or_else(Latent::placeholder),
        })
    }

    /// Download and decode one artifact
    ///
    /// Capability checks run before the download so unusable artifacts cost
    /// no bandwidth.
    async fn download_artifact(
        &self,
        artifact: &Artifact,
    ) -> std::result::Result<Downloaded, DecodeError> {
        let extension = artifact.extension.as_str();
        let needs_transcode = artifact.kind == ArtifactKind::Audio && extension != "wav";

        if artifact.kind == ArtifactKind::Unknown {
            return Err(DecodeError::Unsupported {
                extension: extension.to_string(),
            });
        }
        if needs_transcode && !self.capabilities.can_transcode_audio {
            return Err(DecodeError::MissingCapability {
                kind: artifact.kind,
                extension: extension.to_string(),
                capability: "audio transcoding",
            });
        }

        let raw = self
            .transport
            .download(&self.config, &artifact.url, artifact.kind)
            .await
            .map_err(|e| DecodeError::Download {
                url: artifact.url.clone(),
                source: Box::new(e),
            })?;

        let decoded = match artifact.kind {
            ArtifactKind::Image => DecodedArtifact::Image(decode_image(&raw)?),
            ArtifactKind::Text => DecodedArtifact::Text(decode_text(raw.clone())?),
            ArtifactKind::Latent => DecodedArtifact::Latent(decode_latent(&raw)?),
            ArtifactKind::Audio if needs_transcode => {
                let wav = self
                    .media
                    .transcode_to_wav(&raw, extension)
                    .await
                    .map_err(|e| DecodeError::MediaTool(e.to_string()))?;
                DecodedArtifact::Audio(decode_wav(&wav)?)
            }
            ArtifactKind::Audio => DecodedArtifact::Audio(decode_wav(&raw)?),
            ArtifactKind::Video => DecodedArtifact::Video {
                frames: self.video_frames(artifact, &raw).await,
                video: VideoRef {
                    url: artifact.url.clone(),
                    extension: extension.to_string(),
                    local_path: None,
                },
            },
            ArtifactKind::Unknown => {
                return Err(DecodeError::Unsupported {
                    extension: extension.to_string(),
                });
            }
        };

        Ok(Downloaded { decoded, raw })
    }

    /// Frames of a video; empty when extraction is unavailable or fails
    async fn video_frames(&self, artifact: &Artifact, raw: &[u8]) -> Vec<Image> {
        if !self.capabilities.can_extract_frames {
            tracing::debug!(url = %artifact.url, "frame extraction unavailable, keeping video reference only");
            return Vec::new();
        }
        match self.media.extract_frames(raw, &artifact.extension).await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(url = %artifact.url, error = %e, "failed to extract video frames");
                Vec::new()
            }
        }
    }

    fn record_persist(
        &self,
        task_id: &TaskId,
        written: std::result::Result<std::path::PathBuf, DecodeError>,
    ) -> Option<std::path::PathBuf> {
        match written {
            Ok(path) => {
                tracing::info!(task_id = %task_id, path = %path.display(), "saved output");
                self.emit_event(Event::ArtifactPersisted {
                    task_id: task_id.clone(),
                    path: path.clone(),
                });
                Some(path)
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "failed to save output");
                None
            }
        }
    }
}
