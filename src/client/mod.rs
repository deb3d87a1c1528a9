//! RunningHub client split into focused submodules.
//!
//! The `RunningHubClient` struct and its methods are organized by concern:
//! - [`lifecycle`] - Submission, monitoring and the execute pipeline
//! - [`outputs`] - Manifest retrieval, concurrent downloads and aggregation
//! - [`persist`] - Deterministic local file naming and writes
//! - [`batch`] - Concurrent fan-out/fan-in over many tasks
//! - [`manage`] - Out-of-band status queries and cancellation
//! - [`upload`] - Input file uploads

mod batch;
mod lifecycle;
mod manage;
mod outputs;
mod persist;
mod upload;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use lifecycle::{Completion, ExecuteOutput};
pub use manage::TaskAction;
pub use outputs::FetchOutcome;
pub use persist::OutputWriter;
pub use upload::{MAX_IMAGE_UPLOAD_BYTES, MaskUpload};

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::media::{FfmpegMediaTool, MediaCapabilities, MediaTool, NoOpMediaTool};
use crate::transport::{HttpTransport, Transport};
use crate::types::Event;

/// Main client instance (cloneable - all fields are Arc-wrapped)
///
/// Configuration is read-only for the lifetime of the client and shared by
/// every concurrent worker.
#[derive(Clone)]
pub struct RunningHubClient {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// API access
    pub(crate) transport: Arc<dyn Transport>,
    /// Video frame extraction and audio transcoding
    pub(crate) media: Arc<dyn MediaTool>,
    /// Media capabilities, resolved once at construction
    pub(crate) capabilities: MediaCapabilities,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl RunningHubClient {
    /// Create a client that talks to the API over HTTP
    ///
    /// The configuration is validated, and ffmpeg is looked up once: an
    /// explicit `output.ffmpeg_path` wins, then PATH when
    /// `output.search_path` is set. Without ffmpeg, video frames and non-WAV
    /// audio are skipped.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use runninghub_client::{Config, RunningHubClient};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = RunningHubClient::new(Config::new("api-key", "1900000000000000001"))?;
    /// let caps = client.capabilities();
    /// println!("video frames available: {}", caps.can_extract_frames);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        let media = resolve_media_tool(&config);
        Self::with_parts(config, Arc::new(HttpTransport::new()?), media)
    }

    /// Create a client from explicit components
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        media: Arc<dyn MediaTool>,
    ) -> Result<Self> {
        config.validate()?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let capabilities = media.capabilities();

        tracing::info!(
            transport = transport.name(),
            media_tool = media.name(),
            video_frames = capabilities.can_extract_frames,
            compressed_audio = capabilities.can_transcode_audio,
            "RunningHub client ready"
        );

        Ok(Self {
            config: Arc::new(config),
            transport,
            media,
            capabilities,
            event_tx,
        })
    }

    /// Subscribe to lifecycle events
    ///
    /// Multiple subscribers are supported; each receives every event. Events
    /// never influence control flow, so a slow or absent subscriber is harmless.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Media capabilities resolved at construction
    pub fn capabilities(&self) -> MediaCapabilities {
        self.capabilities
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

fn resolve_media_tool(config: &Config) -> Arc<dyn MediaTool> {
    if let Some(path) = &config.output.ffmpeg_path {
        return Arc::new(FfmpegMediaTool::new(path.clone()));
    }
    if config.output.search_path {
        if let Some(tool) = FfmpegMediaTool::from_path() {
            return Arc::new(tool);
        }
        tracing::warn!("ffmpeg not found in PATH, video frames and non-WAV audio will be skipped");
    }
    Arc::new(NoOpMediaTool)
}
