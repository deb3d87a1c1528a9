//! Configuration types for runninghub-client

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::ArtifactKind;

/// Default RunningHub API endpoint
pub const DEFAULT_BASE_URL: &str = "https://www.runninghub.cn";

/// Upper bound on concurrent downloads, monitors and submissions
pub const MAX_CONCURRENCY: usize = 10;

/// Client configuration
///
/// Built once by the caller and shared read-only (behind an `Arc`) by every
/// component of the client. Nothing in the library mutates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// RunningHub API key
    pub api_key: String,

    /// API base URL (default: "https://www.runninghub.cn")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Workflow id, or AI app id when `is_ai_app` is set
    #[serde(default)]
    pub workflow_or_app_id: String,

    /// Submit through the AI app endpoint instead of the workflow endpoint
    #[serde(default)]
    pub is_ai_app: bool,

    /// Retry policy for submissions and uploads
    #[serde(default)]
    pub retry: RetryConfig,

    /// Status polling cadence
    #[serde(default)]
    pub polling: PollingConfig,

    /// Per-request timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Local persistence and download concurrency
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            workflow_or_app_id: String::new(),
            is_ai_app: false,
            retry: RetryConfig::default(),
            polling: PollingConfig::default(),
            timeouts: TimeoutConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Create a workflow configuration with default ambient settings
    pub fn new(api_key: impl Into<String>, workflow_or_app_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            workflow_or_app_id: workflow_or_app_id.into(),
            ..Default::default()
        }
    }

    /// Check the fields every API call needs (api_key, base_url)
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::config("api_key is required", "api_key"));
        }
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            Error::config(format!("base_url '{}' is invalid: {}", self.base_url, e), "base_url")
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                format!("base_url must use http or https, got '{}'", url.scheme()),
                "base_url",
            ));
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.output.max_concurrency) {
            return Err(Error::config(
                format!(
                    "max_concurrency must be between 1 and {}, got {}",
                    MAX_CONCURRENCY, self.output.max_concurrency
                ),
                "output.max_concurrency",
            ));
        }
        Ok(())
    }

    /// Check the fields needed to submit a task, on top of [`Config::validate`]
    pub fn validate_for_submit(&self) -> Result<()> {
        self.validate()?;
        if self.workflow_or_app_id.trim().is_empty() {
            return Err(Error::config(
                "workflow_or_app_id is required",
                "workflow_or_app_id",
            ));
        }
        if self.is_ai_app && self.workflow_or_app_id.trim().parse::<i64>().is_err() {
            return Err(Error::config(
                format!(
                    "AI app id must be numeric, got '{}'",
                    self.workflow_or_app_id
                ),
                "workflow_or_app_id",
            ));
        }
        Ok(())
    }

    /// API base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Merge explicit values with an optional JSON config file
    ///
    /// Non-blank explicit values win; blank or missing ones fall back to the
    /// file, and `base_url` finally falls back to [`DEFAULT_BASE_URL`]. A
    /// missing file is not an error. The result is validated.
    pub fn resolve(overrides: ConfigOverrides, file: Option<&Path>) -> Result<Self> {
        let file_config = match file {
            Some(path) => ConfigFile::load(path)?,
            None => None,
        }
        .unwrap_or_default();

        let pick = |explicit: Option<String>, from_file: Option<String>| {
            non_blank(explicit).or_else(|| non_blank(from_file))
        };

        let api_key_from_file = overrides
            .api_key
            .as_deref()
            .is_none_or(|k| k.trim().is_empty());
        let config = Config {
            api_key: pick(overrides.api_key, file_config.api_key).unwrap_or_default(),
            base_url: pick(overrides.base_url, file_config.base_url)
                .unwrap_or_else(default_base_url),
            workflow_or_app_id: pick(overrides.workflow_or_app_id, file_config.workflow_or_app_id)
                .unwrap_or_default(),
            is_ai_app: overrides
                .is_ai_app
                .or(file_config.is_ai_app)
                .unwrap_or(false),
            ..Default::default()
        };

        config.validate_for_submit()?;
        tracing::info!(
            kind = if config.is_ai_app { "ai_app" } else { "workflow" },
            id = %config.workflow_or_app_id,
            base_url = %config.base_url,
            api_key_source = if api_key_from_file { "config file" } else { "explicit" },
            "RunningHub config resolved"
        );
        Ok(config)
    }

    /// The output directory, falling back to `./output`
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("output"))
    }
}

/// Explicit values supplied by the caller for [`Config::resolve`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// API key
    pub api_key: Option<String>,
    /// Base URL
    pub base_url: Option<String>,
    /// Workflow or AI app id
    pub workflow_or_app_id: Option<String>,
    /// AI app flag
    pub is_ai_app: Option<bool>,
}

/// On-disk `config.json` shape; every field optional
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// API key
    pub api_key: Option<String>,
    /// Base URL
    pub base_url: Option<String>,
    /// Workflow or AI app id
    pub workflow_or_app_id: Option<String>,
    /// AI app flag
    pub is_ai_app: Option<bool>,
}

impl ConfigFile {
    /// Load a config file, returning `None` when it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let parsed = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(Some(parsed))
    }
}

/// Retry configuration with exponential backoff
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Status polling cadence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Time between status polls while monitoring (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Interval for "still running" log lines (default: 15 seconds)
    #[serde(default = "default_heartbeat_interval", with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Manifest polls before giving up on outputs (default: 30)
    #[serde(default = "default_output_fetch_attempts")]
    pub output_fetch_attempts: u32,

    /// Time between manifest polls (default: 2 seconds)
    #[serde(default = "default_output_fetch_interval", with = "duration_serde")]
    pub output_fetch_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            heartbeat_interval: default_heartbeat_interval(),
            output_fetch_attempts: default_output_fetch_attempts(),
            output_fetch_interval: default_output_fetch_interval(),
        }
    }
}

/// Per-request timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Task submission (default: 30 seconds)
    #[serde(default = "default_submit_timeout", with = "duration_serde")]
    pub submit: Duration,

    /// Status poll and cancel requests (default: 20 seconds)
    #[serde(default = "default_poll_timeout", with = "duration_serde")]
    pub poll: Duration,

    /// File uploads (default: 60 seconds)
    #[serde(default = "default_upload_timeout", with = "duration_serde")]
    pub upload: Duration,

    /// Image and text downloads (default: 30 seconds)
    #[serde(default = "default_small_download_timeout", with = "duration_serde")]
    pub download_small: Duration,

    /// Audio and latent downloads (default: 60 seconds)
    #[serde(default = "default_media_download_timeout", with = "duration_serde")]
    pub download_media: Duration,

    /// Video downloads (default: 120 seconds)
    #[serde(default = "default_video_download_timeout", with = "duration_serde")]
    pub download_video: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            submit: default_submit_timeout(),
            poll: default_poll_timeout(),
            upload: default_upload_timeout(),
            download_small: default_small_download_timeout(),
            download_media: default_media_download_timeout(),
            download_video: default_video_download_timeout(),
        }
    }
}

impl TimeoutConfig {
    /// Download timeout scaled by artifact kind
    pub fn download_timeout(&self, kind: ArtifactKind) -> Duration {
        match kind {
            ArtifactKind::Image | ArtifactKind::Text | ArtifactKind::Unknown => self.download_small,
            ArtifactKind::Audio | ArtifactKind::Latent => self.download_media,
            ArtifactKind::Video => self.download_video,
        }
    }
}

/// Local persistence and concurrency settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where persisted artifacts are written (default: "./output")
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Width of artifact-download and batch worker pools (default: 10)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Search PATH for ffmpeg to enable video frames and non-WAV audio (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Explicit ffmpeg binary, overrides PATH search
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_concurrency: default_max_concurrency(),
            search_path: true,
            ffmpeg_path: None,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_output_fetch_attempts() -> u32 {
    30
}

fn default_output_fetch_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_submit_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_small_download_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_media_download_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_video_download_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_concurrency() -> usize {
    MAX_CONCURRENCY
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
