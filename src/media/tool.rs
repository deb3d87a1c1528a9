//! External media tooling for video frames and compressed audio

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::Image;
use super::decode::decode_image;
use crate::error::{Error, Result};

/// What a [`MediaTool`] can do
///
/// Resolved once when the client is built and consulted by the output
/// materializer; formats whose capability is missing are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaCapabilities {
    /// Can split a video into frames
    pub can_extract_frames: bool,
    /// Can turn mp3/flac/ogg into WAV
    pub can_transcode_audio: bool,
}

/// Trait for media operations that need an external decoder
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Decode every frame of a video, in playback order
    ///
    /// # Errors
    ///
    /// Returns an error if the tool fails or the operation is not supported
    async fn extract_frames(&self, video: &[u8], extension: &str) -> Result<Vec<Image>>;

    /// Convert a compressed audio file into WAV bytes
    async fn transcode_to_wav(&self, audio: &[u8], extension: &str) -> Result<Vec<u8>>;

    /// Query capabilities of this tool
    fn capabilities(&self) -> MediaCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// [`MediaTool`] backed by an `ffmpeg` binary
pub struct FfmpegMediaTool {
    binary_path: PathBuf,
}

impl FfmpegMediaTool {
    /// Use an explicit ffmpeg binary
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    async fn run(&self, args: &[&OsStr]) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(args)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalTool(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn input_name(extension: &str) -> String {
    let ext: String = extension
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if ext.is_empty() {
        "input".to_string()
    } else {
        format!("input.{}", ext)
    }
}

async fn sorted_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut frames = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("frame_") && n.ends_with(".png"));
        if is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

#[async_trait]
impl MediaTool for FfmpegMediaTool {
    async fn extract_frames(&self, video: &[u8], extension: &str) -> Result<Vec<Image>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(input_name(extension));
        tokio::fs::write(&input, video).await?;

        let pattern = dir.path().join("frame_%06d.png");
        self.run(&[
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-vsync"),
            OsStr::new("0"),
            pattern.as_os_str(),
        ])
        .await?;

        let mut images = Vec::new();
        for path in sorted_frames(dir.path()).await? {
            let bytes = tokio::fs::read(&path).await?;
            let image = decode_image(&bytes)?;
            images.push(image);
        }
        tracing::debug!(frames = images.len(), "extracted video frames");
        Ok(images)
    }

    async fn transcode_to_wav(&self, audio: &[u8], extension: &str) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(input_name(extension));
        let output = dir.path().join("output.wav");
        tokio::fs::write(&input, audio).await?;

        self.run(&[
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-f"),
            OsStr::new("wav"),
            OsStr::new("-acodec"),
            OsStr::new("pcm_f32le"),
            output.as_os_str(),
        ])
        .await?;

        Ok(tokio::fs::read(&output).await?)
    }

    fn capabilities(&self) -> MediaCapabilities {
        MediaCapabilities {
            can_extract_frames: true,
            can_transcode_audio: true,
        }
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// [`MediaTool`] used when no external decoder is available
///
/// Every operation returns [`Error::NotSupported`]; WAV audio, images, text
/// and latents are still decoded in-process.
pub struct NoOpMediaTool;

#[async_trait]
impl MediaTool for NoOpMediaTool {
    async fn extract_frames(&self, _video: &[u8], _extension: &str) -> Result<Vec<Image>> {
        Err(Error::NotSupported(
            "video frame extraction requires ffmpeg. \
             Configure ffmpeg_path in config or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    async fn transcode_to_wav(&self, _audio: &[u8], extension: &str) -> Result<Vec<u8>> {
        Err(Error::NotSupported(format!(
            "decoding {} audio requires ffmpeg. \
             Configure ffmpeg_path in config or ensure ffmpeg is in PATH.",
            extension
        )))
    }

    fn capabilities(&self) -> MediaCapabilities {
        MediaCapabilities {
            can_extract_frames: false,
            can_transcode_audio: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
