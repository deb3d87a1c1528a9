//! Deterministic local file naming and writes

use std::path::{Path, PathBuf};

use crate::error::{DecodeError, Result};
use crate::media::Audio;
use crate::media::encode::encode_wav;

/// Writes the accepted artifacts of one fetch into the output directory
///
/// Names share one timestamp taken at creation:
///
/// | output | name |
/// |---|---|
/// | image | `{prefix}_{YYYYMMDD_HHMMSS}_{seq:03}.{ext}` |
/// | video | `{prefix}_{YYYYMMDD_HHMMSS}_video_{seq:03}.{ext}` |
/// | text | `{prefix}_{YYYYMMDD_HHMMSS}_text.txt` |
/// | audio | `{prefix}_{YYYYMMDD_HHMMSS}_audio.wav` |
/// | latent | `{prefix}_{YYYYMMDD_HHMMSS}_latent.safetensors` |
///
/// Counters start at 1 and are owned by the writer, so two writers with
/// distinct prefixes never produce the same path.
#[derive(Debug)]
pub struct OutputWriter {
    dir: PathBuf,
    prefix: String,
    timestamp: String,
    image_seq: u32,
    video_seq: u32,
}

impl OutputWriter {
    /// Create the output directory if needed and stamp the current local time
    pub async fn create(dir: PathBuf, prefix: &str) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        Ok(Self::with_timestamp(dir, prefix, timestamp))
    }

    /// Build a writer with a fixed timestamp; the directory is not created
    pub fn with_timestamp(dir: PathBuf, prefix: &str, timestamp: impl Into<String>) -> Self {
        Self {
            dir,
            prefix: prefix.to_string(),
            timestamp: timestamp.into(),
            image_seq: 0,
            video_seq: 0,
        }
    }

    /// Destination directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve the next image name
    pub fn next_image_name(&mut self, extension: &str) -> String {
        self.image_seq += 1;
        format!(
            "{}_{}_{:03}.{}",
            self.prefix, self.timestamp, self.image_seq, extension
        )
    }

    /// Reserve the next video name
    pub fn next_video_name(&mut self, extension: &str) -> String {
        self.video_seq += 1;
        format!(
            "{}_{}_video_{:03}.{}",
            self.prefix, self.timestamp, self.video_seq, extension
        )
    }

    /// Name of the text output
    pub fn text_name(&self) -> String {
        format!("{}_{}_text.txt", self.prefix, self.timestamp)
    }

    /// Name of the audio output
    pub fn audio_name(&self) -> String {
        format!("{}_{}_audio.wav", self.prefix, self.timestamp)
    }

    /// Name of the latent output
    pub fn latent_name(&self) -> String {
        format!("{}_{}_latent.safetensors", self.prefix, self.timestamp)
    }

    /// Write the original image bytes
    pub async fn write_image(
        &mut self,
        bytes: &[u8],
        extension: &str,
    ) -> std::result::Result<PathBuf, DecodeError> {
        let name = self.next_image_name(extension);
        self.write(&name, bytes).await
    }

    /// Write the original video bytes
    pub async fn write_video(
        &mut self,
        bytes: &[u8],
        extension: &str,
    ) -> std::result::Result<PathBuf, DecodeError> {
        let name = self.next_video_name(extension);
        self.write(&name, bytes).await
    }

    /// Write text as UTF-8
    pub async fn write_text(&self, text: &str) -> std::result::Result<PathBuf, DecodeError> {
        self.write(&self.text_name(), text.as_bytes()).await
    }

    /// Write audio as 32-bit float WAV
    pub async fn write_audio(&self, audio: &Audio) -> std::result::Result<PathBuf, DecodeError> {
        let bytes = encode_wav(audio)?;
        self.write(&self.audio_name(), &bytes).await
    }

    /// Write the original safetensors bytes
    pub async fn write_latent(&self, bytes: &[u8]) -> std::result::Result<PathBuf, DecodeError> {
        self.write(&self.latent_name(), bytes).await
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> std::result::Result<PathBuf, DecodeError> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| DecodeError::Persist {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_enumerated_per_kind() {
        let mut writer = OutputWriter::with_timestamp(PathBuf::from("out"), "RH", "20240102_030405");
        assert_eq!(writer.next_image_name("png"), "RH_20240102_030405_001.png");
        assert_eq!(writer.next_image_name("jpg"), "RH_20240102_030405_002.jpg");
        assert_eq!(writer.next_video_name("mp4"), "RH_20240102_030405_video_001.mp4");
        assert_eq!(writer.text_name(), "RH_20240102_030405_text.txt");
        assert_eq!(writer.audio_name(), "RH_20240102_030405_audio.wav");
        assert_eq!(writer.latent_name(), "RH_20240102_030405_latent.safetensors");
    }

    #[tokio::test]
    async fn create_makes_directory_and_stamps_time() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("output");
        let mut writer = OutputWriter::create(dir.clone(), "RH_DL_2").await.unwrap();
        assert!(dir.is_dir());

        let name = writer.next_image_name("png");
        // RH_DL_2_YYYYMMDD_HHMMSS_001.png
        let stamp = name
            .strip_prefix("RH_DL_2_")
            .and_then(|rest| rest.strip_suffix("_001.png"))
            .unwrap();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
    }

    #[tokio::test]
    async fn write_failure_is_a_persist_error() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = OutputWriter::with_timestamp(tmp.path().join("missing"), "RH", "t");
        let result = writer.write_text("hello").await;
        assert!(matches!(result, Err(DecodeError::Persist { .. })));
    }
}
