//! Decoded artifact values and placeholders
//!
//! Every task result is reshaped into an [`AggregatedResult`] whose fields are
//! always populated: when the server produced no value for a category, a
//! well-formed placeholder takes its place so downstream consumers see a
//! uniform shape.
//!
//! - [`decode`]: bytes to typed values (image, WAV audio, safetensors latent, text)
//! - [`encode`]: typed values back to bytes for uploads and persistence
//! - [`MediaTool`]: optional external tooling for video frames and compressed audio

pub mod decode;
pub mod encode;
mod tool;

pub use tool::{FfmpegMediaTool, MediaCapabilities, MediaTool, NoOpMediaTool};

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Width of placeholder images
pub const PLACEHOLDER_WIDTH: u32 = 512;

/// Height of placeholder images
pub const PLACEHOLDER_HEIGHT: u32 = 128;

/// Grey level of placeholder images (50/255)
const PLACEHOLDER_GREY: f32 = 50.0 / 255.0;

/// Sample rate of the placeholder waveform
pub const PLACEHOLDER_SAMPLE_RATE: u32 = 44_100;

/// Shape of the placeholder latent `samples` tensor
pub const PLACEHOLDER_LATENT_SHAPE: [usize; 4] = [1, 4, 64, 64];

/// Name of the latent tensor the engine reads and writes
pub const LATENT_SAMPLES: &str = "samples";

/// RGB image with channel values in `0.0..=1.0`, row-major, interleaved
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height * 3` values
    pub data: Vec<f32>,
    /// Set on placeholders; describes why the image stands in for real output
    pub label: Option<String>,
}

impl Image {
    /// Build an image from raw 8-bit RGB pixels
    pub fn from_rgb8(width: u32, height: u32, pixels: &[u8]) -> Self {
        Self {
            width,
            height,
            data: pixels.iter().map(|&p| f32::from(p) / 255.0).collect(),
            label: None,
        }
    }

    /// A flat grey 512x128 image carrying `label`
    pub fn placeholder(label: impl Into<String>) -> Self {
        let len = (PLACEHOLDER_WIDTH * PLACEHOLDER_HEIGHT * 3) as usize;
        Self {
            width: PLACEHOLDER_WIDTH,
            height: PLACEHOLDER_HEIGHT,
            data: vec![PLACEHOLDER_GREY; len],
            label: Some(label.into()),
        }
    }

    /// Whether this image stands in for missing output
    pub fn is_placeholder(&self) -> bool {
        self.label.is_some()
    }

    /// `(height, width, channels)`
    pub fn shape(&self) -> (u32, u32, u32) {
        (self.height, self.width, 3)
    }

    /// Pixels quantized back to 8-bit RGB
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}

/// Single-channel mask, row-major
///
/// Values are either normalized (`0.0..=1.0`) or already on the 8-bit scale;
/// [`Mask::to_luma8`] tells them apart by the maximum value.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height` values
    pub data: Vec<f32>,
}

impl Mask {
    /// Build a mask from raw values
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Pixels as 8-bit grey levels
    ///
    /// A mask whose maximum is at most 1.0 is scaled by 255; anything else is
    /// taken as grey levels and clamped.
    pub fn to_luma8(&self) -> Vec<u8> {
        let normalized = self.data.iter().all(|&v| v <= 1.0);
        self.data
            .iter()
            .map(|&v| {
                let level = if normalized { v * 255.0 } else { v };
                level.clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

/// Multi-channel waveform with samples in `-1.0..=1.0`
#[derive(Clone, Debug, PartialEq)]
pub struct Audio {
    /// Samples per second
    pub sample_rate: u32,
    /// One sample vector per channel, all the same length
    pub channels: Vec<Vec<f32>>,
    /// Set on the silent placeholder
    pub placeholder: bool,
}

impl Audio {
    /// One second of stereo silence at 44.1 kHz
    pub fn placeholder() -> Self {
        let silence = vec![0.0; PLACEHOLDER_SAMPLE_RATE as usize];
        Self {
            sample_rate: PLACEHOLDER_SAMPLE_RATE,
            channels: vec![silence.clone(), silence],
            placeholder: true,
        }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Dense f32 tensor
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Dimensions, outermost first
    pub shape: Vec<usize>,
    /// Row-major values; `data.len()` equals the product of `shape`
    pub data: Vec<f32>,
}

impl Tensor {
    /// A tensor of zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// Concatenate along the first dimension; `None` unless trailing dimensions agree
    pub fn concat_dim0(tensors: &[&Tensor]) -> Option<Tensor> {
        let first = tensors.first()?;
        let tail = first.shape.get(1..)?;
        if tensors
            .iter()
            .any(|t| t.shape.is_empty() || t.shape.get(1..) != Some(tail))
        {
            return None;
        }
        let mut shape = first.shape.clone();
        shape[0] = tensors.iter().map(|t| t.shape[0]).sum();
        let data = tensors.iter().flat_map(|t| t.data.iter().copied()).collect();
        Some(Tensor { shape, data })
    }
}

/// Named tensors read from or written to a safetensors file
#[derive(Clone, Debug, PartialEq)]
pub struct Latent {
    /// Tensors by name; the engine uses [`LATENT_SAMPLES`]
    pub tensors: BTreeMap<String, Tensor>,
    /// Set on the zero placeholder
    pub placeholder: bool,
}

impl Latent {
    /// Wrap a single `samples` tensor
    pub fn from_samples(samples: Tensor) -> Self {
        let mut tensors = BTreeMap::new();
        tensors.insert(LATENT_SAMPLES.to_string(), samples);
        Self {
            tensors,
            placeholder: false,
        }
    }

    /// `{"samples": zeros[1, 4, 64, 64]}`
    pub fn placeholder() -> Self {
        Self {
            placeholder: true,
            ..Self::from_samples(Tensor::zeros(&PLACEHOLDER_LATENT_SHAPE))
        }
    }

    /// The `samples` tensor, if present
    pub fn samples(&self) -> Option<&Tensor> {
        self.tensors.get(LATENT_SAMPLES)
    }

    /// Concatenate latents tensor-by-tensor along dim 0
    ///
    /// Returns `None` when the latents do not share the same tensor names or
    /// any pair of tensors disagrees on trailing dimensions.
    pub fn concat(latents: &[&Latent]) -> Option<Latent> {
        let first = latents.first()?;
        let mut tensors = BTreeMap::new();
        for name in first.tensors.keys() {
            let parts: Vec<&Tensor> = latents
                .iter()
                .map(|l| l.tensors.get(name))
                .collect::<Option<_>>()?;
            tensors.insert(name.clone(), Tensor::concat_dim0(&parts)?);
        }
        if latents.iter().any(|l| l.tensors.len() != first.tensors.len()) {
            return None;
        }
        Some(Latent {
            tensors,
            placeholder: latents.iter().all(|l| l.placeholder),
        })
    }
}

/// Reference to a produced video file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoRef {
    /// Remote URL
    pub url: String,
    /// File type as reported by the server
    pub extension: String,
    /// Local copy, when persisted
    pub local_path: Option<PathBuf>,
}

/// A single downloaded and decoded artifact
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedArtifact {
    /// Decoded image
    Image(Image),
    /// Video reference plus any extracted frames
    Video {
        /// Frames in playback order (empty without frame extraction)
        frames: Vec<Image>,
        /// Where the video lives
        video: VideoRef,
    },
    /// Decoded waveform
    Audio(Audio),
    /// UTF-8 text
    Text(String),
    /// Decoded safetensors latent
    Latent(Latent),
}

/// Type-stable outputs of one task (or one batch)
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedResult {
    /// Images in manifest order; a placeholder when none were produced
    pub images: Vec<Image>,
    /// Frames of every video in manifest order; a placeholder when none
    pub video_frames: Vec<Image>,
    /// Text output; empty when none
    pub text: String,
    /// First audio output or silence
    pub audio: Audio,
    /// First video output
    pub video: Option<VideoRef>,
    /// First latent output or zeros
    pub latent: Latent,
}

impl AggregatedResult {
    /// A result made entirely of placeholders
    pub fn placeholder(image_label: &str, frames_label: &str) -> Self {
        Self {
            images: vec![Image::placeholder(image_label)],
            video_frames: vec![Image::placeholder(frames_label)],
            text: String::new(),
            audio: Audio::placeholder(),
            video: None,
            latent: Latent::placeholder(),
        }
    }

    /// Placeholders for a task that finished without producing output
    pub fn no_output() -> Self {
        Self::placeholder("No image output", "No video output")
    }

    /// Placeholders standing in for a failed batch element
    pub fn failed(task_id: Option<&str>, error: &str) -> Self {
        let label = match task_id {
            Some(id) => format!("Failed: {}", id),
            None => "Failed".to_string(),
        };
        Self {
            text: format!("ERROR: {}", error),
            ..Self::placeholder(&label, "Failed")
        }
    }

    /// Select one image from the batch (0-based)
    pub fn select_image(&self, index: usize) -> Result<&Image> {
        self.images.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.images.len(),
        })
    }
}
