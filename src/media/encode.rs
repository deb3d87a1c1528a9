//! Encoders used for uploads and local persistence

use std::io::Cursor;

use safetensors::Dtype;
use safetensors::tensor::TensorView;

use super::{Audio, Image, Latent, Mask};
use crate::error::DecodeError;

/// Encode an image as PNG
pub fn encode_png(image: &Image) -> Result<Vec<u8>, DecodeError> {
    let rgb = image::RgbImage::from_raw(image.width, image.height, image.to_rgb8()).ok_or_else(
        || DecodeError::Unsupported {
            extension: format!(
                "png ({}x{} image with {} values)",
                image.width,
                image.height,
                image.data.len()
            ),
        },
    )?;
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(rgb).write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

/// Encode a mask as a single-channel grayscale PNG
pub fn encode_mask_png(mask: &Mask) -> Result<Vec<u8>, DecodeError> {
    let luma = image::GrayImage::from_raw(mask.width, mask.height, mask.to_luma8()).ok_or_else(
        || DecodeError::Unsupported {
            extension: format!(
                "png ({}x{} mask with {} values)",
                mask.width,
                mask.height,
                mask.data.len()
            ),
        },
    )?;
    let mut out = Vec::new();
    image::DynamicImage::ImageLuma8(luma)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

/// Encode audio as 32-bit float WAV
pub fn encode_wav(audio: &Audio) -> Result<Vec<u8>, DecodeError> {
    let spec = hound::WavSpec {
        channels: audio.channel_count().max(1) as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut out = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut out), spec)?;
        for i in 0..audio.frames() {
            for channel in &audio.channels {
                writer.write_sample(channel.get(i).copied().unwrap_or(0.0))?;
            }
        }
        writer.finalize()?;
    }
    Ok(out)
}

/// Encode a latent as a safetensors file of f32 tensors
pub fn encode_latent(latent: &Latent) -> Result<Vec<u8>, DecodeError> {
    let buffers: Vec<(&String, &Vec<usize>, Vec<u8>)> = latent
        .tensors
        .iter()
        .map(|(name, tensor)| {
            let bytes = tensor.data.iter().flat_map(|v| v.to_le_bytes()).collect();
            (name, &tensor.shape, bytes)
        })
        .collect();

    let views = buffers
        .iter()
        .map(|(name, shape, bytes)| {
            TensorView::new(Dtype::F32, shape.to_vec(), bytes).map(|view| (name.as_str(), view))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(safetensors::serialize(views, &None)?)
}
