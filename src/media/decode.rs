//! Byte decoders for artifact types that need no external tooling

use std::collections::BTreeMap;
use std::io::Cursor;

use half::{bf16, f16};
use safetensors::{Dtype, SafeTensors};

use super::{Audio, Image, Latent, Tensor};
use crate::error::DecodeError;

/// Decode any image format the `image` crate was built with into RGB
pub fn decode_image(bytes: &[u8]) -> Result<Image, DecodeError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Image::from_rgb8(width, height, rgb.as_raw()))
}

/// Decode UTF-8 text
pub fn decode_text(bytes: Vec<u8>) -> Result<String, DecodeError> {
    Ok(String::from_utf8(bytes)?)
}

/// Decode a WAV file, widening mono to stereo
///
/// Integer samples are scaled into `-1.0..=1.0`.
pub fn decode_wav(bytes: &[u8]) -> Result<Audio, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channel_count = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }
    if channels.len() == 1 {
        let mono = channels[0].clone();
        channels.push(mono);
    }

    Ok(Audio {
        sample_rate: spec.sample_rate,
        channels,
        placeholder: false,
    })
}

/// Decode a safetensors payload
///
/// F32 tensors are read as-is; F16, BF16 and F64 are converted to f32. Any
/// other element type is rejected.
pub fn decode_latent(bytes: &[u8]) -> Result<Latent, DecodeError> {
    let file = SafeTensors::deserialize(bytes)?;
    let mut tensors = BTreeMap::new();
    for (name, view) in file.tensors() {
        let raw = view.data();
        let data: Vec<f32> = match view.dtype() {
            Dtype::F32 => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::F16 => raw
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            Dtype::BF16 => raw
                .chunks_exact(2)
                .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            Dtype::F64 => raw
                .chunks_exact(8)
                .map(|b| {
                    let mut word = [0u8; 8];
                    word.copy_from_slice(b);
                    f64::from_le_bytes(word) as f32
                })
                .collect(),
            other => {
                return Err(DecodeError::UnsupportedDtype {
                    name,
                    dtype: format!("{:?}", other),
                });
            }
        };
        tensors.insert(
            name,
            Tensor {
                shape: view.shape().to_vec(),
                data,
            },
        );
    }
    Ok(Latent {
        tensors,
        placeholder: false,
    })
}
