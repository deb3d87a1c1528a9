//! Input file uploads

use futures::stream::{self, StreamExt};

use super::RunningHubClient;
use crate::error::{Error, Result};
use crate::media::encode::{encode_latent, encode_mask_png, encode_png, encode_wav};
use crate::media::{Audio, Image, Latent, Mask};
use crate::retry::with_retry;
use crate::transport::{FileKind, UploadRequest};

/// Largest encoded image or mask the server accepts (10 MiB)
pub const MAX_IMAGE_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Remote names returned by [`RunningHubClient::upload_mask`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskUpload {
    /// Remote name of the mask
    pub mask: String,
    /// Remote name of the companion image, when one was given
    pub image: Option<String>,
}

pub(super) fn png_request(bytes: Vec<u8>, file_name: &str) -> Result<UploadRequest> {
    if bytes.len() > MAX_IMAGE_UPLOAD_BYTES {
        return Err(Error::UploadTooLarge {
            file_name: file_name.to_string(),
            bytes: bytes.len(),
            limit: MAX_IMAGE_UPLOAD_BYTES,
        });
    }
    Ok(UploadRequest::new(bytes, file_name, "image/png", FileKind::Image))
}

impl RunningHubClient {
    /// Upload a file and return the remote file name
    ///
    /// Retried with the configured backoff. The returned name is what a
    /// workflow node expects as its field value, e.g.
    /// `ParamAssignment::new(node_id, "image", name)`.
    pub async fn upload_file(&self, request: UploadRequest) -> Result<String> {
        self.config.validate()?;
        tracing::debug!(
            file = %request.file_name,
            kind = request.kind.as_str(),
            bytes = request.bytes.len(),
            "uploading file"
        );
        let name = with_retry(&self.config.retry, "upload file", || {
            self.transport.upload_file(&self.config, &request)
        })
        .await?;
        tracing::info!(file = %request.file_name, remote = %name, "file uploaded");
        Ok(name)
    }

    /// Upload an image as PNG
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadTooLarge`] without touching the network when
    /// the PNG exceeds [`MAX_IMAGE_UPLOAD_BYTES`].
    pub async fn upload_image(&self, image: &Image, file_name: &str) -> Result<String> {
        let bytes = encode_png(image).map_err(Error::from)?;
        self.upload_file(png_request(bytes, file_name)?).await
    }

    /// Upload a mask as a grayscale PNG, optionally with its companion image
    ///
    /// The mask goes up as `mask.png` and the image as `image.png`. Both are
    /// encoded and size-checked before the first request is sent.
    pub async fn upload_mask(&self, mask: &Mask, image: Option<&Image>) -> Result<MaskUpload> {
        let mask_request = png_request(encode_mask_png(mask)?, "mask.png")?;
        let image_request = image
            .map(|image| -> Result<UploadRequest> {
                png_request(encode_png(image)?, "image.png")
            })
            .transpose()?;

        let mask = self.upload_file(mask_request).await?;
        let image = match image_request {
            Some(request) => Some(self.upload_file(request).await?),
            None => None,
        };
        Ok(MaskUpload { mask, image })
    }

    /// Upload several images concurrently, keeping input order in the result
    ///
    /// Images are named `batch_upload_{i}.png`. The first failure aborts the
    /// whole call.
    pub async fn upload_images(&self, images: &[Image]) -> Result<Vec<String>> {
        let width = self.config.output.max_concurrency.min(images.len()).max(1);
        let mut results: Vec<(usize, Result<String>)> = stream::iter(images.iter().enumerate())
            .map(|(i, image)| async move {
                let name = format!("batch_upload_{}.png", i);
                (i, self.upload_image(image, &name).await)
            })
            .buffer_unordered(width)
            .collect()
            .await;
        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Upload audio as a float WAV file
    pub async fn upload_audio(&self, audio: &Audio) -> Result<String> {
        let bytes = encode_wav(audio).map_err(Error::from)?;
        self.upload_file(UploadRequest::new(
            bytes,
            "audio.wav",
            "application/octet-stream",
            FileKind::Audio,
        ))
        .await
    }

    /// Upload a latent as a safetensors file
    pub async fn upload_latent(&self, latent: &Latent) -> Result<String> {
        let bytes = encode_latent(latent).map_err(Error::from)?;
        self.upload_file(UploadRequest::new(
            bytes,
            "latent.safetensors",
            "application/octet-stream",
            FileKind::Latent,
        ))
        .await
    }

    /// Upload raw video bytes
    pub async fn upload_video(&self, bytes: Vec<u8>, file_name: &str) -> Result<String> {
        self.upload_file(UploadRequest::new(
            bytes,
            file_name,
            "application/octet-stream",
            FileKind::Video,
        ))
        .await
    }
}
