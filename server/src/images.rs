use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use color_eyre::eyre::Context;
use image::ImageFormat;
use thiserror::Error;
use uuid::Uuid;

const IMAGE_DIR: &str = "recipes/images";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ImageError {
    #[error("Expected a data URI of the form data:image/<format>;base64,<data>.")]
    NotADataUri,
    #[error("Unsupported image format: {0}.")]
    UnsupportedFormat(String),
    #[error("The image data is not valid base64.")]
    InvalidBase64,
    #[error("The image is empty.")]
    Empty,
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    NotAnImage,
}

/// An image received inline in a JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    pub(crate) fn from_data_uri(data_uri: &str) -> Result<Self, ImageError> {
        let rest = data_uri
            .trim()
            .strip_prefix("data:")
            .ok_or(ImageError::NotADataUri)?;
        let (media_type, data) = rest.split_once(";base64,").ok_or(ImageError::NotADataUri)?;
        let format = media_type
            .strip_prefix("image/")
            .ok_or(ImageError::NotADataUri)?;

        let (extension, declared) = match format.to_ascii_lowercase().as_str() {
            "png" => ("png", ImageFormat::Png),
            "jpeg" | "jpg" => ("jpg", ImageFormat::Jpeg),
            "gif" => ("gif", ImageFormat::Gif),
            "webp" => ("webp", ImageFormat::WebP),
            other => return Err(ImageError::UnsupportedFormat(other.to_string())),
        };

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|_| ImageError::InvalidBase64)?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        // The header has to agree with the declared media type.
        if image::guess_format(&bytes).ok() != Some(declared) {
            return Err(ImageError::NotAnImage);
        }

        Ok(Self { extension, bytes })
    }

    /// Writes the image under `media_root` and returns its path relative to it.
    #[tracing::instrument(skip(self), fields(size = self.bytes.len()), err)]
    pub(crate) async fn store(&self, media_root: &Path) -> color_eyre::Result<String> {
        let directory = media_root.join(IMAGE_DIR);
        tokio::fs::create_dir_all(&directory)
            .await
            .wrap_err("Failed to create the image directory")?;

        let file_name = format!("{}.{}", Uuid::new_v4(), self.extension);
        tokio::fs::write(directory.join(&file_name), &self.bytes)
            .await
            .wrap_err("Failed to write the image")?;

        Ok(format!("{IMAGE_DIR}/{file_name}"))
    }
}
