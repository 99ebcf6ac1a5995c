use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

use crate::{
    constants::{IMAGE_EXTENSIONS, IMAGE_UPLOAD_DIR},
    error::{Error, ErrorKind},
};

const INVALID_IMAGE: &str = "Image must be a base64 encoded data URI.";

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Decodes `data:image/<ext>;base64,<payload>`.
pub fn decode_data_uri(data: &str) -> Result<DecodedImage, Error> {
    let invalid = || ErrorKind::InvalidRequest.field("image", INVALID_IMAGE);

    let (format, payload) = data.split_once(";base64,").ok_or_else(invalid)?;
    let mime = format.strip_prefix("data:").ok_or_else(invalid)?;
    let extension = mime
        .strip_prefix("image/")
        .map(str::to_lowercase)
        .ok_or_else(invalid)?;

    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ErrorKind::InvalidRequest.field(
            "image",
            &format!("Unsupported image type: {extension}."),
        ));
    }

    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(DecodedImage { extension, bytes })
}

/// Writes the image under `media_root` and returns its media-relative path.
pub async fn save_image(data: &str, media_root: &Path) -> Result<String, Error> {
    let image = decode_data_uri(data)?;
    let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);

    let directory = media_root.join(IMAGE_UPLOAD_DIR);
    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(|e| ErrorKind::Internal.new(&format!("Failed to create media directory: {e}")))?;
    tokio::fs::write(directory.join(&file_name), &image.bytes)
        .await
        .map_err(|e| ErrorKind::Internal.new(&format!("Failed to store image: {e}")))?;

    log::trace!("> Stored image {file_name} ({} bytes)", image.bytes.len());

    Ok(format!("{IMAGE_UPLOAD_DIR}/{file_name}"))
}

/// Removes a stored image; failures are logged and otherwise ignored.
pub async fn delete_image(path: &str, media_root: &Path) {
    if path.is_empty() {
        return;
    }
    if let Err(e) = tokio::fs::remove_file(media_root.join(path)).await {
        log::warn!("Failed to remove image {path}: {e}");
    }
}

pub fn image_url(path: &str, media_url: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    Some(format!("{media_url}{path}"))
}
