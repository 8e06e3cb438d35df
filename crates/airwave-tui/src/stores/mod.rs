//! Client-side stores. Each owns its slice of state behind a lock, talks to
//! the backend, and announces changes on the broadcast channel.

pub mod admin;
pub mod catalog;
pub mod comments;
pub mod favorites;
pub mod identity;

use std::path::Path;

use airwave_proto::error::{BackendError, Result};

/// An image file read from disk, ready for upload.
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub content_type: &'static str,
}

pub async fn read_image(path: &Path) -> Result<ImageFile> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let content_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => {
            return Err(BackendError::validation(format!(
                "Unsupported image type: {}",
                path.display()
            )))
        }
    };
    let bytes = tokio::fs::read(path).await?;
    Ok(ImageFile {
        bytes,
        extension,
        content_type,
    })
}
