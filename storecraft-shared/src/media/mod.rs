//! Product image storage
//!
//! Uploaded images go through a [`MediaStore`]; the API holds it as a trait
//! object so local disk can be swapped for object storage without touching
//! the handlers.

pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

pub use local::LocalMediaStore;

/// Largest accepted image (5 MiB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Accepted image content types and their file extensions
pub const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Image exceeds the {max} byte limit")]
    TooLarge { max: usize },

    #[error("Image is empty")]
    Empty,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// File extension for an accepted content type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

/// Checks type and size before anything is written
pub fn validate_image(content_type: &str, data: &[u8]) -> Result<&'static str, MediaError> {
    let ext = extension_for(content_type)
        .ok_or_else(|| MediaError::UnsupportedType(content_type.to_string()))?;

    if data.is_empty() {
        return Err(MediaError::Empty);
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge {
            max: MAX_IMAGE_BYTES,
        });
    }

    Ok(ext)
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores one image for a tenant and returns its public URL path
    ///
    /// `file_name` is the client's name for the file; stores may record it
    /// but never use it as a path.
    async fn put(
        &self,
        tenant_id: Uuid,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, MediaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(extension_for("image/webp; charset=binary"), Some("webp"));
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn test_validate_image() {
        assert_eq!(validate_image("image/gif", b"GIF89a").unwrap(), "gif");
        assert!(matches!(validate_image("image/png", b""), Err(MediaError::Empty)));
        assert!(matches!(
            validate_image("text/html", b"<html>"),
            Err(MediaError::UnsupportedType(_))
        ));

        let oversized = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            validate_image("image/png", &oversized),
            Err(MediaError::TooLarge { .. })
        ));
    }
}
