//! Local-disk media store
//!
//! Files land in `<root>/<tenant_id>/<uuid>.<ext>` and are served by the API
//! under `/uploads`. Generated names mean client file names never reach the
//! filesystem.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{validate_image, MediaError, MediaStore};

/// URL prefix the upload directory is served under
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(
        &self,
        tenant_id: Uuid,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, MediaError> {
        let ext = validate_image(content_type, &data)?;

        let dir = self.root.join(tenant_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let stored_name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(dir.join(&stored_name), &data).await?;

        tracing::debug!(
            tenant_id = %tenant_id,
            original = %file_name,
            file = %stored_name,
            bytes = data.len(),
            "Stored image"
        );

        Ok(format!("{}/{}/{}", UPLOADS_URL_PREFIX, tenant_id, stored_name))
    }
}
