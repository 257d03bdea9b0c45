//! # Upload Storage
//!
//! File storage for avatars and post images.
//!
//! Uploaded files land under the upload root (`MURMUR_UPLOAD_DIR`, default
//! `uploads/`), in `avatars/` or `posts/`, named
//! `<user_id>-<millis>[-<seq>].<ext>`. The stored path (what goes into the
//! database and back to clients) is the `/uploads/...` form the static file
//! route serves.
//!
//! The file is written before the owning document is updated; a crash in
//! between leaves an orphan file, never a dangling reference.

use axum::body::Bytes;
use murmur_core::{SocialError, UserId, primitives::MAX_UPLOAD_BYTES};
use std::path::{Path, PathBuf};

/// Subdirectory for avatar files.
const AVATAR_DIR: &str = "avatars";

/// Subdirectory for post image files.
const POST_DIR: &str = "posts";

// =============================================================================
// UPLOAD STORE
// =============================================================================

/// Writes and deletes uploaded files under one root directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Create a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store rooted at `MURMUR_UPLOAD_DIR` (default `uploads`).
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var("MURMUR_UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        Self::new(root)
    }

    /// The root directory served under `/uploads`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the avatar and post subdirectories.
    pub async fn ensure_dirs(&self) -> Result<(), SocialError> {
        for sub in [AVATAR_DIR, POST_DIR] {
            tokio::fs::create_dir_all(self.root.join(sub))
                .await
                .map_err(|e| SocialError::Io(format!("Cannot create upload directory: {e}")))?;
        }
        Ok(())
    }

    /// Store an uploaded avatar and return its stored path.
    pub async fn save_avatar(
        &self,
        owner: UserId,
        file_name: Option<&str>,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<String, SocialError> {
        validate_upload(content_type, &data)?;
        let name = format!(
            "{}-{}{}",
            owner.0,
            chrono::Utc::now().timestamp_millis(),
            extension_of(file_name)
        );
        self.write_file(AVATAR_DIR, &name, &data).await
    }

    /// Store one uploaded post image and return its stored path. `seq`
    /// distinguishes multiple images of the same request.
    pub async fn save_post_image(
        &self,
        owner: UserId,
        seq: usize,
        file_name: Option<&str>,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<String, SocialError> {
        validate_upload(content_type, &data)?;
        let name = format!(
            "{}-{}-{}{}",
            owner.0,
            chrono::Utc::now().timestamp_millis(),
            seq,
            extension_of(file_name)
        );
        self.write_file(POST_DIR, &name, &data).await
    }

    async fn write_file(&self, sub: &str, name: &str, data: &[u8]) -> Result<String, SocialError> {
        let path = self.root.join(sub).join(name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| SocialError::Io(format!("Cannot store upload: {e}")))?;
        Ok(format!("/uploads/{sub}/{name}"))
    }

    /// Best-effort deletion of a previously stored file. Failures are
    /// logged, never propagated; sentinel and external values are skipped.
    pub async fn delete_stored(&self, stored: &str) {
        let Some(relative) = stored.strip_prefix("/uploads/") else {
            return;
        };
        if relative.contains("..") {
            return;
        }
        let path = self.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(
                event = "upload_cleanup_failed",
                path = %path.display(),
                error = %e,
                "Could not delete replaced upload"
            );
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

fn validate_upload(content_type: Option<&str>, data: &Bytes) -> Result<(), SocialError> {
    if !content_type.is_some_and(|ct| ct.starts_with("image/")) {
        return Err(SocialError::Validation(
            "Not an image! Please upload only images.".to_string(),
        ));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(SocialError::Validation(
            "File is too large. Max 5MB allowed.".to_string(),
        ));
    }
    Ok(())
}

/// Extract a safe file extension (with leading dot) from an uploaded
/// filename. Anything suspicious becomes the empty string.
fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_image_content_types() {
        let data = Bytes::from_static(b"hello");
        assert!(validate_upload(Some("text/plain"), &data).is_err());
        assert!(validate_upload(None, &data).is_err());
        assert!(validate_upload(Some("image/png"), &data).is_ok());
    }

    #[test]
    fn rejects_oversized_files() {
        let data = Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert!(validate_upload(Some("image/png"), &data).is_err());
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension_of(Some("me.PNG")), ".png");
        assert_eq!(extension_of(Some("weird.p/ng")), "");
        assert_eq!(extension_of(Some("noext")), "");
        assert_eq!(extension_of(None), "");
    }

    #[tokio::test]
    async fn save_and_delete_round_trip() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = UploadStore::new(dir.path());
        assert!(store.ensure_dirs().await.is_ok());

        let stored = store
            .save_avatar(
                UserId(7),
                Some("me.png"),
                Some("image/png"),
                Bytes::from_static(b"fake-image"),
            )
            .await;
        assert!(stored.as_ref().is_ok_and(|s| s.starts_with("/uploads/avatars/7-")));

        if let Ok(stored) = stored {
            let on_disk = dir.path().join(stored.trim_start_matches("/uploads/"));
            assert!(on_disk.exists());
            store.delete_stored(&stored).await;
            assert!(!on_disk.exists());
        }
    }

    #[tokio::test]
    async fn delete_skips_external_and_sentinel_values() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let store = UploadStore::new(dir.path());
        // Nothing to assert beyond "does not panic or touch the root".
        store.delete_stored("default_avatar.png").await;
        store.delete_stored("https://example.com/x.png").await;
        store.delete_stored("/uploads/../../etc/passwd").await;
    }
}
