//! Product image uploads and serving.
//!
//! Uploaded files land flat in the configured image directory under a
//! timestamped, sanitized name and are served back by that name.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

/// Extensions accepted for upload and serving, lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Public URL prefix images are served under.
pub const IMAGE_URL_PREFIX: &str = "/api/images/";

/// Image upload and lookup errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file provided")]
    Empty,

    #[error("invalid file type")]
    InvalidType,

    #[error("invalid file name")]
    InvalidName,

    #[error("file exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("image not found")]
    NotFound,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub url: String,
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Lowercased extension of `name` if it is an accepted image type.
#[must_use]
pub fn image_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// MIME type for an accepted image name.
#[must_use]
pub fn content_type(name: &str) -> Option<&'static str> {
    Some(match image_extension(name)?.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    })
}

/// Storage name for an upload: `<millis>-<sanitized original>`.
#[must_use]
pub fn upload_name(now_millis: i64, original: &str) -> String {
    format!("{now_millis}-{}", sanitize_file_name(original))
}

fn check_served_name(filename: &str) -> Result<(), UploadError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(UploadError::InvalidName);
    }
    if image_extension(filename).is_none() {
        return Err(UploadError::InvalidType);
    }
    Ok(())
}

/// Reads and writes images in one directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Write an uploaded file and return its stored name and public URL.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Empty` for zero bytes, `UploadError::InvalidType`
    /// for a non-image extension and `UploadError::TooLarge` above the limit.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredImage, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                limit: self.max_bytes,
            });
        }
        if image_extension(original_name).is_none() {
            return Err(UploadError::InvalidType);
        }

        let filename = upload_name(Utc::now().timestamp_millis(), original_name);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&filename), bytes).await?;

        tracing::info!(%filename, "Image uploaded");
        Ok(StoredImage {
            url: format!("{IMAGE_URL_PREFIX}{filename}"),
            filename,
        })
    }

    /// Delete a stored image. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidName` or `UploadError::InvalidType` for a
    /// name [`read`](Self::read) would refuse, and `UploadError::Io` when the
    /// file cannot be removed.
    pub async fn remove(&self, filename: &str) -> Result<(), UploadError> {
        check_served_name(filename)?;
        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UploadError::Io(e)),
        }
    }

    /// Read an image by stored name, returning its bytes and MIME type.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidName` for names with path separators or
    /// `..`, `UploadError::InvalidType` for a non-image extension and
    /// `UploadError::NotFound` when the file does not exist.
    pub async fn read(&self, filename: &str) -> Result<(Vec<u8>, &'static str), UploadError> {
        check_served_name(filename)?;
        let mime = content_type(filename).ok_or(UploadError::InvalidType)?;

        match tokio::fs::read(self.dir.join(filename)).await {
            Ok(bytes) => Ok((bytes, mime)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(UploadError::NotFound),
            Err(e) => Err(UploadError::Io(e)),
        }
    }
}
