use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use permitdesk_application::{BlobContent, BlobStore, BlobUpload};
use permitdesk_core::{AppError, AppResult};

/// Public path prefix under which stored files are served statically.
const PUBLIC_PREFIX: &str = "/uploads/";

/// Blob store writing uploads to a local directory.
///
/// References are public relative paths (`/uploads/<file name>`); serving the
/// bytes back is a static-file responsibility of the HTTP layer.
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    directory: PathBuf,
}

impl FilesystemBlobStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Creates the upload directory when it does not exist yet.
    pub async fn ensure_directory(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to create upload directory '{}': {error}",
                    self.directory.display()
                ))
            })
    }

    fn path_for(&self, reference: &str) -> AppResult<PathBuf> {
        let file_name = reference.strip_prefix(PUBLIC_PREFIX).ok_or_else(|| {
            AppError::Validation(format!("'{reference}' is not an upload reference"))
        })?;

        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            return Err(AppError::Validation(format!(
                "'{reference}' is not an upload reference"
            )));
        }

        Ok(self.directory.join(file_name))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn store(&self, upload: BlobUpload) -> AppResult<String> {
        self.ensure_directory().await?;

        let file_name = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            sanitize_file_name(&upload.file_name)
        );
        let path = self.directory.join(&file_name);

        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write upload '{}': {error}",
                    path.display()
                ))
            })?;

        Ok(format!("{PUBLIC_PREFIX}{file_name}"))
    }

    async fn fetch(&self, reference: &str) -> AppResult<BlobContent> {
        let path = self.path_for(reference)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("no upload at '{reference}'")));
            }
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to read upload '{}': {error}",
                    path.display()
                )));
            }
        };

        Ok(BlobContent {
            content_type: content_type_for(&path).to_owned(),
            bytes,
        })
    }

    async fn delete(&self, reference: &str) -> AppResult<()> {
        let path = self.path_for(reference)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(reference = %reference, "upload already absent on delete");
                Ok(())
            }
            Err(error) => Err(AppError::Internal(format!(
                "failed to delete upload '{}': {error}",
                path.display()
            ))),
        }
    }
}

fn sanitize_file_name(original: &str) -> String {
    let cleaned: String = original
        .chars()
        .map(|character| {
            if character.is_whitespace() || character == '/' || character == '\\' {
                '_'
            } else {
                character
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_owned()
    } else {
        cleaned
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
