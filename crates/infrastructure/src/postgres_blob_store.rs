use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use permitdesk_application::{BlobContent, BlobStore, BlobUpload, MAX_IMAGE_BYTES};
use permitdesk_core::{AppError, AppResult};

/// Dereferencing path prefix stored on records for database-held blobs.
const REFERENCE_PREFIX: &str = "/api/uploads/";

/// Bytes per stored chunk row (256 KiB).
const CHUNK_SIZE: usize = 256 * 1024;

/// Blob store keeping uploads as chunked rows in PostgreSQL.
///
/// Objects are keyed by an opaque UUID; the record stores the dereferencing
/// path `/api/uploads/<uuid>`. Uploads are constrained to image content
/// types and [`MAX_IMAGE_BYTES`].
#[derive(Clone)]
pub struct PostgresBlobStore {
    pool: PgPool,
}

impl PostgresBlobStore {
    /// Creates a store over the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn blob_id_for(reference: &str) -> AppResult<Uuid> {
        reference
            .strip_prefix(REFERENCE_PREFIX)
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| AppError::NotFound(format!("no stored blob at '{reference}'")))
    }
}

#[async_trait]
impl BlobStore for PostgresBlobStore {
    async fn store(&self, upload: BlobUpload) -> AppResult<String> {
        if !upload.content_type.starts_with("image/") {
            return Err(AppError::Validation(format!(
                "only image uploads are accepted, got '{}'",
                upload.content_type
            )));
        }

        if upload.bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::Validation(format!(
                "upload exceeds the {MAX_IMAGE_BYTES} byte limit"
            )));
        }

        let blob_id = Uuid::new_v4();

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start blob store transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO blob_objects (id, file_name, content_type, byte_size)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(blob_id)
        .bind(&upload.file_name)
        .bind(&upload.content_type)
        .bind(upload.bytes.len() as i64)
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to store blob metadata: {error}")))?;

        for (chunk_index, chunk) in upload.bytes.chunks(CHUNK_SIZE).enumerate() {
            sqlx::query(
                r#"
                INSERT INTO blob_chunks (blob_id, chunk_index, bytes)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(blob_id)
            .bind(chunk_index as i32)
            .bind(chunk)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to store blob chunk {chunk_index}: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit blob store transaction: {error}"))
        })?;

        Ok(format!("{REFERENCE_PREFIX}{blob_id}"))
    }

    async fn fetch(&self, reference: &str) -> AppResult<BlobContent> {
        let blob_id = Self::blob_id_for(reference)?;

        let content_type: Option<String> =
            sqlx::query_scalar("SELECT content_type FROM blob_objects WHERE id = $1")
                .bind(blob_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to read blob metadata: {error}"))
                })?;

        let content_type = content_type
            .ok_or_else(|| AppError::NotFound(format!("no stored blob at '{reference}'")))?;

        let chunks: Vec<Vec<u8>> = sqlx::query_scalar(
            r#"
            SELECT bytes FROM blob_chunks
            WHERE blob_id = $1
            ORDER BY chunk_index
            "#,
        )
        .bind(blob_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read blob chunks: {error}")))?;

        Ok(BlobContent {
            content_type,
            bytes: chunks.concat(),
        })
    }

    async fn delete(&self, reference: &str) -> AppResult<()> {
        let blob_id = match Self::blob_id_for(reference) {
            Ok(blob_id) => blob_id,
            // An unparseable reference dereferences nothing; treat as absent.
            Err(_) => return Ok(()),
        };

        let result = sqlx::query("DELETE FROM blob_objects WHERE id = $1")
            .bind(blob_id)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete blob: {error}")))?;

        if result.rows_affected() == 0 {
            debug!(reference = %reference, "blob already absent on delete");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_round_trip_through_ids() {
        let blob_id = Uuid::new_v4();
        let reference = format!("{REFERENCE_PREFIX}{blob_id}");
        match PostgresBlobStore::blob_id_for(&reference) {
            Ok(parsed) => assert_eq!(parsed, blob_id),
            Err(error) => panic!("reference must parse: {error}"),
        }
    }

    #[test]
    fn foreign_references_do_not_parse() {
        assert!(PostgresBlobStore::blob_id_for("/uploads/photo.jpg").is_err());
        assert!(PostgresBlobStore::blob_id_for("/api/uploads/not-a-uuid").is_err());
    }
}
