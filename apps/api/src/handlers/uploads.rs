use axum::extract::{Path, State};
use axum::http::HeaderName;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};

use crate::error::ApiResult;
use crate::state::AppState;

/// Streams a database-held blob back with its recorded content type.
pub async fn fetch_upload_handler(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> ApiResult<([(HeaderName, String); 2], Vec<u8>)> {
    let blob = state
        .blob_store
        .fetch(&format!("/api/uploads/{upload_id}"))
        .await?;

    Ok((
        [
            (CONTENT_TYPE, blob.content_type),
            (CACHE_CONTROL, "public, max-age=31536000".to_owned()),
        ],
        blob.bytes,
    ))
}
