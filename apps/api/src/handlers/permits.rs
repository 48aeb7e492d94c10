use axum::Json;
use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use serde::Deserialize;

use permitdesk_application::{BlobUpload, PermitListQuery};
use permitdesk_core::AppError;

use crate::dto::permits::{
    CreatePermitRequest, DeletePermitResponse, PermitListResponse, PermitResponse,
    UpdatePermitRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PermitListParams {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusCheckParams {
    pub query: Option<String>,
}

pub async fn create_permit_handler(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<(StatusCode, Json<PermitResponse>)> {
    let (payload, image) = decode_create_request(request).await?;
    let input = payload.into_input(image)?;

    let permit = state.permit_service.create_permit(input).await?;

    Ok((StatusCode::CREATED, Json(PermitResponse::from(permit))))
}

pub async fn list_permits_handler(
    State(state): State<AppState>,
    Query(params): Query<PermitListParams>,
) -> ApiResult<Json<PermitListResponse>> {
    let page = state
        .permit_service
        .list_permits(PermitListQuery {
            query: params.q,
            page: params.page,
            limit: params.limit,
        })
        .await?;

    Ok(Json(PermitListResponse::from(page)))
}

pub async fn check_permit_status_handler(
    State(state): State<AppState>,
    Query(params): Query<StatusCheckParams>,
) -> ApiResult<Json<PermitResponse>> {
    let query = params.query.unwrap_or_default();
    let permit = state.permit_service.check_permit_status(query.as_str()).await?;

    Ok(Json(PermitResponse::from(permit)))
}

pub async fn get_permit_handler(
    State(state): State<AppState>,
    Path(permit_id): Path<String>,
) -> ApiResult<Json<PermitResponse>> {
    let permit = state.permit_service.get_permit(permit_id.as_str()).await?;

    Ok(Json(PermitResponse::from(permit)))
}

pub async fn update_permit_handler(
    State(state): State<AppState>,
    Path(permit_id): Path<String>,
    Json(payload): Json<UpdatePermitRequest>,
) -> ApiResult<Json<PermitResponse>> {
    let update = payload.into_update()?;
    let permit = state
        .permit_service
        .update_permit(permit_id.as_str(), update)
        .await?;

    Ok(Json(PermitResponse::from(permit)))
}

pub async fn delete_permit_handler(
    State(state): State<AppState>,
    Path(permit_id): Path<String>,
) -> ApiResult<Json<DeletePermitResponse>> {
    let permit = state.permit_service.delete_permit(permit_id.as_str()).await?;

    Ok(Json(DeletePermitResponse {
        message: "Permit deleted successfully".to_owned(),
        permit: PermitResponse::from(permit),
    }))
}

/// Accepts either a JSON body or a multipart form whose `image` field
/// carries the attachment.
async fn decode_create_request(
    request: Request,
) -> ApiResult<(CreatePermitRequest, Option<BlobUpload>)> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|error| AppError::Validation(format!("invalid multipart body: {error}")))?;
        decode_multipart(multipart).await
    } else {
        let Json(payload) = Json::<CreatePermitRequest>::from_request(request, &())
            .await
            .map_err(|error| AppError::Validation(format!("invalid JSON body: {error}")))?;
        Ok((payload, None))
    }
}

async fn decode_multipart(
    mut multipart: Multipart,
) -> ApiResult<(CreatePermitRequest, Option<BlobUpload>)> {
    let mut payload = CreatePermitRequest::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::Validation(format!("invalid multipart body: {error}")))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().unwrap_or("upload").to_owned();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_owned();
            let bytes = field.bytes().await.map_err(|error| {
                AppError::Validation(format!("failed to read image field: {error}"))
            })?;

            image = Some(BlobUpload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(|error| {
            AppError::Validation(format!("failed to read field '{name}': {error}"))
        })?;

        match name.as_str() {
            "fullName" => payload.full_name = Some(value),
            "passportNumber" => payload.passport_number = Some(value),
            "nationality" => payload.nationality = Some(value),
            "dateOfBirth" => payload.date_of_birth = Some(value),
            "employer" => payload.employer = Some(value),
            "jobTitle" => payload.job_title = Some(value),
            "permitStartDate" => payload.permit_start_date = Some(value),
            "permitExpiryDate" => payload.permit_expiry_date = Some(value),
            _ => {}
        }
    }

    Ok((payload, image))
}
