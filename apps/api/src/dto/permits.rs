use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use permitdesk_application::{BlobUpload, CreatePermitInput, PermitPage};
use permitdesk_core::{AppError, AppResult};
use permitdesk_domain::{Permit, PermitDetails, PermitStatus, PermitUpdate};

/// Create request body; also assembled from multipart form fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermitRequest {
    pub full_name: Option<String>,
    pub passport_number: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub employer: Option<String>,
    pub job_title: Option<String>,
    pub permit_start_date: Option<String>,
    pub permit_expiry_date: Option<String>,
}

impl CreatePermitRequest {
    /// Converts the wire request into a create input, parsing date fields.
    pub fn into_input(self, image: Option<BlobUpload>) -> AppResult<CreatePermitInput> {
        Ok(CreatePermitInput {
            full_name: self.full_name,
            passport_number: self.passport_number,
            details: PermitDetails {
                nationality: optional_text(self.nationality),
                date_of_birth: parse_date_field("dateOfBirth", self.date_of_birth)?,
                employer: optional_text(self.employer),
                job_title: optional_text(self.job_title),
                permit_start_date: parse_date_field("permitStartDate", self.permit_start_date)?,
                permit_expiry_date: parse_date_field("permitExpiryDate", self.permit_expiry_date)?,
            },
            image,
        })
    }
}

/// Partial update request body.
///
/// Only whitelisted fields are representable; unknown keys in the body are
/// ignored during deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermitRequest {
    pub full_name: Option<String>,
    pub passport_number: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub employer: Option<String>,
    pub job_title: Option<String>,
    pub permit_start_date: Option<String>,
    pub permit_expiry_date: Option<String>,
    pub status: Option<String>,
}

impl UpdatePermitRequest {
    /// Converts the wire request into a domain update, parsing dates and the
    /// status value.
    pub fn into_update(self) -> AppResult<PermitUpdate> {
        let status = match optional_text(self.status) {
            None => None,
            Some(raw) => Some(PermitStatus::parse(raw.trim())?),
        };

        Ok(PermitUpdate {
            full_name: self.full_name,
            passport_number: self.passport_number,
            nationality: optional_text(self.nationality),
            date_of_birth: parse_date_field("dateOfBirth", self.date_of_birth)?,
            employer: optional_text(self.employer),
            job_title: optional_text(self.job_title),
            permit_start_date: parse_date_field("permitStartDate", self.permit_start_date)?,
            permit_expiry_date: parse_date_field("permitExpiryDate", self.permit_expiry_date)?,
            status,
        })
    }
}

/// API representation of one permit record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitResponse {
    pub permit_id: String,
    pub full_name: String,
    pub passport_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_expiry_date: Option<NaiveDate>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Permit> for PermitResponse {
    fn from(permit: Permit) -> Self {
        let details = permit.details().clone();

        Self {
            permit_id: permit.permit_id().as_str().to_owned(),
            full_name: permit.full_name().to_owned(),
            passport_number: permit.passport_number().to_owned(),
            nationality: details.nationality,
            date_of_birth: details.date_of_birth,
            employer: details.employer,
            job_title: details.job_title,
            permit_start_date: details.permit_start_date,
            permit_expiry_date: details.permit_expiry_date,
            status: permit.status().as_str(),
            image: permit.image().map(str::to_owned),
            created_at: permit.created_at(),
            updated_at: permit.updated_at(),
        }
    }
}

/// One page of permits plus the pagination echo.
#[derive(Debug, Serialize)]
pub struct PermitListResponse {
    pub data: Vec<PermitResponse>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl From<PermitPage> for PermitListResponse {
    fn from(page: PermitPage) -> Self {
        Self {
            data: page.data.into_iter().map(PermitResponse::from).collect(),
            page: page.page,
            limit: page.limit,
            total: page.total,
        }
    }
}

/// Delete confirmation carrying the removed record.
#[derive(Debug, Serialize)]
pub struct DeletePermitResponse {
    pub message: String,
    pub permit: PermitResponse,
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn parse_date_field(name: &str, value: Option<String>) -> AppResult<Option<NaiveDate>> {
    match optional_text(value) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::Validation(format!("{name} must be a date in YYYY-MM-DD format"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_ignores_non_whitelisted_keys() {
        let body = serde_json::json!({
            "permitId": "WP-MTA-2025-000001",
            "image": "/uploads/sneaky.jpg",
            "employer": "Harbor Works Ltd"
        });

        let request: UpdatePermitRequest = match serde_json::from_value(body) {
            Ok(request) => request,
            Err(error) => panic!("body must deserialize: {error}"),
        };
        let update = match request.into_update() {
            Ok(update) => update,
            Err(error) => panic!("conversion must succeed: {error}"),
        };

        assert_eq!(update.employer.as_deref(), Some("Harbor Works Ltd"));
        assert!(update.full_name.is_none());
    }

    #[test]
    fn malformed_dates_are_a_validation_error() {
        let request = UpdatePermitRequest {
            date_of_birth: Some("yesterday".to_owned()),
            ..UpdatePermitRequest::default()
        };
        assert!(request.into_update().is_err());
    }

    #[test]
    fn unknown_status_value_is_rejected() {
        let request = UpdatePermitRequest {
            status: Some("Escalated".to_owned()),
            ..UpdatePermitRequest::default()
        };
        assert!(request.into_update().is_err());
    }

    #[test]
    fn empty_form_values_count_as_absent() {
        let request = CreatePermitRequest {
            full_name: Some("Jane Doe".to_owned()),
            passport_number: Some("P1234567".to_owned()),
            nationality: Some(String::new()),
            date_of_birth: Some(String::new()),
            ..CreatePermitRequest::default()
        };

        let input = match request.into_input(None) {
            Ok(input) => input,
            Err(error) => panic!("conversion must succeed: {error}"),
        };
        assert!(input.details.nationality.is_none());
        assert!(input.details.date_of_birth.is_none());
    }

    #[test]
    fn valid_dates_parse_to_calendar_dates() {
        let request = CreatePermitRequest {
            full_name: Some("Jane Doe".to_owned()),
            passport_number: Some("P1234567".to_owned()),
            permit_start_date: Some("2026-01-15".to_owned()),
            ..CreatePermitRequest::default()
        };

        let input = match request.into_input(None) {
            Ok(input) => input,
            Err(error) => panic!("conversion must succeed: {error}"),
        };
        assert_eq!(
            input.details.permit_start_date,
            NaiveDate::from_ymd_opt(2026, 1, 15)
        );
    }
}
