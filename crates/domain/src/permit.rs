//! Work permit entity, identifier format, and status lifecycle.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, Utc};
use permitdesk_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Issuing jurisdiction code embedded in every permit identifier.
pub const PERMIT_JURISDICTION: &str = "MTA";

/// Smallest admissible identifier suffix (six digits, no leading zero).
pub const PERMIT_ID_SUFFIX_MIN: u32 = 100_000;

/// Largest admissible identifier suffix.
pub const PERMIT_ID_SUFFIX_MAX: u32 = 999_999;

/// Human-readable permit identifier of the form `WP-MTA-<year>-<6 digits>`.
///
/// Assigned once at creation and never reassigned afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermitId(String);

impl PermitId {
    /// Builds an identifier from an issue year and a six-digit suffix.
    pub fn from_parts(year: i32, suffix: u32) -> AppResult<Self> {
        if !(1000..=9999).contains(&year) {
            return Err(AppError::Validation(format!(
                "permit id year must have four digits, got '{year}'"
            )));
        }

        if !(PERMIT_ID_SUFFIX_MIN..=PERMIT_ID_SUFFIX_MAX).contains(&suffix) {
            return Err(AppError::Validation(format!(
                "permit id suffix must have six digits, got '{suffix}'"
            )));
        }

        Ok(Self(format!("WP-{PERMIT_JURISDICTION}-{year}-{suffix}")))
    }

    /// Parses and validates an identifier in its canonical string form.
    pub fn parse(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let segments: Vec<&str> = value.split('-').collect();

        let valid = matches!(
            segments.as_slice(),
            ["WP", jurisdiction, year, suffix]
                if *jurisdiction == PERMIT_JURISDICTION
                    && year.len() == 4
                    && year.bytes().all(|byte| byte.is_ascii_digit())
                    && suffix.len() == 6
                    && suffix.bytes().all(|byte| byte.is_ascii_digit())
                    && !suffix.starts_with('0')
        );

        if !valid {
            return Err(AppError::Validation(format!(
                "'{value}' is not a valid permit identifier"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PermitId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<PermitId> for String {
    fn from(value: PermitId) -> Self {
        value.0
    }
}

/// Review status of a permit application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermitStatus {
    /// Submitted and awaiting review.
    #[default]
    Pending,
    /// Approved by the reviewing authority.
    Approved,
    /// Rejected by the reviewing authority.
    Rejected,
}

impl PermitStatus {
    /// Returns the storage string for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Parses a storage string into a status.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            _ => Err(AppError::Validation(format!(
                "unknown permit status '{value}'"
            ))),
        }
    }
}

/// Optional demographic and employment fields of a permit application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitDetails {
    /// Applicant nationality.
    pub nationality: Option<String>,
    /// Applicant date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Employing company or sponsor.
    pub employer: Option<String>,
    /// Position the permit is requested for.
    pub job_title: Option<String>,
    /// First day the permit is valid.
    pub permit_start_date: Option<NaiveDate>,
    /// Last day the permit is valid.
    pub permit_expiry_date: Option<NaiveDate>,
}

/// Whitelisted partial update for a permit.
///
/// Every field is independently present-or-absent; absent means unchanged.
/// The permit identifier, image reference, and timestamps are deliberately
/// not representable here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermitUpdate {
    /// Replacement applicant name.
    pub full_name: Option<String>,
    /// Replacement passport number.
    pub passport_number: Option<String>,
    /// Replacement nationality.
    pub nationality: Option<String>,
    /// Replacement date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Replacement employer.
    pub employer: Option<String>,
    /// Replacement job title.
    pub job_title: Option<String>,
    /// Replacement permit start date.
    pub permit_start_date: Option<NaiveDate>,
    /// Replacement permit expiry date.
    pub permit_expiry_date: Option<NaiveDate>,
    /// Replacement review status.
    pub status: Option<PermitStatus>,
}

/// One work-permit application record.
#[derive(Debug, Clone, PartialEq)]
pub struct Permit {
    permit_id: PermitId,
    full_name: NonEmptyString,
    passport_number: NonEmptyString,
    details: PermitDetails,
    status: PermitStatus,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Permit {
    /// Creates a freshly submitted permit with `Pending` status and no image.
    pub fn new(
        permit_id: PermitId,
        full_name: impl Into<String>,
        passport_number: impl Into<String>,
        details: PermitDetails,
    ) -> AppResult<Self> {
        let now = Utc::now();
        Self::from_parts(
            permit_id,
            full_name,
            passport_number,
            details,
            PermitStatus::Pending,
            None,
            now,
            now,
        )
    }

    /// Reconstructs a permit from stored state.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        permit_id: PermitId,
        full_name: impl Into<String>,
        passport_number: impl Into<String>,
        details: PermitDetails,
        status: PermitStatus,
        image: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Ok(Self {
            permit_id,
            full_name: NonEmptyString::new(full_name)?,
            passport_number: NonEmptyString::new(passport_number)?,
            details,
            status,
            image,
            created_at,
            updated_at,
        })
    }

    /// Attaches a blob reference to this permit.
    pub fn attach_image(&mut self, reference: impl Into<String>) {
        self.image = Some(reference.into());
    }

    /// Applies a whitelisted partial update and bumps `updated_at`.
    pub fn apply_update(&mut self, update: PermitUpdate) -> AppResult<()> {
        if let Some(full_name) = update.full_name {
            self.full_name = NonEmptyString::new(full_name)?;
        }

        if let Some(passport_number) = update.passport_number {
            self.passport_number = NonEmptyString::new(passport_number)?;
        }

        if let Some(nationality) = update.nationality {
            self.details.nationality = Some(nationality);
        }

        if let Some(date_of_birth) = update.date_of_birth {
            self.details.date_of_birth = Some(date_of_birth);
        }

        if let Some(employer) = update.employer {
            self.details.employer = Some(employer);
        }

        if let Some(job_title) = update.job_title {
            self.details.job_title = Some(job_title);
        }

        if let Some(permit_start_date) = update.permit_start_date {
            self.details.permit_start_date = Some(permit_start_date);
        }

        if let Some(permit_expiry_date) = update.permit_expiry_date {
            self.details.permit_expiry_date = Some(permit_expiry_date);
        }

        if let Some(status) = update.status {
            self.status = status;
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns the immutable permit identifier.
    #[must_use]
    pub fn permit_id(&self) -> &PermitId {
        &self.permit_id
    }

    /// Returns the applicant name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.full_name.as_str()
    }

    /// Returns the applicant passport number.
    #[must_use]
    pub fn passport_number(&self) -> &str {
        self.passport_number.as_str()
    }

    /// Returns the optional demographic and employment fields.
    #[must_use]
    pub fn details(&self) -> &PermitDetails {
        &self.details
    }

    /// Returns the review status.
    #[must_use]
    pub fn status(&self) -> PermitStatus {
        self.status
    }

    /// Returns the blob reference of the applicant photo, when present.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-modification timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
