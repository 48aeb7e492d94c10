//! Permit service: create, search, list, update, and delete operations.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::warn;

use permitdesk_core::{AppError, AppResult};
use permitdesk_domain::{Permit, PermitId, PermitUpdate};

use crate::permit_ports::{
    BlobStore, CreatePermitInput, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PermitIdSuffixSource,
    PermitListQuery, PermitPage, PermitRepository,
};

/// Bounded number of identifier-allocation attempts per create.
pub const ID_ALLOCATION_ATTEMPTS: u32 = 5;

/// Stateless application service over the permit record store and the active
/// blob strategy.
#[derive(Clone)]
pub struct PermitService {
    repository: Arc<dyn PermitRepository>,
    blob_store: Arc<dyn BlobStore>,
    suffix_source: Arc<dyn PermitIdSuffixSource>,
    allocation_attempts: u32,
}

impl PermitService {
    /// Creates a service over the given adapters.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PermitRepository>,
        blob_store: Arc<dyn BlobStore>,
        suffix_source: Arc<dyn PermitIdSuffixSource>,
    ) -> Self {
        Self {
            repository,
            blob_store,
            suffix_source,
            allocation_attempts: ID_ALLOCATION_ATTEMPTS,
        }
    }

    /// Overrides the identifier-allocation attempt bound.
    #[must_use]
    pub fn with_allocation_attempts(mut self, attempts: u32) -> Self {
        self.allocation_attempts = attempts;
        self
    }

    /// Creates a permit, allocating its identifier and storing an attached
    /// photo via the active blob strategy.
    ///
    /// A blob-store failure aborts the operation before any record is
    /// persisted; a record-store failure after a successful blob write
    /// releases the blob best-effort.
    pub async fn create_permit(&self, input: CreatePermitInput) -> AppResult<Permit> {
        let full_name = required_field(input.full_name, "fullName")?;
        let passport_number = required_field(input.passport_number, "passportNumber")?;

        let permit_id = self.allocate_permit_id().await?;
        let mut permit = Permit::new(permit_id, full_name, passport_number, input.details)?;

        let mut stored_reference = None;
        if let Some(upload) = input.image {
            let reference = self.blob_store.store(upload).await?;
            permit.attach_image(reference.as_str());
            stored_reference = Some(reference);
        }

        if let Err(error) = self.repository.create_permit(&permit).await {
            if let Some(reference) = stored_reference
                && let Err(release_error) = self.blob_store.delete(reference.as_str()).await
            {
                warn!(
                    error = %release_error,
                    reference = %reference,
                    "blob release failed after permit create failure"
                );
            }

            return Err(error);
        }

        Ok(permit)
    }

    /// Returns the permit whose identifier or passport number equals the
    /// query string.
    pub async fn check_permit_status(&self, query: &str) -> AppResult<Permit> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "query parameter is required".to_owned(),
            ));
        }

        self.repository
            .find_by_permit_id_or_passport(trimmed)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no permit matches '{trimmed}'")))
    }

    /// Returns the permit with the given identifier.
    pub async fn get_permit(&self, permit_id: &str) -> AppResult<Permit> {
        self.repository
            .find_by_permit_id(permit_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("permit '{permit_id}' does not exist")))
    }

    /// Returns one page of permits, clamping page and page size rather than
    /// rejecting out-of-range values.
    pub async fn list_permits(&self, query: PermitListQuery) -> AppResult<PermitPage> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1) * limit;

        let filter = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let (data, total) = self.repository.list_permits(filter, offset, limit).await?;

        Ok(PermitPage {
            data,
            page,
            limit,
            total,
        })
    }

    /// Applies a whitelisted partial update and returns the updated permit.
    pub async fn update_permit(&self, permit_id: &str, update: PermitUpdate) -> AppResult<Permit> {
        let mut permit = self.get_permit(permit_id).await?;
        permit.apply_update(update)?;
        self.repository.update_permit(&permit).await?;

        Ok(permit)
    }

    /// Removes a permit and releases its owned blob best-effort.
    ///
    /// The record deletion is the primary guarantee; a blob-release failure
    /// is logged and never propagated.
    pub async fn delete_permit(&self, permit_id: &str) -> AppResult<Permit> {
        let deleted = self.repository.delete_permit(permit_id).await?;

        if let Some(reference) = deleted.image()
            && let Err(error) = self.blob_store.delete(reference).await
        {
            warn!(
                error = %error,
                permit_id = %deleted.permit_id(),
                "blob release failed after permit deletion"
            );
        }

        Ok(deleted)
    }

    async fn allocate_permit_id(&self) -> AppResult<PermitId> {
        let year = Utc::now().year();

        for _ in 0..self.allocation_attempts {
            let candidate = PermitId::from_parts(year, self.suffix_source.next_suffix())?;
            if !self.repository.permit_id_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        Err(AppError::Internal(
            "could not allocate a unique permit identifier".to_owned(),
        ))
    }
}

fn required_field(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}
