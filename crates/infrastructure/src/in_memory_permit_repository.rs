use async_trait::async_trait;
use tokio::sync::RwLock;

use permitdesk_application::PermitRepository;
use permitdesk_core::{AppError, AppResult};
use permitdesk_domain::{Permit, PermitId};

/// In-memory permit repository for tests and local development.
///
/// Mirrors the relational adapter's contract, including the uniqueness
/// guarantee on the permit identifier.
#[derive(Default)]
pub struct InMemoryPermitRepository {
    permits: RwLock<Vec<Permit>>,
}

impl InMemoryPermitRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermitRepository for InMemoryPermitRepository {
    async fn create_permit(&self, permit: &Permit) -> AppResult<()> {
        let mut permits = self.permits.write().await;
        if permits
            .iter()
            .any(|existing| existing.permit_id() == permit.permit_id())
        {
            return Err(AppError::Conflict(format!(
                "permit '{}' already exists",
                permit.permit_id()
            )));
        }

        permits.push(permit.clone());
        Ok(())
    }

    async fn permit_id_exists(&self, permit_id: &PermitId) -> AppResult<bool> {
        Ok(self
            .permits
            .read()
            .await
            .iter()
            .any(|permit| permit.permit_id() == permit_id))
    }

    async fn find_by_permit_id(&self, permit_id: &str) -> AppResult<Option<Permit>> {
        Ok(self
            .permits
            .read()
            .await
            .iter()
            .find(|permit| permit.permit_id().as_str() == permit_id)
            .cloned())
    }

    async fn find_by_permit_id_or_passport(&self, query: &str) -> AppResult<Option<Permit>> {
        let permits = self.permits.read().await;

        let by_permit_id = permits
            .iter()
            .find(|permit| permit.permit_id().as_str() == query)
            .cloned();

        Ok(by_permit_id.or_else(|| {
            permits
                .iter()
                .find(|permit| permit.passport_number() == query)
                .cloned()
        }))
    }

    async fn list_permits(
        &self,
        filter: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Permit>, i64)> {
        let permits = self.permits.read().await;

        let mut matching: Vec<Permit> = permits
            .iter()
            .filter(|permit| matches_filter(permit, filter))
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.created_at().cmp(&left.created_at()));

        let total = matching.len() as i64;
        let page: Vec<Permit> = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }

    async fn update_permit(&self, permit: &Permit) -> AppResult<()> {
        let mut permits = self.permits.write().await;
        let position = permits
            .iter()
            .position(|existing| existing.permit_id() == permit.permit_id())
            .ok_or_else(|| {
                AppError::NotFound(format!("permit '{}' does not exist", permit.permit_id()))
            })?;

        permits[position] = permit.clone();
        Ok(())
    }

    async fn delete_permit(&self, permit_id: &str) -> AppResult<Permit> {
        let mut permits = self.permits.write().await;
        let position = permits
            .iter()
            .position(|permit| permit.permit_id().as_str() == permit_id)
            .ok_or_else(|| AppError::NotFound(format!("permit '{permit_id}' does not exist")))?;

        Ok(permits.remove(position))
    }
}

fn matches_filter(permit: &Permit, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    let needle = filter.to_lowercase();
    let haystacks = [
        Some(permit.full_name()),
        Some(permit.passport_number()),
        permit.details().employer.as_deref(),
        permit.details().job_title.as_deref(),
    ];

    haystacks
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&needle))
}
