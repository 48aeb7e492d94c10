use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::Mutex;

use permitdesk_core::{AppError, AppResult};
use permitdesk_domain::{Permit, PermitDetails, PermitId, PermitStatus, PermitUpdate};

use crate::permit_ports::{
    BlobContent, BlobStore, BlobUpload, CreatePermitInput, MAX_PAGE_SIZE, PermitIdSuffixSource,
    PermitListQuery, PermitRepository,
};

use super::PermitService;

#[derive(Default)]
struct FakePermitRepository {
    permits: Mutex<Vec<Permit>>,
    conflict_on_create: bool,
    last_list_args: Mutex<Option<(Option<String>, i64, i64)>>,
}

#[async_trait]
impl PermitRepository for FakePermitRepository {
    async fn create_permit(&self, permit: &Permit) -> AppResult<()> {
        if self.conflict_on_create {
            return Err(AppError::Conflict("duplicate key".to_owned()));
        }

        let mut permits = self.permits.lock().await;
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
            .lock()
            .await
            .iter()
            .any(|permit| permit.permit_id() == permit_id))
    }

    async fn find_by_permit_id(&self, permit_id: &str) -> AppResult<Option<Permit>> {
        Ok(self
            .permits
            .lock()
            .await
            .iter()
            .find(|permit| permit.permit_id().as_str() == permit_id)
            .cloned())
    }

    async fn find_by_permit_id_or_passport(&self, query: &str) -> AppResult<Option<Permit>> {
        let permits = self.permits.lock().await;
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
        *self.last_list_args.lock().await = Some((filter.map(str::to_owned), offset, limit));

        let permits = self.permits.lock().await;
        Ok((permits.clone(), permits.len() as i64))
    }

    async fn update_permit(&self, permit: &Permit) -> AppResult<()> {
        let mut permits = self.permits.lock().await;
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
        let mut permits = self.permits.lock().await;
        let position = permits
            .iter()
            .position(|permit| permit.permit_id().as_str() == permit_id)
            .ok_or_else(|| AppError::NotFound(format!("permit '{permit_id}' does not exist")))?;

        Ok(permits.remove(position))
    }
}

#[derive(Default)]
struct FakeBlobStore {
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_store: bool,
    fail_delete: bool,
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn store(&self, upload: BlobUpload) -> AppResult<String> {
        if self.fail_store {
            return Err(AppError::Internal("blob store unavailable".to_owned()));
        }

        let reference = format!("/uploads/{}", upload.file_name);
        self.stored.lock().await.push(reference.clone());
        Ok(reference)
    }

    async fn fetch(&self, reference: &str) -> AppResult<BlobContent> {
        Err(AppError::NotFound(format!("no blob at '{reference}'")))
    }

    async fn delete(&self, reference: &str) -> AppResult<()> {
        if self.fail_delete {
            return Err(AppError::Internal("blob store unavailable".to_owned()));
        }

        self.deleted.lock().await.push(reference.to_owned());
        Ok(())
    }
}

struct SequenceSuffixSource {
    suffixes: Vec<u32>,
    position: AtomicUsize,
}

impl SequenceSuffixSource {
    fn new(suffixes: Vec<u32>) -> Self {
        Self {
            suffixes,
            position: AtomicUsize::new(0),
        }
    }
}

impl PermitIdSuffixSource for SequenceSuffixSource {
    fn next_suffix(&self) -> u32 {
        let position = self.position.fetch_add(1, Ordering::Relaxed);
        self.suffixes[position.min(self.suffixes.len() - 1)]
    }
}

fn service_with(
    repository: Arc<FakePermitRepository>,
    blob_store: Arc<FakeBlobStore>,
    suffixes: Vec<u32>,
) -> PermitService {
    PermitService::new(
        repository,
        blob_store,
        Arc::new(SequenceSuffixSource::new(suffixes)),
    )
}

fn create_input(full_name: &str, passport_number: &str) -> CreatePermitInput {
    CreatePermitInput {
        full_name: Some(full_name.to_owned()),
        passport_number: Some(passport_number.to_owned()),
        ..CreatePermitInput::default()
    }
}

fn image_upload(file_name: &str) -> BlobUpload {
    BlobUpload {
        file_name: file_name.to_owned(),
        content_type: "image/jpeg".to_owned(),
        bytes: vec![0xFF, 0xD8, 0xFF],
    }
}

fn seeded_permit(suffix: u32, passport_number: &str) -> Permit {
    let permit_id = match PermitId::from_parts(Utc::now().year(), suffix) {
        Ok(permit_id) => permit_id,
        Err(error) => panic!("seed permit id must build: {error}"),
    };
    match Permit::new(permit_id, "Seed Person", passport_number, PermitDetails::default()) {
        Ok(permit) => permit,
        Err(error) => panic!("seed permit must build: {error}"),
    }
}

#[tokio::test]
async fn create_assigns_identifier_and_pending_status() {
    let repository = Arc::new(FakePermitRepository::default());
    let service = service_with(
        repository.clone(),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    let permit = match service.create_permit(create_input("Jane Doe", "P1234567")).await {
        Ok(permit) => permit,
        Err(error) => panic!("create must succeed: {error}"),
    };

    let year = Utc::now().year();
    assert_eq!(permit.permit_id().as_str(), format!("WP-MTA-{year}-123456"));
    assert_eq!(permit.status(), PermitStatus::Pending);
    assert!(permit.image().is_none());
    assert_eq!(repository.permits.lock().await.len(), 1);
}

#[tokio::test]
async fn create_rejects_missing_required_fields() {
    let service = service_with(
        Arc::new(FakePermitRepository::default()),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    let missing_name = CreatePermitInput {
        passport_number: Some("P1234567".to_owned()),
        ..CreatePermitInput::default()
    };
    assert!(matches!(
        service.create_permit(missing_name).await,
        Err(AppError::Validation(_))
    ));

    let blank_passport = CreatePermitInput {
        full_name: Some("Jane Doe".to_owned()),
        passport_number: Some("   ".to_owned()),
        ..CreatePermitInput::default()
    };
    assert!(matches!(
        service.create_permit(blank_passport).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn create_retries_past_taken_identifiers() {
    let repository = Arc::new(FakePermitRepository::default());
    repository
        .permits
        .lock()
        .await
        .push(seeded_permit(111_111, "P0000001"));

    let service = service_with(
        repository,
        Arc::new(FakeBlobStore::default()),
        vec![111_111, 111_111, 222_222],
    );

    let permit = match service.create_permit(create_input("Jane Doe", "P1234567")).await {
        Ok(permit) => permit,
        Err(error) => panic!("create must succeed after retry: {error}"),
    };

    assert!(permit.permit_id().as_str().ends_with("-222222"));
}

#[tokio::test]
async fn create_fails_when_allocation_attempts_are_exhausted() {
    let repository = Arc::new(FakePermitRepository::default());
    repository
        .permits
        .lock()
        .await
        .push(seeded_permit(111_111, "P0000001"));

    let service = service_with(repository.clone(), Arc::new(FakeBlobStore::default()), vec![111_111])
        .with_allocation_attempts(3);

    assert!(matches!(
        service.create_permit(create_input("Jane Doe", "P1234567")).await,
        Err(AppError::Internal(_))
    ));
    assert_eq!(repository.permits.lock().await.len(), 1);
}

#[tokio::test]
async fn create_surfaces_store_conflict_and_releases_blob() {
    let repository = Arc::new(FakePermitRepository {
        conflict_on_create: true,
        ..FakePermitRepository::default()
    });
    let blob_store = Arc::new(FakeBlobStore::default());
    let service = service_with(repository, blob_store.clone(), vec![123_456]);

    let mut input = create_input("Jane Doe", "P1234567");
    input.image = Some(image_upload("photo.jpg"));

    assert!(matches!(
        service.create_permit(input).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(
        blob_store.deleted.lock().await.as_slice(),
        ["/uploads/photo.jpg"]
    );
}

#[tokio::test]
async fn create_with_failing_blob_store_persists_no_record() {
    let repository = Arc::new(FakePermitRepository::default());
    let blob_store = Arc::new(FakeBlobStore {
        fail_store: true,
        ..FakeBlobStore::default()
    });
    let service = service_with(repository.clone(), blob_store, vec![123_456]);

    let mut input = create_input("Jane Doe", "P1234567");
    input.image = Some(image_upload("photo.jpg"));

    assert!(matches!(
        service.create_permit(input).await,
        Err(AppError::Internal(_))
    ));
    assert!(repository.permits.lock().await.is_empty());
}

#[tokio::test]
async fn status_check_matches_permit_id_then_passport() {
    let repository = Arc::new(FakePermitRepository::default());
    let seeded = seeded_permit(333_333, "P7654321");
    repository.permits.lock().await.push(seeded.clone());

    let service = service_with(
        repository,
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    let by_id = match service.check_permit_status(seeded.permit_id().as_str()).await {
        Ok(permit) => permit,
        Err(error) => panic!("lookup by permit id must succeed: {error}"),
    };
    assert_eq!(by_id.permit_id(), seeded.permit_id());

    let by_passport = match service.check_permit_status("P7654321").await {
        Ok(permit) => permit,
        Err(error) => panic!("lookup by passport must succeed: {error}"),
    };
    assert_eq!(by_passport.permit_id(), seeded.permit_id());

    assert!(matches!(
        service.check_permit_status("P0000000").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn status_check_rejects_blank_query() {
    let service = service_with(
        Arc::new(FakePermitRepository::default()),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    assert!(matches!(
        service.check_permit_status("   ").await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn get_unknown_permit_is_not_found() {
    let service = service_with(
        Arc::new(FakePermitRepository::default()),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    assert!(matches!(
        service.get_permit("WP-MTA-2025-999999").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_clamps_page_and_limit() {
    let repository = Arc::new(FakePermitRepository::default());
    let service = service_with(
        repository.clone(),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    let page = match service
        .list_permits(PermitListQuery {
            query: None,
            page: Some(0),
            limit: Some(5_000),
        })
        .await
    {
        Ok(page) => page,
        Err(error) => panic!("list must succeed: {error}"),
    };

    assert_eq!(page.page, 1);
    assert_eq!(page.limit, MAX_PAGE_SIZE);

    let recorded = repository.last_list_args.lock().await.clone();
    assert_eq!(recorded, Some((None, 0, MAX_PAGE_SIZE)));
}

#[tokio::test]
async fn list_trims_filter_and_computes_offset() {
    let repository = Arc::new(FakePermitRepository::default());
    let service = service_with(
        repository.clone(),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    let result = service
        .list_permits(PermitListQuery {
            query: Some("  jane  ".to_owned()),
            page: Some(3),
            limit: Some(10),
        })
        .await;
    assert!(result.is_ok());

    let recorded = repository.last_list_args.lock().await.clone();
    assert_eq!(recorded, Some((Some("jane".to_owned()), 20, 10)));

    let blank = service
        .list_permits(PermitListQuery {
            query: Some("   ".to_owned()),
            page: None,
            limit: None,
        })
        .await;
    assert!(blank.is_ok());

    let recorded = repository.last_list_args.lock().await.clone();
    assert_eq!(recorded, Some((None, 0, 20)));
}

#[tokio::test]
async fn update_applies_whitelisted_fields_and_persists() {
    let repository = Arc::new(FakePermitRepository::default());
    let seeded = seeded_permit(444_444, "P1111111");
    repository.permits.lock().await.push(seeded.clone());

    let service = service_with(
        repository.clone(),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    let update = PermitUpdate {
        employer: Some("Harbor Works Ltd".to_owned()),
        status: Some(PermitStatus::Approved),
        ..PermitUpdate::default()
    };

    let updated = match service
        .update_permit(seeded.permit_id().as_str(), update)
        .await
    {
        Ok(permit) => permit,
        Err(error) => panic!("update must succeed: {error}"),
    };

    assert_eq!(updated.permit_id(), seeded.permit_id());
    assert_eq!(updated.status(), PermitStatus::Approved);
    assert_eq!(
        updated.details().employer.as_deref(),
        Some("Harbor Works Ltd")
    );

    let stored = repository.permits.lock().await[0].clone();
    assert_eq!(stored.status(), PermitStatus::Approved);
}

#[tokio::test]
async fn update_unknown_permit_is_not_found() {
    let service = service_with(
        Arc::new(FakePermitRepository::default()),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    assert!(matches!(
        service
            .update_permit("WP-MTA-2025-999999", PermitUpdate::default())
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_removes_record_and_releases_blob() {
    let repository = Arc::new(FakePermitRepository::default());
    let blob_store = Arc::new(FakeBlobStore::default());
    let service = service_with(repository.clone(), blob_store.clone(), vec![123_456]);

    let mut input = create_input("Jane Doe", "P1234567");
    input.image = Some(image_upload("photo.jpg"));
    let created = match service.create_permit(input).await {
        Ok(permit) => permit,
        Err(error) => panic!("create must succeed: {error}"),
    };

    let deleted = match service.delete_permit(created.permit_id().as_str()).await {
        Ok(permit) => permit,
        Err(error) => panic!("delete must succeed: {error}"),
    };

    assert_eq!(deleted.permit_id(), created.permit_id());
    assert!(repository.permits.lock().await.is_empty());
    assert_eq!(
        blob_store.deleted.lock().await.as_slice(),
        ["/uploads/photo.jpg"]
    );
}

#[tokio::test]
async fn delete_survives_blob_release_failure() {
    let repository = Arc::new(FakePermitRepository::default());
    let blob_store = Arc::new(FakeBlobStore {
        fail_delete: true,
        ..FakeBlobStore::default()
    });
    let service = service_with(repository.clone(), blob_store, vec![123_456]);

    let mut input = create_input("Jane Doe", "P1234567");
    input.image = Some(image_upload("photo.jpg"));
    let created = match service.create_permit(input).await {
        Ok(permit) => permit,
        Err(error) => panic!("create must succeed: {error}"),
    };

    assert!(service.delete_permit(created.permit_id().as_str()).await.is_ok());
    assert!(repository.permits.lock().await.is_empty());
}

#[tokio::test]
async fn delete_unknown_permit_is_not_found() {
    let service = service_with(
        Arc::new(FakePermitRepository::default()),
        Arc::new(FakeBlobStore::default()),
        vec![123_456],
    );

    assert!(matches!(
        service.delete_permit("WP-MTA-2025-999999").await,
        Err(AppError::NotFound(_))
    ));
}
