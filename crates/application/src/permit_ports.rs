//! Ports between the permit service and its adapters.

use async_trait::async_trait;

use permitdesk_core::AppResult;
use permitdesk_domain::{
    PERMIT_ID_SUFFIX_MAX, PERMIT_ID_SUFFIX_MIN, Permit, PermitDetails, PermitId,
};

/// Page size applied when a listing request names none.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Upper bound on the page size a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Upper bound on accepted upload size (5 MB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Repository port for permit records.
#[async_trait]
pub trait PermitRepository: Send + Sync {
    /// Persists a new permit. Duplicate permit identifiers are a conflict.
    async fn create_permit(&self, permit: &Permit) -> AppResult<()>;

    /// Returns whether a permit identifier is already taken.
    async fn permit_id_exists(&self, permit_id: &PermitId) -> AppResult<bool>;

    /// Returns the permit with the given identifier, when present.
    async fn find_by_permit_id(&self, permit_id: &str) -> AppResult<Option<Permit>>;

    /// Returns the permit whose identifier equals the query, or failing that
    /// whose passport number equals the query.
    async fn find_by_permit_id_or_passport(&self, query: &str) -> AppResult<Option<Permit>>;

    /// Returns one page of permits matching the filter, newest-created first,
    /// together with the total match count.
    async fn list_permits(
        &self,
        filter: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Permit>, i64)>;

    /// Replaces the stored permit with the given state. Unknown identifiers
    /// are not-found.
    async fn update_permit(&self, permit: &Permit) -> AppResult<()>;

    /// Removes and returns the permit. Unknown identifiers are not-found.
    async fn delete_permit(&self, permit_id: &str) -> AppResult<Permit>;
}

/// An uploaded file ready to be handed to a blob store.
#[derive(Debug, Clone)]
pub struct BlobUpload {
    /// Original client-side file name.
    pub file_name: String,
    /// Declared media type of the bytes.
    pub content_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

/// Blob bytes together with their content type.
#[derive(Debug, Clone)]
pub struct BlobContent {
    /// Media type recorded at store time.
    pub content_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

/// Polymorphic blob storage capability.
///
/// Exactly one implementation is active per deployment; the permit service
/// never depends on the concrete strategy.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores an upload and returns the reference persisted on the record.
    async fn store(&self, upload: BlobUpload) -> AppResult<String>;

    /// Returns the bytes and content type behind a stored reference.
    async fn fetch(&self, reference: &str) -> AppResult<BlobContent>;

    /// Removes a stored blob. An already-absent blob is success.
    async fn delete(&self, reference: &str) -> AppResult<()>;
}

/// Source of candidate six-digit identifier suffixes.
///
/// Injectable so tests can force deterministic collisions.
pub trait PermitIdSuffixSource: Send + Sync {
    /// Returns the next candidate suffix, within the admissible range.
    fn next_suffix(&self) -> u32;
}

/// Suffix source drawing uniformly from system entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPermitIdSuffixSource;

impl PermitIdSuffixSource for SystemPermitIdSuffixSource {
    fn next_suffix(&self) -> u32 {
        let mut bytes = [0u8; 4];
        // getrandom should not fail on supported platforms.
        getrandom::fill(&mut bytes).unwrap_or(());

        let span = PERMIT_ID_SUFFIX_MAX - PERMIT_ID_SUFFIX_MIN + 1;
        PERMIT_ID_SUFFIX_MIN + u32::from_le_bytes(bytes) % span
    }
}

/// Input for the create operation.
#[derive(Debug, Clone, Default)]
pub struct CreatePermitInput {
    /// Applicant name; required, validated by the service.
    pub full_name: Option<String>,
    /// Applicant passport number; required, validated by the service.
    pub passport_number: Option<String>,
    /// Optional demographic and employment fields.
    pub details: PermitDetails,
    /// Optional applicant photo.
    pub image: Option<BlobUpload>,
}

/// Search and pagination parameters for a permit listing.
#[derive(Debug, Clone, Default)]
pub struct PermitListQuery {
    /// Free-text filter over name, passport, employer, and job title.
    pub query: Option<String>,
    /// Requested page number; clamped to at least 1.
    pub page: Option<i64>,
    /// Requested page size; clamped to `1..=MAX_PAGE_SIZE`.
    pub limit: Option<i64>,
}

/// One page of permits plus the pagination echo.
#[derive(Debug, Clone)]
pub struct PermitPage {
    /// Records on this page, newest-created first.
    pub data: Vec<Permit>,
    /// Effective page number after clamping.
    pub page: i64,
    /// Effective page size after clamping.
    pub limit: i64,
    /// Total records matching the filter, regardless of pagination.
    pub total: i64,
}
