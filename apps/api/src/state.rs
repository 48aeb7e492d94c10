use std::sync::Arc;

use permitdesk_application::{BlobStore, PermitService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub permit_service: PermitService,
    pub blob_store: Arc<dyn BlobStore>,
}
