//! Application services and ports.

#![forbid(unsafe_code)]

mod permit_ports;
mod permit_service;

pub use permit_ports::{
    BlobContent, BlobStore, BlobUpload, CreatePermitInput, DEFAULT_PAGE_SIZE, MAX_IMAGE_BYTES,
    MAX_PAGE_SIZE, PermitIdSuffixSource, PermitListQuery, PermitPage, PermitRepository,
    SystemPermitIdSuffixSource,
};
pub use permit_service::{ID_ALLOCATION_ATTEMPTS, PermitService};
