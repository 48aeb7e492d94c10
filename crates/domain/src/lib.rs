//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod permit;

pub use permit::{
    PERMIT_ID_SUFFIX_MAX, PERMIT_ID_SUFFIX_MIN, PERMIT_JURISDICTION, Permit, PermitDetails,
    PermitId, PermitStatus, PermitUpdate,
};
