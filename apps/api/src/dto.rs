//! Request and response types for the HTTP API.

pub mod common;
pub mod permits;
