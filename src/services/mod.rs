//! Domain services. Each is cheap to clone and shares the SQLite pool.

pub mod attachment_service;
pub mod file_format;
pub mod file_lifecycle;
pub mod project_service;
pub mod upload_gate;

use crate::errors::{ServiceError, ServiceResult};
use uuid::Uuid;

/// Parse a path identifier. An id that is not a UUID cannot exist, so it is
/// reported through `not_found` rather than as a malformed request.
pub fn parse_id(raw: &str, not_found: fn(String) -> ServiceError) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| not_found(raw.to_string()))
}
