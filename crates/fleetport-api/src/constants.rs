//! API constants

/// Versioned prefix for every vehicle and job route.
pub const API_PREFIX: &str = "/api/v1";

/// Server-level cap on in-flight requests.
pub const HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Room for multipart boundaries and the other form fields on top of the
/// largest accepted file.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
