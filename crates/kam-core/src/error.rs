//! Error types for KAM Core.

use thiserror::Error;

/// Validation errors for grant inputs.
///
/// Every variant is caused by the caller and maps to a client error at the
/// HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("package_name must not be empty")]
    EmptyPackageName,

    #[error("identity must not be empty")]
    EmptyIdentity,

    #[error("{field} exceeds maximum length of {max} bytes")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains control characters")]
    ControlCharacters { field: &'static str },

    #[error("{field} has leading or trailing whitespace")]
    SurroundingWhitespace { field: &'static str },

    #[error("ttl_seconds must not be negative, got {0}")]
    NegativeTtl(i64),

    #[error("ttl_seconds {ttl} exceeds maximum of {max}")]
    TtlTooLarge { ttl: i64, max: i64 },

    #[error("expiry overflows the timestamp range")]
    ExpiryOverflow,

    #[error("malformed request: {0}")]
    Malformed(String),
}
