//! JSON bodies exchanged over the HTTP surface.
//!
//! Request identifiers are plain strings: validation belongs to the
//! registry, so a malformed name reaches it and comes back as a
//! `validation_error` instead of failing deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::check::{CheckOutcome, CheckReason};
use crate::record::AuthorizationRecord;
use crate::types::PackageName;

/// `POST /authorize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub package_name: String,
    pub identity: String,
    pub ttl_seconds: i64,
}

/// `POST /revoke`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRequest {
    pub package_name: String,
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeResponse {
    pub revoked: bool,
    /// The record this call revoked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<AuthorizationRecord>,
}

/// `GET /check` query or `POST /check` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub package_name: String,
    pub identity: String,
    /// Unix ms; the server's clock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub authorized: bool,
    pub reason: CheckReason,
    pub package_name: String,
    pub identity: String,
    pub checked_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<AuthorizationRecord>,
}

impl CheckResponse {
    pub fn new(package_name: String, identity: String, outcome: CheckOutcome) -> Self {
        Self {
            authorized: outcome.authorized,
            reason: outcome.reason,
            package_name,
            identity,
            checked_at: outcome.checked_at,
            record: outcome.record,
        }
    }
}

/// `GET /packages/{package_name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecords {
    pub package_name: String,
    pub records: Vec<AuthorizationRecord>,
}

/// `GET /all`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllRecords {
    pub packages: BTreeMap<PackageName, Vec<AuthorizationRecord>>,
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
}

/// `POST /admin/reset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub removed: u64,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// `validation_error`, `not_found`, `conflict` or `storage_error` from the
    /// registry; `method_not_allowed`, `request_timeout` or
    /// `payload_too_large` from the HTTP layer.
    pub error: String,
    pub message: String,
}
