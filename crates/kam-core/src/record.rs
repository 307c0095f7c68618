//! Authorization records.
//!
//! A record is one grant of signing authority for a (package, identity)
//! pair. Records are never deleted during normal operation: revocation and
//! supersession only flip flags, so the full history stays available for
//! audit.

use serde::{Deserialize, Serialize};

use crate::check::CheckReason;
use crate::types::{Identity, PackageName, RecordId};

/// A grant ready to be written by a store.
///
/// The store assigns the [`RecordId`] and supersedes whatever record was
/// current for the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub package_name: PackageName,
    pub identity: Identity,
    /// Unix ms.
    pub granted_at: i64,
    /// Unix ms. The grant is valid while `now < expires_at`.
    pub expires_at: i64,
}

/// A persisted authorization grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub record_id: RecordId,
    pub package_name: PackageName,
    pub identity: Identity,
    /// Unix ms.
    pub granted_at: i64,
    /// Unix ms.
    pub expires_at: i64,
    pub revoked: bool,
    /// Unix ms of the revoke that flipped `revoked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<i64>,
    /// Set once a later grant for the same pair replaced this record.
    #[serde(default)]
    pub superseded: bool,
}

impl AuthorizationRecord {
    /// Materialize a record from a grant and its assigned id.
    pub fn from_grant(record_id: RecordId, grant: NewGrant) -> Self {
        Self {
            record_id,
            package_name: grant.package_name,
            identity: grant.identity,
            granted_at: grant.granted_at,
            expires_at: grant.expires_at,
            revoked: false,
            revoked_at: None,
            superseded: false,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Whether this record authorizes its identity at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        !self.superseded && !self.revoked && !self.is_expired(now)
    }

    /// Classify this record as the current record for its pair.
    ///
    /// Revocation wins over expiry: a revoked record reports `Revoked` even
    /// after it would have expired.
    pub fn reason_at(&self, now: i64) -> CheckReason {
        if self.revoked {
            CheckReason::Revoked
        } else if self.is_expired(now) {
            CheckReason::Expired
        } else {
            CheckReason::Valid
        }
    }

    /// Milliseconds of validity left at `now`, zero once expired.
    pub fn remaining_ms(&self, now: i64) -> i64 {
        self.expires_at.saturating_sub(now).max(0)
    }
}
