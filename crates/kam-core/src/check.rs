//! Authorization check outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::AuthorizationRecord;

/// Why a check passed or failed.
///
/// The experiment's analysis attributes each trial outcome to one of these,
/// so a bare boolean is never enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckReason {
    Valid,
    NotFound,
    Expired,
    Revoked,
}

impl CheckReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for CheckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking one (package, identity) pair at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub authorized: bool,
    pub reason: CheckReason,
    /// Unix ms the check was evaluated at.
    pub checked_at: i64,
    /// The current record for the pair, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<AuthorizationRecord>,
}

impl CheckOutcome {
    /// Evaluate the current record (or its absence) at `at`.
    pub fn evaluate(current: Option<AuthorizationRecord>, at: i64) -> Self {
        let reason = match &current {
            None => CheckReason::NotFound,
            Some(record) => record.reason_at(at),
        };
        Self {
            authorized: reason.is_authorized(),
            reason,
            checked_at: at,
            record: current,
        }
    }
}
