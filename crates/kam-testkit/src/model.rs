//! Reference model of the registry's observable behavior.

use std::collections::HashMap;

use kam_core::{CheckReason, MILLIS_PER_SECOND};

#[derive(Debug, Clone, Copy)]
struct Current {
    expires_at: i64,
    revoked: bool,
}

/// Current-record state per pair plus a history count per package.
#[derive(Debug, Default)]
pub struct Model {
    current: HashMap<(String, String), Current>,
    history: HashMap<String, usize>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, package: &str, identity: &str, now: i64, ttl_seconds: i64) {
        self.current.insert(
            (package.to_owned(), identity.to_owned()),
            Current {
                expires_at: now + ttl_seconds * MILLIS_PER_SECOND,
                revoked: false,
            },
        );
        *self.history.entry(package.to_owned()).or_default() += 1;
    }

    /// Returns whether the revoke changed anything.
    pub fn revoke(&mut self, package: &str, identity: &str) -> bool {
        match self.current.get_mut(&(package.to_owned(), identity.to_owned())) {
            Some(current) if !current.revoked => {
                current.revoked = true;
                true
            }
            _ => false,
        }
    }

    pub fn check(&self, package: &str, identity: &str, at: i64) -> CheckReason {
        match self.current.get(&(package.to_owned(), identity.to_owned())) {
            None => CheckReason::NotFound,
            Some(current) if current.revoked => CheckReason::Revoked,
            Some(current) if at >= current.expires_at => CheckReason::Expired,
            Some(_) => CheckReason::Valid,
        }
    }

    /// Number of records `list_for_package` should return.
    pub fn history_len(&self, package: &str) -> usize {
        self.history.get(package).copied().unwrap_or(0)
    }

    /// Total records across all packages.
    pub fn total(&self) -> usize {
        self.history.values().sum()
    }

    /// Forget every record, like [`kam::Registry::reset`].
    pub fn reset(&mut self) {
        self.current.clear();
        self.history.clear();
    }
}
