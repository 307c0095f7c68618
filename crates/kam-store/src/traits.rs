//! Store trait: the abstract interface for authorization persistence.
//!
//! This trait allows the registry to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::collections::BTreeMap;

use async_trait::async_trait;
use kam_core::{AuthorizationRecord, Identity, NewGrant, PackageName, RecordId};

use crate::error::Result;

/// Result of revoking the current record of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeResult {
    /// The current record was active or expired and is now revoked.
    Revoked(AuthorizationRecord),
    /// The current record was already revoked (idempotent, not an error).
    AlreadyRevoked(AuthorizationRecord),
    /// The pair has never been granted (or the store was reset).
    NotFound,
}

impl RevokeResult {
    /// Whether this call flipped a record to revoked.
    pub fn changed(&self) -> bool {
        matches!(self, RevokeResult::Revoked(_))
    }
}

/// The Store trait: async interface for authorization persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **One current record per pair**: `insert_grant` supersedes the previous
///   current record in the same atomic step that installs the new one.
/// - **Reads are snapshots**: a read racing a write on the same pair sees
///   either the state before or after that write, never a mix.
/// - **Ordering**: per-package listings are ordered by `granted_at`, then
///   `record_id`.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a grant, superseding the pair's current record if any.
    ///
    /// Returns the new record with its assigned id.
    async fn insert_grant(&self, grant: NewGrant) -> Result<AuthorizationRecord>;

    /// Revoke the current record of a pair at time `at` (Unix ms).
    async fn revoke_current(
        &self,
        package_name: &PackageName,
        identity: &Identity,
        at: i64,
    ) -> Result<RevokeResult>;

    /// Delete every record. Returns how many were removed.
    ///
    /// Record ids are not reused after a reset.
    async fn reset(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the current (non-superseded) record of a pair.
    async fn current_record(
        &self,
        package_name: &PackageName,
        identity: &Identity,
    ) -> Result<Option<AuthorizationRecord>>;

    /// Get any record by id, current or historical.
    async fn get_record(&self, id: RecordId) -> Result<Option<AuthorizationRecord>>;

    /// All records for a package, ordered by `granted_at` then `record_id`.
    async fn records_for_package(
        &self,
        package_name: &PackageName,
    ) -> Result<Vec<AuthorizationRecord>>;

    /// Every record grouped by package, each group ordered as in
    /// [`Store::records_for_package`].
    async fn all_records(&self) -> Result<BTreeMap<PackageName, Vec<AuthorizationRecord>>>;

    /// Total number of records, including inactive ones.
    async fn record_count(&self) -> Result<u64>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Full history of one pair, oldest first.
    fn pair_history(
        &self,
        package_name: &PackageName,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<Vec<AuthorizationRecord>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn pair_history(
        &self,
        package_name: &PackageName,
        identity: &Identity,
    ) -> Result<Vec<AuthorizationRecord>> {
        let records = self.records_for_package(package_name).await?;
        Ok(records
            .into_iter()
            .filter(|r| &r.identity == identity)
            .collect())
    }
}
