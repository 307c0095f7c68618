//! The Registry: the authorization store operations over a pluggable backend.
//!
//! The Registry validates input, serializes writes per (package, identity),
//! reads the injected clock, and delegates persistence to a [`Store`].

use std::collections::BTreeMap;
use std::sync::Arc;

use kam_core::{
    compute_expiry, AuthorizationRecord, CheckOutcome, Identity, NewGrant, PackageName, RecordId,
};
use kam_store::{RevokeResult, Store};

use crate::clock::{Clock, SystemClock};
use crate::error::{KamError, Result};
use crate::locks::KeyLocks;

/// Ten years.
pub const DEFAULT_MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Configuration for the Registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Upper bound on `ttl_seconds` accepted by grants.
    pub max_ttl_seconds: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_ttl_seconds: DEFAULT_MAX_TTL_SECONDS,
        }
    }
}

/// The main Registry struct.
///
/// Provides the authorization operations:
/// - Granting an identity a TTL-bounded authorization for a package
/// - Revoking the current authorization
/// - Checking authorization at a given instant, with a reason
/// - Listing history per package or for the whole store
/// - Resetting the store
///
/// The store is passed in explicitly; every test can build its own isolated
/// registry.
pub struct Registry<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Source of "now" for grants, revokes and default checks.
    clock: Arc<dyn Clock>,
    /// Configuration.
    config: RegistryConfig,
    /// Per-pair write serialization.
    locks: KeyLocks,
}

impl<S: Store> Registry<S> {
    /// Create a registry reading wall-clock time.
    pub fn new(store: S, config: RegistryConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Create a registry with an injected clock.
    pub fn with_clock(store: S, clock: Arc<dyn Clock>, config: RegistryConfig) -> Self {
        Self::from_shared(Arc::new(store), clock, config)
    }

    /// Create a registry over a store that is shared elsewhere.
    pub fn from_shared(store: Arc<S>, clock: Arc<dyn Clock>, config: RegistryConfig) -> Self {
        Self {
            store,
            clock,
            config,
            locks: KeyLocks::new(),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Current time according to the registry's clock (Unix ms).
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Authorize `identity` to sign `package_name` for `ttl_seconds`.
    ///
    /// Supersedes the pair's current record. A zero TTL produces a record
    /// that is already expired.
    pub async fn grant(
        &self,
        package_name: &str,
        identity: &str,
        ttl_seconds: i64,
    ) -> Result<AuthorizationRecord> {
        let package_name = PackageName::new(package_name)?;
        let identity = Identity::new(identity)?;

        let _guard = self.locks.lock(&package_name, &identity).await;

        let granted_at = self.now();
        let expires_at = compute_expiry(granted_at, ttl_seconds, self.config.max_ttl_seconds)?;

        let record = self
            .store
            .insert_grant(NewGrant {
                package_name,
                identity,
                granted_at,
                expires_at,
            })
            .await
            .map_err(|e| log_store_error("grant", e))?;

        tracing::info!(
            package = %record.package_name,
            identity = %record.identity,
            record_id = %record.record_id,
            ttl_seconds,
            expires_at = record.expires_at,
            "granted authorization"
        );

        Ok(record)
    }

    /// Revoke the pair's current record.
    ///
    /// Returns `true` if this call revoked a record; `false` when there is
    /// nothing to revoke (never granted, or already revoked).
    pub async fn revoke(&self, package_name: &str, identity: &str) -> Result<bool> {
        Ok(self.revoke_detailed(package_name, identity).await?.changed())
    }

    /// Revoke the pair's current record, reporting what was found.
    pub async fn revoke_detailed(
        &self,
        package_name: &str,
        identity: &str,
    ) -> Result<RevokeResult> {
        let package_name = PackageName::new(package_name)?;
        let identity = Identity::new(identity)?;

        let _guard = self.locks.lock(&package_name, &identity).await;

        let at = self.now();
        let result = self
            .store
            .revoke_current(&package_name, &identity, at)
            .await
            .map_err(|e| log_store_error("revoke", e))?;

        match &result {
            RevokeResult::Revoked(record) => tracing::info!(
                package = %package_name,
                identity = %identity,
                record_id = %record.record_id,
                "revoked authorization"
            ),
            RevokeResult::AlreadyRevoked(record) => tracing::debug!(
                package = %package_name,
                identity = %identity,
                record_id = %record.record_id,
                "authorization already revoked"
            ),
            RevokeResult::NotFound => tracing::debug!(
                package = %package_name,
                identity = %identity,
                "nothing to revoke"
            ),
        }

        Ok(result)
    }

    /// Administrative reset: delete every record.
    pub async fn reset(&self) -> Result<u64> {
        let removed = self
            .store
            .reset()
            .await
            .map_err(|e| log_store_error("reset", e))?;
        tracing::warn!(removed, "authorization store reset");
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Check authorization now, according to the registry's clock.
    pub async fn check(&self, package_name: &str, identity: &str) -> Result<CheckOutcome> {
        self.check_at(package_name, identity, self.now()).await
    }

    /// Check authorization at `at` (Unix ms).
    ///
    /// Pure read. The outcome carries the current record, if any, so the
    /// caller can tell `expired` from `revoked` from `not_found`.
    pub async fn check_at(
        &self,
        package_name: &str,
        identity: &str,
        at: i64,
    ) -> Result<CheckOutcome> {
        let package_name = PackageName::new(package_name)?;
        let identity = Identity::new(identity)?;

        let current = self
            .store
            .current_record(&package_name, &identity)
            .await
            .map_err(|e| log_store_error("check", e))?;

        let outcome = CheckOutcome::evaluate(current, at);
        tracing::debug!(
            package = %package_name,
            identity = %identity,
            at,
            reason = %outcome.reason,
            "checked authorization"
        );

        Ok(outcome)
    }

    /// Boolean form of [`Registry::check_at`].
    pub async fn is_authorized(&self, package_name: &str, identity: &str, at: i64) -> Result<bool> {
        Ok(self.check_at(package_name, identity, at).await?.authorized)
    }

    /// Every record for a package, active or not, oldest grant first.
    pub async fn list_for_package(&self, package_name: &str) -> Result<Vec<AuthorizationRecord>> {
        let package_name = PackageName::new(package_name)?;
        self.store
            .records_for_package(&package_name)
            .await
            .map_err(|e| log_store_error("list_for_package", e))
    }

    /// Every record in the store, grouped by package.
    pub async fn list_all(&self) -> Result<BTreeMap<PackageName, Vec<AuthorizationRecord>>> {
        self.store
            .all_records()
            .await
            .map_err(|e| log_store_error("list_all", e))
    }

    /// Look up one record by id.
    pub async fn get_record(&self, id: RecordId) -> Result<AuthorizationRecord> {
        self.store
            .get_record(id)
            .await
            .map_err(|e| log_store_error("get_record", e))?
            .ok_or_else(|| KamError::NotFound(format!("record {}", id)))
    }
}

fn log_store_error(op: &'static str, err: kam_store::StoreError) -> KamError {
    tracing::error!(op, error = %err, "store operation failed");
    KamError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use kam_core::{CheckReason, ValidationError};
    use kam_store::MemoryStore;

    const T0: i64 = 1_700_000_000_000;

    fn registry() -> (Registry<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let registry =
            Registry::with_clock(MemoryStore::new(), clock.clone(), RegistryConfig::default());
        (registry, clock)
    }

    #[tokio::test]
    async fn test_grant_then_check_is_valid() {
        let (registry, _clock) = registry();

        let record = registry.grant("left-pad", "dev@example.com", 3600).await.unwrap();
        assert_eq!(record.granted_at, T0);
        assert_eq!(record.expires_at, T0 + 3_600_000);

        let outcome = registry.check("left-pad", "dev@example.com").await.unwrap();
        assert!(outcome.authorized);
        assert_eq!(outcome.reason, CheckReason::Valid);
        assert_eq!(outcome.record.unwrap().record_id, record.record_id);
    }

    #[tokio::test]
    async fn test_expired_after_ttl() {
        let (registry, clock) = registry();
        registry.grant("left-pad", "dev@example.com", 3600).await.unwrap();

        clock.advance_secs(3601);
        let outcome = registry.check("left-pad", "dev@example.com").await.unwrap();
        assert!(!outcome.authorized);
        assert_eq!(outcome.reason, CheckReason::Expired);
        assert!(outcome.record.is_some());
    }

    #[tokio::test]
    async fn test_check_at_explicit_time() {
        let (registry, _clock) = registry();
        registry.grant("pkg", "a@b.c", 10).await.unwrap();

        assert!(registry.is_authorized("pkg", "a@b.c", T0 + 9_999).await.unwrap());
        assert!(!registry.is_authorized("pkg", "a@b.c", T0 + 10_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_then_check() {
        let (registry, _clock) = registry();
        registry.grant("pkg-a", "alice@x.com", 7200).await.unwrap();

        assert!(registry.revoke("pkg-a", "alice@x.com").await.unwrap());
        let outcome = registry.check("pkg-a", "alice@x.com").await.unwrap();
        assert!(!outcome.authorized);
        assert_eq!(outcome.reason, CheckReason::Revoked);

        // Idempotent
        assert!(!registry.revoke("pkg-a", "alice@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_without_record_is_false() {
        let (registry, _clock) = registry();
        assert!(!registry.revoke("ghost", "nobody@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_never_granted_is_not_found() {
        let (registry, _clock) = registry();
        let outcome = registry.check("pkg", "a@b.c").await.unwrap();
        assert_eq!(outcome.reason, CheckReason::NotFound);
        assert!(outcome.record.is_none());
    }

    #[tokio::test]
    async fn test_regrant_after_revoke_restores_access() {
        let (registry, clock) = registry();
        registry.grant("pkg", "a@b.c", 60).await.unwrap();
        registry.revoke("pkg", "a@b.c").await.unwrap();

        clock.advance_secs(1);
        registry.grant("pkg", "a@b.c", 60).await.unwrap();

        let outcome = registry.check("pkg", "a@b.c").await.unwrap();
        assert_eq!(outcome.reason, CheckReason::Valid);

        let history = registry.list_for_package("pkg").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].revoked && history[0].superseded);
        assert!(!history[1].revoked && !history[1].superseded);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_expired_at_grant() {
        let (registry, _clock) = registry();
        let record = registry.grant("pkg", "a@b.c", 0).await.unwrap();
        assert_eq!(record.expires_at, record.granted_at);

        let outcome = registry.check("pkg", "a@b.c").await.unwrap();
        assert_eq!(outcome.reason, CheckReason::Expired);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (registry, _clock) = registry();

        let err = registry.grant("", "a@b.c", 10).await.unwrap_err();
        assert!(matches!(err, KamError::Validation(ValidationError::EmptyPackageName)));

        let err = registry.grant("pkg", "", 10).await.unwrap_err();
        assert!(matches!(err, KamError::Validation(ValidationError::EmptyIdentity)));

        let err = registry.grant("pkg", "a@b.c", -5).await.unwrap_err();
        assert!(matches!(err, KamError::Validation(ValidationError::NegativeTtl(-5))));

        let err = registry
            .grant("pkg", "a@b.c", DEFAULT_MAX_TTL_SECONDS + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, KamError::Validation(ValidationError::TtlTooLarge { .. })));

        let err = registry.check("pkg", "").await.unwrap_err();
        assert_eq!(err.code(), "validation_error");

        assert_eq!(registry.store().record_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_max_ttl() {
        let clock = Arc::new(ManualClock::new(T0));
        let registry = Registry::with_clock(
            MemoryStore::new(),
            clock,
            RegistryConfig { max_ttl_seconds: 60 },
        );
        assert!(registry.grant("pkg", "a@b.c", 60).await.is_ok());
        assert!(registry.grant("pkg", "a@b.c", 61).await.is_err());
    }

    #[tokio::test]
    async fn test_get_record_not_found() {
        let (registry, _clock) = registry();
        let record = registry.grant("pkg", "a@b.c", 10).await.unwrap();
        assert_eq!(registry.get_record(record.record_id).await.unwrap(), record);

        let err = registry.get_record(RecordId::new(999)).await.unwrap_err();
        assert!(matches!(err, KamError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_all_and_reset() {
        let (registry, _clock) = registry();
        registry.grant("pkg-a", "a@b.c", 10).await.unwrap();
        registry.grant("pkg-b", "b@b.c", 0).await.unwrap();
        registry.grant("pkg-b", "c@b.c", 10).await.unwrap();
        registry.revoke("pkg-b", "c@b.c").await.unwrap();

        let all = registry.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.values().map(Vec::len).sum::<usize>(), 3);

        assert_eq!(registry.reset().await.unwrap(), 3);
        assert!(registry.list_all().await.unwrap().is_empty());
        assert_eq!(
            registry.check("pkg-a", "a@b.c").await.unwrap().reason,
            CheckReason::NotFound
        );
    }

    #[tokio::test]
    async fn test_locks_released_after_operations() {
        let (registry, _clock) = registry();
        registry.grant("pkg", "a@b.c", 10).await.unwrap();
        registry.revoke("pkg", "a@b.c").await.unwrap();
        assert_eq!(registry.locks.len(), 0);
    }
}
