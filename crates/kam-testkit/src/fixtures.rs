//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kam::{ManualClock, Registry, RegistryConfig};
use kam_core::{AuthorizationRecord, Identity, NewGrant, PackageName, RecordId};
use kam_store::{MemoryStore, RevokeResult, SqliteStore, Store, StoreError};

/// Start of every fixture's clock: 2023-11-14T22:13:20Z.
pub const T0: i64 = 1_700_000_000_000;

/// An isolated registry with a clock the test controls.
pub struct TestFixture<S: Store = MemoryStore> {
    pub clock: Arc<ManualClock>,
    pub registry: Registry<S>,
}

impl TestFixture<MemoryStore> {
    /// Registry over a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture<SqliteStore> {
    /// Registry over a fresh in-memory SQLite database.
    pub fn sqlite() -> Self {
        let store = SqliteStore::open_memory().expect("open in-memory sqlite");
        Self::with_store(store)
    }
}

impl<S: Store> TestFixture<S> {
    /// Registry over `store` with the default config.
    pub fn with_store(store: S) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    pub fn with_config(store: S, config: RegistryConfig) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let registry = Registry::with_clock(store, clock.clone(), config);
        Self { clock, registry }
    }

    pub fn now(&self) -> i64 {
        self.registry.now()
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance_secs(secs);
    }
}

/// A store whose every call fails with [`StoreError::Unavailable`].
///
/// Used to prove storage faults surface as errors rather than denials.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl FailingStore {
    fn fault<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("injected fault".into()))
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn insert_grant(&self, _grant: NewGrant) -> Result<AuthorizationRecord, StoreError> {
        Self::fault()
    }

    async fn revoke_current(
        &self,
        _package_name: &PackageName,
        _identity: &Identity,
        _at: i64,
    ) -> Result<RevokeResult, StoreError> {
        Self::fault()
    }

    async fn reset(&self) -> Result<u64, StoreError> {
        Self::fault()
    }

    async fn current_record(
        &self,
        _package_name: &PackageName,
        _identity: &Identity,
    ) -> Result<Option<AuthorizationRecord>, StoreError> {
        Self::fault()
    }

    async fn get_record(&self, _id: RecordId) -> Result<Option<AuthorizationRecord>, StoreError> {
        Self::fault()
    }

    async fn records_for_package(
        &self,
        _package_name: &PackageName,
    ) -> Result<Vec<AuthorizationRecord>, StoreError> {
        Self::fault()
    }

    async fn all_records(
        &self,
    ) -> Result<BTreeMap<PackageName, Vec<AuthorizationRecord>>, StoreError> {
        Self::fault()
    }

    async fn record_count(&self) -> Result<u64, StoreError> {
        Self::fault()
    }
}
