//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use kam_core::{AuthorizationRecord, Identity, NewGrant, PackageName, RecordId};

use crate::error::{Result, StoreError};
use crate::traits::{RevokeResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; each
/// mutation happens under a single write guard.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Records indexed by ID (insertion order).
    records: BTreeMap<RecordId, AuthorizationRecord>,

    /// Current index: (package, identity) -> record_id.
    current: HashMap<(PackageName, Identity), RecordId>,

    /// Next id to assign. Survives reset so ids are never reused.
    next_id: u64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                records: BTreeMap::new(),
                current: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn sorted(mut records: Vec<AuthorizationRecord>) -> Vec<AuthorizationRecord> {
        records.sort_by_key(|r| (r.granted_at, r.record_id));
        records
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_grant(&self, grant: NewGrant) -> Result<AuthorizationRecord> {
        let mut inner = self.write()?;

        let record_id = RecordId::new(inner.next_id);
        inner.next_id += 1;

        let key = (grant.package_name.clone(), grant.identity.clone());
        if let Some(previous) = inner.current.insert(key, record_id) {
            if let Some(old) = inner.records.get_mut(&previous) {
                old.superseded = true;
            }
        }

        let record = AuthorizationRecord::from_grant(record_id, grant);
        inner.records.insert(record_id, record.clone());

        Ok(record)
    }

    async fn revoke_current(
        &self,
        package_name: &PackageName,
        identity: &Identity,
        at: i64,
    ) -> Result<RevokeResult> {
        let mut inner = self.write()?;

        let key = (package_name.clone(), identity.clone());
        let Some(&record_id) = inner.current.get(&key) else {
            return Ok(RevokeResult::NotFound);
        };

        let record = inner.records.get_mut(&record_id).ok_or_else(|| {
            StoreError::InvalidData(format!("current index points at missing record {}", record_id))
        })?;

        if record.revoked {
            return Ok(RevokeResult::AlreadyRevoked(record.clone()));
        }

        record.revoked = true;
        record.revoked_at = Some(at);
        Ok(RevokeResult::Revoked(record.clone()))
    }

    async fn reset(&self) -> Result<u64> {
        let mut inner = self.write()?;
        let removed = inner.records.len() as u64;
        inner.records.clear();
        inner.current.clear();
        Ok(removed)
    }

    async fn current_record(
        &self,
        package_name: &PackageName,
        identity: &Identity,
    ) -> Result<Option<AuthorizationRecord>> {
        let inner = self.read()?;
        let key = (package_name.clone(), identity.clone());
        Ok(inner
            .current
            .get(&key)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<AuthorizationRecord>> {
        let inner = self.read()?;
        Ok(inner.records.get(&id).cloned())
    }

    async fn records_for_package(
        &self,
        package_name: &PackageName,
    ) -> Result<Vec<AuthorizationRecord>> {
        let inner = self.read()?;
        let records = inner
            .records
            .values()
            .filter(|r| &r.package_name == package_name)
            .cloned()
            .collect();
        Ok(MemoryStoreInner::sorted(records))
    }

    async fn all_records(&self) -> Result<BTreeMap<PackageName, Vec<AuthorizationRecord>>> {
        let inner = self.read()?;

        let mut packages: BTreeMap<PackageName, Vec<AuthorizationRecord>> = BTreeMap::new();
        for record in inner.records.values() {
            packages
                .entry(record.package_name.clone())
                .or_default()
                .push(record.clone());
        }

        Ok(packages
            .into_iter()
            .map(|(name, records)| (name, MemoryStoreInner::sorted(records)))
            .collect())
    }

    async fn record_count(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.records.len() as u64)
    }
}
