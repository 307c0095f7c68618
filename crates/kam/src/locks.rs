//! Per-(package, identity) write serialization.
//!
//! Writes to the same pair queue behind one async mutex; writes to
//! different pairs never contend. Entries are dropped once no task holds or
//! waits on them, so the table only grows with in-flight keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use kam_core::{Identity, PackageName};
use tokio::sync::OwnedMutexGuard;

type PairKey = (PackageName, Identity);

#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    table: Mutex<HashMap<PairKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // The table holds no invariant a panicking holder could break.
    fn table(&self) -> MutexGuard<'_, HashMap<PairKey, Arc<tokio::sync::Mutex<()>>>> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for exclusive write access to a pair.
    pub(crate) async fn lock(
        &self,
        package_name: &PackageName,
        identity: &Identity,
    ) -> KeyGuard<'_> {
        let key = (package_name.clone(), identity.clone());
        let mutex = self.table().entry(key.clone()).or_default().clone();
        // Dropped with the future if the caller gives up while waiting.
        let slot = Slot {
            locks: self,
            key,
            mutex,
        };
        let guard = slot.acquire().await;
        KeyGuard {
            guard: Some(guard),
            _slot: slot,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }
}

/// One task's interest in a pair, from first wait until release.
struct Slot<'a> {
    locks: &'a KeyLocks,
    key: PairKey,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl Slot<'_> {
    async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.mutex).lock_owned().await
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        // One reference in the table, one here: no holder and no other waiter.
        if Arc::strong_count(&self.mutex) == 2
            && table
                .get(&self.key)
                .is_some_and(|entry| Arc::ptr_eq(entry, &self.mutex))
        {
            table.remove(&self.key);
        }
    }
}

/// Exclusive write access to one pair, released on drop.
pub(crate) struct KeyGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    _slot: Slot<'a>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release before the slot checks whether the entry is still in use.
        self.guard.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(package: &str, identity: &str) -> (PackageName, Identity) {
        (PackageName::new(package).unwrap(), Identity::new(identity).unwrap())
    }

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = KeyLocks::new();
        let (p, i) = key("pkg", "a@b.c");
        {
            let _guard = locks.lock(&p, &i).await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let (p, i) = key("pkg", "a@b.c");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            let (p, i) = (p.clone(), i.clone());
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(&p, &i).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let (p1, i1) = key("pkg-a", "a@b.c");
        let (p2, i2) = key("pkg-b", "a@b.c");

        let _first = locks.lock(&p1, &i1).await;
        let second = tokio::time::timeout(Duration::from_secs(1), locks.lock(&p2, &i2)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_waiter_leaves_no_entry() {
        let locks = KeyLocks::new();
        let (p, i) = key("pkg", "a@b.c");

        let holder = locks.lock(&p, &i).await;
        let mut waiter = Box::pin(locks.lock(&p, &i));
        let waited = tokio::time::timeout(Duration::from_millis(20), &mut waiter).await;
        assert!(waited.is_err());

        // Released while the waiter is still queued, then the waiter gives up.
        drop(holder);
        assert_eq!(locks.len(), 1);
        drop(waiter);
        assert_eq!(locks.len(), 0);

        let again = tokio::time::timeout(Duration::from_secs(1), locks.lock(&p, &i)).await;
        assert!(again.is_ok());
        drop(again);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_waiter_cancelled_before_release() {
        let locks = KeyLocks::new();
        let (p, i) = key("pkg", "a@b.c");

        let holder = locks.lock(&p, &i).await;
        let waited = tokio::time::timeout(Duration::from_millis(20), locks.lock(&p, &i)).await;
        assert!(waited.is_err());
        assert_eq!(locks.len(), 1);

        drop(holder);
        assert_eq!(locks.len(), 0);
    }
}
