//! Random operation sequences checked against the reference model.

use kam::store::{MemoryStore, SqliteStore, Store};
use kam::CheckReason;
use kam_testkit::generators::{IDENTITIES, PACKAGES};
use kam_testkit::{op_sequence, Model, Op, TestFixture};
use proptest::prelude::*;

async fn replay<S: Store>(fixture: TestFixture<S>, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let registry = &fixture.registry;
    let mut model = Model::new();

    for op in &ops {
        match *op {
            Op::Grant { ttl_seconds, .. } => {
                let (package, identity) = op.pair().unwrap();
                model.grant(package, identity, fixture.now(), ttl_seconds);
                registry.grant(package, identity, ttl_seconds).await.unwrap();
            }
            Op::Revoke { .. } => {
                let (package, identity) = op.pair().unwrap();
                let expected = model.revoke(package, identity);
                prop_assert_eq!(registry.revoke(package, identity).await.unwrap(), expected);
            }
            Op::Check { .. } => {
                let (package, identity) = op.pair().unwrap();
                let outcome = registry.check(package, identity).await.unwrap();
                let expected = model.check(package, identity, fixture.now());
                prop_assert_eq!(outcome.reason, expected);
                prop_assert_eq!(outcome.authorized, expected == CheckReason::Valid);
            }
            Op::Advance { secs } => fixture.advance_secs(secs),
            Op::Reset => {
                let expected = model.total() as u64;
                model.reset();
                prop_assert_eq!(registry.reset().await.unwrap(), expected);
            }
        }
    }

    for package in PACKAGES {
        let records = registry.list_for_package(package).await.unwrap();
        prop_assert_eq!(records.len(), model.history_len(package));

        for identity in IDENTITIES {
            let current = records
                .iter()
                .filter(|r| r.identity.as_str() == *identity && !r.superseded)
                .count();
            prop_assert!(current <= 1);
        }
    }

    let all = registry.list_all().await.unwrap();
    prop_assert_eq!(all.values().map(Vec::len).sum::<usize>(), model.total());

    Ok(())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn memory_registry_matches_model(ops in op_sequence(48)) {
        runtime().block_on(replay(TestFixture::with_store(MemoryStore::new()), ops))?;
    }

    #[test]
    fn sqlite_registry_matches_model(ops in op_sequence(48)) {
        let store = SqliteStore::open_memory().unwrap();
        runtime().block_on(replay(TestFixture::with_store(store), ops))?;
    }
}
