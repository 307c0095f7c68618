//! # KAM Store
//!
//! Storage abstraction for authorization records. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The [`Store`] trait keeps the registry storage-agnostic. The primary
//! implementation is [`SqliteStore`], which survives process restarts; the
//! [`MemoryStore`] has identical semantics and is used by tests.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`RevokeResult`] - Result of revoking the current record of a pair
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kam_store::{SqliteStore, Store};
//! use kam_core::{Identity, NewGrant, PackageName};
//!
//! async fn example() {
//!     let store = SqliteStore::open("kam.db").unwrap();
//!
//!     let record = store
//!         .insert_grant(NewGrant {
//!             package_name: PackageName::new("left-pad").unwrap(),
//!             identity: Identity::new("dev@example.com").unwrap(),
//!             granted_at: 0,
//!             expires_at: 3_600_000,
//!         })
//!         .await
//!         .unwrap();
//!     assert!(!record.superseded);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Supersession**: inserting a grant for a pair atomically marks the
//!   previous current record `superseded`. History is kept.
//! - **No purging**: expired and revoked records stay until [`Store::reset`].
//! - **Atomic mutations**: every mutation is one transaction (SQLite) or one
//!   write-guard critical section (memory).

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{RevokeResult, Store, StoreExt};
