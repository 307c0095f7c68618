//! # KAM
//!
//! The Key Authorization Mapping registry: which publisher identity is
//! authorized to sign which package, and until when.
//!
//! ## Overview
//!
//! KAM is the single source of truth consulted at both ends of a simulated
//! supply-chain trial:
//!
//! - **Publish time**: the registry side grants an identity a TTL-bounded
//!   authorization for a package
//! - **Verify time**: the consumer side checks whether the identity that
//!   signed a downloaded package is currently authorized
//!
//! ## Key Concepts
//!
//! - **Grant**: creates a record valid for `ttl_seconds`. A second grant for
//!   the same pair supersedes the first; both stay in history.
//! - **Revoke**: permanently deactivates the current record.
//! - **Check**: answers with a [`CheckReason`] (`valid`, `not_found`,
//!   `expired`, `revoked`), never a bare boolean.
//! - **Faults**: storage failures surface as [`KamError::Storage`], never as
//!   "not authorized".
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kam::{Registry, RegistryConfig};
//! use kam::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("kam.db").unwrap();
//!     let registry = Registry::new(store, RegistryConfig::default());
//!
//!     registry.grant("left-pad", "dev@example.com", 3600).await.unwrap();
//!
//!     let outcome = registry.check("left-pad", "dev@example.com").await.unwrap();
//!     assert!(outcome.authorized);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `kam::core` - Core types (AuthorizationRecord, CheckOutcome, etc.)
//! - `kam::store` - Storage abstraction and SQLite

pub mod clock;
pub mod error;
mod locks;
pub mod registry;

// Re-export component crates
pub use kam_core as core;
pub use kam_store as store;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-seams"))]
pub use clock::ManualClock;
pub use error::{KamError, Result};
pub use registry::{Registry, RegistryConfig, DEFAULT_MAX_TTL_SECONDS};

// Re-export commonly used core types
pub use kam_core::{
    AuthorizationRecord, CheckOutcome, CheckReason, Identity, PackageName, RecordId,
    ValidationError,
};
pub use kam_store::RevokeResult;
