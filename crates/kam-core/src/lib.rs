//! # KAM Core
//!
//! Pure primitives for the Key Authorization Mapping: which publisher
//! identity may sign which package, and until when.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`PackageName`] / [`Identity`] - Validated identifiers forming the lookup key
//! - [`AuthorizationRecord`] - One grant, with expiry, revocation and supersession state
//! - [`CheckOutcome`] - The answer to "is this identity authorized right now", with a [`CheckReason`]
//! - [`ValidationError`] - Malformed input, always user-correctable
//! - [`wire`] - JSON request and response bodies of the HTTP surface
//!
//! ## Time
//!
//! All timestamps are Unix epoch milliseconds (`i64`). TTLs are whole
//! seconds. Nothing in this crate reads the wall clock; callers pass `now`.

pub mod check;
pub mod error;
pub mod record;
pub mod types;
pub mod validation;
pub mod wire;

pub use check::{CheckOutcome, CheckReason};
pub use error::ValidationError;
pub use record::{AuthorizationRecord, NewGrant};
pub use types::{Identity, PackageName, RecordId};
pub use validation::{compute_expiry, MAX_IDENTIFIER_LEN, MILLIS_PER_SECOND};
