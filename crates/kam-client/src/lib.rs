//! # KAM Client
//!
//! Typed async client for the KAM HTTP service, used by trial drivers and
//! by the server's integration tests.
//!
//! ```rust,no_run
//! use kam_client::KamClient;
//!
//! # async fn example() -> Result<(), kam_client::ClientError> {
//! let client = KamClient::new("http://127.0.0.1:8000")?;
//! client.authorize("left-pad", "dev@example.com", 3600).await?;
//!
//! let check = client.check("left-pad", "dev@example.com").await?;
//! assert!(check.authorized);
//! # Ok(())
//! # }
//! ```
//!
//! Non-2xx responses come back as [`ClientError::Api`] with the server's
//! error code, so a `storage_error` is never mistaken for a denial.

mod client;
mod error;

pub use client::{KamClient, DEFAULT_TIMEOUT};
pub use error::{ClientError, Result};

pub use kam_core::wire::{
    AllRecords, CheckResponse, HealthResponse, PackageRecords, ResetResponse, RevokeResponse,
};
pub use kam_core::{AuthorizationRecord, CheckReason, RecordId};
