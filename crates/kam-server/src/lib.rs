//! # KAM Server
//!
//! The HTTP boundary of the Key Authorization Mapping service.
//!
//! | route                          | result                                   |
//! |--------------------------------|------------------------------------------|
//! | `POST /authorize`              | `201` record                             |
//! | `POST /revoke`                 | `{revoked, record?}`                     |
//! | `GET /check`, `POST /check`    | `{authorized, reason, ..., record?}`     |
//! | `GET /packages/{package_name}` | `{package_name, records}`                |
//! | `GET /records/{record_id}`     | record, or `404`                         |
//! | `GET /all`                     | `{packages: {name: [records]}}`          |
//! | `GET /health`                  | `{status: "healthy", timestamp}`         |
//! | `POST /admin/reset`            | `{removed}`                              |
//!
//! Errors are `{error, message}` with `error` one of `validation_error`
//! (400), `not_found` (404), `conflict` (409), `storage_error` (500). Errors
//! raised by the HTTP layer use the same body: `method_not_allowed` (405),
//! `request_timeout` (408), `payload_too_large` (413).

pub mod config;
pub mod error;
pub mod http;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::ApiError;
pub use http::{router, serve, AppState};
