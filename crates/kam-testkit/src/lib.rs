//! # KAM Testkit
//!
//! Testing utilities for the KAM registry.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: isolated registries driven by a manual clock, plus a store
//!   that fails every call
//! - **Scenarios**: named grant/revoke/check scripts with expected outcomes
//! - **Generators**: Proptest strategies for identifiers, TTLs, and
//!   operation sequences
//! - **Model**: a reference model the registry is compared against
//!
//! ## Scenarios
//!
//! ```rust
//! use kam_testkit::{all_scenarios, run_scenario, TestFixture};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! for scenario in all_scenarios() {
//!     let fixture = TestFixture::new();
//!     run_scenario(&fixture, &scenario).await.unwrap();
//! }
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use kam_testkit::generators::op_sequence;
//!
//! proptest! {
//!     #[test]
//!     fn registry_matches_model(ops in op_sequence(64)) {
//!         // apply ops to a fixture and a Model, compare checks
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod scenarios;

pub use fixtures::{FailingStore, TestFixture, T0};
pub use generators::{op_sequence, Op};
pub use model::Model;
pub use scenarios::{all_scenarios, run_scenario, Scenario, ScenarioFailure, Step};
