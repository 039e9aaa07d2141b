#![allow(unused_imports)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: Call sites used across tests and the request fixture files
//! - `setup`: Runtimes with implementation methods registered, and
//!   metafactories over them

pub mod fixtures;
pub mod setup;

pub use fixtures::{fixture_path, mt, FIXTURE_DIR};
pub use setup::{acme_runtime, metafactory, metafactory_with};
