#![deny(unsafe_code)]

//! Shared test utilities for the Helmsman workspace.
//!
//! Provides reusable fixtures, a scripted command-runner fake, and tracing
//! helpers so that individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! helmsman-test-utils = { workspace = true }
//! ```

pub mod fixtures;
pub mod tracing_setup;
