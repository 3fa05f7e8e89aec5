//! # TillDB Testkit
//!
//! Test utilities for TillDB.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - Tracing setup for test runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tilldb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_database() {
//!     with_test_db(|db| {
//!         // ... operations against an in-memory database
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
