//! # Segbuf Testkit
//!
//! Test utilities for segbuf.
//!
//! This crate provides:
//! - Fixtures for deterministic pools, filled segments and chains
//! - Property-based test generators using proptest
//! - Stress testing utilities for concurrent pool access
//!
//! ## Usage
//!
//! ```rust
//! use segbuf_testkit::prelude::*;
//!
//! let pool = isolated_pool();
//! let (chain, ids) = chain_of(&[b"hello ", b"world"]);
//! assert_eq!(ids.len(), 2);
//! assert_eq!(chain.to_vec(), b"hello world");
//! # drop(pool);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
