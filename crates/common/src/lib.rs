//! Smear Common Utilities
//!
//! Shared infrastructure for all Smear crates:
//! - Error types and result aliases
//! - Clock utilities for render-rate measurement
//! - Tracing/logging initialization
//! - Machine-local configuration loading
//! - Temp-directory layout and cleanup

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use clock::*;
pub use config::*;
pub use error::*;
