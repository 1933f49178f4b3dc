//! ReelForge Common Utilities
//!
//! Shared infrastructure for all ReelForge crates:
//! - Error types and result aliases
//! - Frame/time conversions used by the render pipeline
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timing;

pub use config::*;
pub use error::*;
pub use timing::*;
