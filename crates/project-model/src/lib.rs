//! ReelForge Project Model
//!
//! Defines the data contracts a reel is described with:
//! - **Descriptors:** one timeline entry's range, media kind, and entry transition
//! - **Timelines:** ordered entries per timeline kind, loaded from and saved to JSON
//! - **Segments:** plain `[start, end)` trim ranges used by the fast concatenation path
//!
//! All times are in seconds relative to the start of the source file.

pub mod descriptor;
pub mod segment;
pub mod timeline;

pub use descriptor::*;
pub use segment::*;
pub use timeline::*;
