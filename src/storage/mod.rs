//! Storage abstraction layer for GeoSight.
//!
//! A pluggable storage system: the indexed collection and the media catalog
//! sit on any [`Storage`] backend, file system or memory.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::*;
pub use memory::*;
pub use traits::*;
