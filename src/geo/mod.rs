//! Geographical primitives: points, great-circle distance, bounding boxes
//! and validated polygon rings.

pub mod point;
pub mod polygon;

pub use point::*;
pub use polygon::*;
