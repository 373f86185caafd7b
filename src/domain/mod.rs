//! Pure domain types with minimal dependencies
//!
//! Types here have no knowledge of windows, capture backends or OCR,
//! so every other layer can depend on them.

pub mod geometry;
pub mod selection;

pub use geometry::*;
pub use selection::*;
