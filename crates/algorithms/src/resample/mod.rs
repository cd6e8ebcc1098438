//! Raster resampling
//!
//! - **nearest**: nearest-neighbour resampling to a target resolution, and
//!   file-level alignment of one raster to another raster's resolution

mod nearest;

pub use nearest::{align_to_reference, resample_nearest, target_resolution};
