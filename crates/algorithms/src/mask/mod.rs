//! Clipping rasters to polygons
//!
//! - **polygon**: crop a raster to a boundary's pixel extent and blank the
//!   cells whose centre falls outside it

mod polygon;

pub use polygon::{clip_file, clip_to_geometry, mask_with_polygons, window_for_rect};
