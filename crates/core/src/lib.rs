//! # Ladera Core
//!
//! Shared data types and I/O for the Ladera landslide exposure toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: single-band georeferenced grid
//! - `GeoTransform`: affine pixel/world mapping
//! - `CRS`: coordinate reference system tag
//! - `Boundary`: administrative polygon keyed by an identifier attribute
//! - GeoTIFF and GeoJSON readers/writers

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement, RasterMeta, Window};
pub use vector::Boundary;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, RasterMeta, Window};
    pub use crate::vector::{AttributeValue, Boundary, Feature, FeatureCollection};
}
