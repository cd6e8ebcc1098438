//! # Ladera Algorithms
//!
//! Raster processing for landslide population exposure.
//!
//! ## Available Algorithm Categories
//!
//! - **resample**: nearest-neighbour resampling and raster alignment
//! - **mask**: clipping rasters to administrative polygons
//! - **exposure**: high-risk classification and per-boundary population totals

pub mod exposure;
pub mod mask;
pub mod resample;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::exposure::{
        aggregate_population, classify_high_risk, reconcile, CancelToken, ExposureParams,
        ExposurePipeline, ExposureRecord, ExposureTable, HighRiskClasses, RasterInput,
    };
    pub use crate::mask::{clip_file, clip_to_geometry, mask_with_polygons};
    pub use crate::resample::{align_to_reference, resample_nearest, target_resolution};
    pub use ladera_core::prelude::*;
}
