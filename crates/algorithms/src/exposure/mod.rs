//! Population exposure to landslide hazard
//!
//! Per boundary: clip both rasters, reconcile their shapes, flag high-risk
//! hazard cells and sum the population underneath them.
//!
//! - **classes**: the configured set of high-risk hazard codes
//! - **reconcile**: nodata padding of two clips to a common shape
//! - **classify**: boolean high-risk mask
//! - **aggregate**: nodata-aware, non-negative population total
//! - **pipeline**: per-boundary orchestration and the result table

mod aggregate;
mod classes;
mod classify;
mod pipeline;
mod reconcile;

pub use aggregate::{aggregate_population, PopulationTotal};
pub use classes::HighRiskClasses;
pub use classify::classify_high_risk;
pub use pipeline::{
    BoundaryOutcome, BoundaryStage, CancelToken, ExposureParams, ExposurePipeline, ExposureRecord,
    ExposureTable, ProgressFn, RasterInput, SkippedBoundary,
};
pub use reconcile::{pad_to_shape, reconcile, ReconciledPair};
