//! Error types for Ladera

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Ladera operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open raster {path}: {reason}")]
    RasterOpen { path: PathBuf, reason: String },

    #[error("cannot open vector file {path}: {reason}")]
    VectorOpen { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("geotransform is not invertible")]
    NonInvertibleTransform,

    #[error("input shapes do not overlap raster")]
    NoOverlap,

    #[error("feature {feature} has no attribute '{field}'")]
    MissingAttribute { feature: usize, field: String },

    #[error("feature {feature} has unsupported geometry type {kind}")]
    UnsupportedGeometry { feature: usize, kind: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap any error raised while opening a raster file
    pub fn raster_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::RasterOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap any error raised while opening a vector file
    pub fn vector_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::VectorOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for Ladera operations
pub type Result<T> = std::result::Result<T, Error>;
