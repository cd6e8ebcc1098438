//! Shape reconciliation of two clips
//!
//! Two rasters clipped to the same boundary can differ by a row or column
//! when their grids are not aligned. Both are padded with their own nodata
//! to the larger shape, keeping the original cells at the top-left corner.
//!
//! This is an approximation: it assumes both clips share an origin and
//! does not resample one grid onto the other. It is only sound when the two
//! sources have (nearly) the same resolution and alignment, e.g. after
//! [`resample_nearest`](crate::resample::resample_nearest).

use ndarray::{s, Array2};
use ladera_core::raster::{Raster, RasterElement};

/// Two rasters brought to one common shape
#[derive(Debug, Clone)]
pub struct ReconciledPair<A: RasterElement, B: RasterElement> {
    pub first: Raster<A>,
    pub second: Raster<B>,
}

impl<A: RasterElement, B: RasterElement> ReconciledPair<A, B> {
    /// Common (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.first.shape()
    }
}

/// Pad `raster` to at least `rows` x `cols`.
///
/// New cells take the raster's nodata (or [`RasterElement::default_nodata`]
/// when it has none, which then becomes its declared nodata). A raster
/// already of the requested shape is returned unchanged.
pub fn pad_to_shape<T: RasterElement>(raster: &Raster<T>, rows: usize, cols: usize) -> Raster<T> {
    let (src_rows, src_cols) = raster.shape();
    let (rows, cols) = (rows.max(src_rows), cols.max(src_cols));
    if (rows, cols) == (src_rows, src_cols) {
        return raster.clone();
    }

    let fill = raster.nodata().unwrap_or_else(T::default_nodata);
    let mut data = Array2::from_elem((rows, cols), fill);
    data.slice_mut(s![..src_rows, ..src_cols]).assign(raster.data());

    let mut padded = raster.with_data(data);
    padded.set_nodata(Some(fill));
    padded
}

/// Pad both rasters to `(max(rows), max(cols))`
pub fn reconcile<A, B>(first: &Raster<A>, second: &Raster<B>) -> ReconciledPair<A, B>
where
    A: RasterElement,
    B: RasterElement,
{
    let rows = first.rows().max(second.rows());
    let cols = first.cols().max(second.cols());

    ReconciledPair {
        first: pad_to_shape(first, rows, cols),
        second: pad_to_shape(second, rows, cols),
    }
}
