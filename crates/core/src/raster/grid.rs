//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{s, Array2, ArrayView2};

/// A single-band georeferenced grid.
///
/// Cells are stored row-major as `(row, col)`. The transform, CRS and
/// nodata sentinel travel with the data so that crops and resamples stay
/// georeferenced.
///
/// # Example
///
/// ```ignore
/// use ladera_core::Raster;
///
/// let mut hazard: Raster<u8> = Raster::new(2, 2);
/// hazard.set(0, 1, 3)?;
/// hazard.set_nodata(Some(255));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

/// Cell range of a raster: `rows` x `cols` cells starting at (`row_off`, `col_off`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    pub fn new(row_off: usize, col_off: usize, rows: usize, cols: usize) -> Self {
        Self { row_off, col_off, rows, cols }
    }
}

/// Descriptive metadata of a raster, independent of its cell type
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMeta {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    /// Declared nodata, widened to f64
    pub nodata: Option<f64>,
    /// Storage type of the cells, e.g. `"f32"`
    pub data_type: &'static str,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Same georeferencing and nodata, new cell array
    pub fn with_data(&self, data: Array2<T>) -> Self {
        Self {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster has no cells
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Copy of the cells inside `window`.
    ///
    /// The transform of the result is anchored at the window's top-left corner.
    pub fn window(&self, window: Window) -> Result<Self> {
        let Window { row_off, col_off, rows, cols } = window;
        let row_end = row_off + rows;
        let col_end = col_off + cols;
        if rows == 0 || cols == 0 || row_end > self.rows() || col_end > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row_end.saturating_sub(1),
                col: col_end.saturating_sub(1),
                rows: self.rows(),
                cols: self.cols(),
            });
        }

        let data = self.data.slice(s![row_off..row_end, col_off..col_end]).to_owned();
        let mut out = self.with_data(data);
        out.transform = self.transform.shifted(col_off, row_off);
        Ok(out)
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Metadata snapshot (shape, transform, CRS, nodata, cell type)
    pub fn meta(&self) -> RasterMeta {
        RasterMeta {
            rows: self.rows(),
            cols: self.cols(),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata.and_then(|nd| nd.to_f64()),
            data_type: T::TYPE_NAME,
        }
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Min, max, mean and counts over valid cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum = 0.0;
        let mut count = 0usize;

        for &value in self.data.iter().filter(|v| !self.is_nodata(**v)) {
            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        assert!(Raster::<u8>::from_vec(vec![1, 2, 3], 2, 2).is_err());
    }

    #[test]
    fn test_set_out_of_bounds() {
        let mut raster: Raster<u8> = Raster::new(2, 2);
        assert!(raster.set(2, 0, 1).is_err());
        raster.set(1, 1, 4).unwrap();
        assert_eq!(raster.get(1, 1).unwrap(), 4);
    }

    #[test]
    fn test_window_moves_origin() {
        let mut raster = Raster::from_vec((0..12).map(|v| v as f64).collect(), 3, 4).unwrap();
        raster.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        raster.set_nodata(Some(-1.0));

        let win = raster.window(Window::new(1, 2, 2, 2)).unwrap();
        assert_eq!(win.shape(), (2, 2));
        assert_eq!(win.get(0, 0).unwrap(), 6.0);
        assert_eq!(win.get(1, 1).unwrap(), 11.0);
        assert_eq!(win.transform().origin_x, 20.0);
        assert_eq!(win.transform().origin_y, 20.0);
        assert_eq!(win.nodata(), Some(-1.0));

        assert!(raster.window(Window::new(2, 0, 2, 1)).is_err());
    }

    #[test]
    fn test_meta_reports_type() {
        let mut raster: Raster<u8> = Raster::new(3, 2);
        raster.set_nodata(Some(255));
        let meta = raster.meta();
        assert_eq!((meta.rows, meta.cols), (3, 2));
        assert_eq!(meta.nodata, Some(255.0));
        assert_eq!(meta.data_type, "u8");
    }

    #[test]
    fn test_statistics_skip_nodata() {
        let mut raster = Raster::from_vec(vec![1.0, 2.0, -9999.0, 5.0], 2, 2).unwrap();
        raster.set_nodata(Some(-9999.0));

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(5.0));
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.nodata_count, 1);
    }
}
