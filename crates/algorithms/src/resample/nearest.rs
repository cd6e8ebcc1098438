//! Nearest-neighbour resampling
//!
//! Hazard rasters hold class codes, so the only admissible resampler is one
//! that copies an existing cell value: interpolating between class 2 and
//! class 4 would invent a class 3 that was never observed.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use ladera_core::io::{read_geotiff, read_metadata, write_geotiff};
use ladera_core::raster::{GeoTransform, Raster, RasterElement};
use ladera_core::{Error, Result};
use tracing::{debug, info};

/// Resolution `(pixel_width, |pixel_height|)` of a reference transform.
///
/// The absolute value handles north-up rasters whose vertical pixel size is
/// stored as a negative number.
pub fn target_resolution(reference: &GeoTransform) -> Result<(f64, f64)> {
    let resolution = reference.resolution();
    validate_resolution(resolution)?;
    Ok(resolution)
}

fn validate_resolution((xres, yres): (f64, f64)) -> Result<()> {
    if xres.is_finite() && yres.is_finite() && xres > 0.0 && yres > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name: "resolution",
            value: format!("{} x {}", xres, yres),
            reason: "pixel size must be positive and finite".into(),
        })
    }
}

/// Index of the source cell containing fractional coordinate `f`, clamped to the grid
fn source_index(f: f64, len: usize) -> usize {
    if f.is_nan() || f < 0.0 {
        0
    } else {
        (f.floor() as usize).min(len - 1)
    }
}

/// Resample a raster to a new resolution by nearest neighbour.
///
/// The output covers the source envelope with `round(extent / resolution)`
/// cells per axis, anchored at the envelope's top-left corner. Each output
/// cell takes the value of the source cell containing its centre. CRS and
/// nodata are carried over unchanged.
///
/// # Arguments
/// * `src` - Source raster
/// * `resolution` - Target `(pixel_width, pixel_height)`, both positive
pub fn resample_nearest<T: RasterElement>(src: &Raster<T>, resolution: (f64, f64)) -> Result<Raster<T>> {
    validate_resolution(resolution)?;
    if src.is_empty() {
        return Err(Error::InvalidDimensions {
            width: src.cols(),
            height: src.rows(),
        });
    }
    if !src.transform().is_invertible() {
        return Err(Error::NonInvertibleTransform);
    }

    let (xres, yres) = resolution;
    let (min_x, min_y, max_x, max_y) = src.bounds();
    let cols = ((max_x - min_x) / xres).round().max(1.0) as usize;
    let rows = ((max_y - min_y) / yres).round().max(1.0) as usize;
    let dst_transform = GeoTransform::new(min_x, max_y, xres, -yres);

    let (src_rows, src_cols) = src.shape();
    let src_transform = *src.transform();
    let cells = src.data();

    debug!(
        "Resampling {}x{} -> {}x{} at {} x {}",
        src_cols, src_rows, cols, rows, xres, yres
    );

    let data: Vec<T> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = Vec::with_capacity(cols);
            for col in 0..cols {
                let (x, y) = dst_transform.pixel_to_geo(col, row);
                let (fc, fr) = src_transform.geo_to_pixel(x, y);
                let sc = source_index(fc, src_cols);
                let sr = source_index(fr, src_rows);
                row_data.push(cells[(sr, sc)]);
            }
            row_data
        })
        .collect();

    let mut output = Raster::from_vec(data, rows, cols)?;
    output.set_transform(dst_transform);
    output.set_crs(src.crs().cloned());
    output.set_nodata(src.nodata());

    Ok(output)
}

/// Resample the raster at `source` to the resolution of the raster at
/// `reference` and write it to `output`.
///
/// Both inputs must open; otherwise [`Error::RasterOpen`] is returned and
/// nothing is written. The output keeps the source CRS.
pub fn align_to_reference(
    source: impl AsRef<Path>,
    reference: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<PathBuf> {
    let output = output.as_ref();

    let src: Raster<f64> = read_geotiff(source.as_ref())?;
    let reference_meta = read_metadata(reference.as_ref())?;
    let resolution = target_resolution(&reference_meta.transform)?;

    let aligned = resample_nearest(&src, resolution)?;
    write_geotiff(&aligned, output)?;

    info!(
        "Aligned {} to {} x {} ({} x {} cells): {}",
        source.as_ref().display(),
        resolution.0,
        resolution.1,
        aligned.cols(),
        aligned.rows(),
        output.display()
    );

    Ok(output.to_path_buf())
}
