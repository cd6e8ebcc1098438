//! Polygon masking

use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};
use rayon::prelude::*;
use std::path::Path;
use ladera_core::io::{read_geotiff_window, read_metadata};
use ladera_core::raster::{GeoTransform, Raster, RasterElement, Window};
use ladera_core::{Error, Result};

// Coordinates this close to a pixel edge are treated as on it.
const EDGE_SNAP: f64 = 1e-9;

fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < EDGE_SNAP {
        r
    } else {
        v
    }
}

/// Window covering `rect`, intersected with a `rows` x `cols` grid.
///
/// Start indices are floored and end indices ceiled so every cell the
/// rectangle touches is included. `None` if nothing overlaps.
pub fn window_for_rect(transform: &GeoTransform, rows: usize, cols: usize, rect: Rect<f64>) -> Option<Window> {
    let (min, max) = (rect.min(), rect.max());
    let corners = [
        transform.geo_to_pixel(min.x, min.y),
        transform.geo_to_pixel(min.x, max.y),
        transform.geo_to_pixel(max.x, min.y),
        transform.geo_to_pixel(max.x, max.y),
    ];

    let (mut c0, mut r0, mut c1, mut r1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for (c, r) in corners {
        if !c.is_finite() || !r.is_finite() {
            return None;
        }
        c0 = c0.min(c);
        c1 = c1.max(c);
        r0 = r0.min(r);
        r1 = r1.max(r);
    }

    let col_start = snap(c0).floor().max(0.0);
    let row_start = snap(r0).floor().max(0.0);
    let col_end = snap(c1).ceil().min(cols as f64);
    let row_end = snap(r1).ceil().min(rows as f64);

    if col_start >= col_end || row_start >= row_end {
        return None;
    }

    Some(Window::new(
        row_start as usize,
        col_start as usize,
        (row_end - row_start) as usize,
        (col_end - col_start) as usize,
    ))
}

fn geometry_window(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    geometry: &MultiPolygon<f64>,
) -> Result<Window> {
    if !transform.is_invertible() {
        return Err(Error::NonInvertibleTransform);
    }
    let rect = geometry.bounding_rect().ok_or(Error::NoOverlap)?;
    window_for_rect(transform, rows, cols, rect).ok_or(Error::NoOverlap)
}

/// Set cells whose centre lies outside `geometry` to the raster's nodata
/// (zero when none is declared) and declare that fill as nodata.
fn blank_outside<T: RasterElement>(clipped: &mut Raster<T>, geometry: &MultiPolygon<f64>) {
    let fill = clipped.nodata().unwrap_or_else(T::zero);
    let transform = *clipped.transform();
    let (rows, cols) = clipped.shape();

    let inside: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    geometry.contains(&Point::new(x, y))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    for (cell, keep) in clipped.data_mut().iter_mut().zip(inside) {
        if !keep {
            *cell = fill;
        }
    }
    clipped.set_nodata(Some(fill));
}

/// Clip a raster to a polygon.
///
/// The result is cropped to the polygon's pixel extent (see
/// [`window_for_rect`]); its transform starts at the crop origin.
/// Cells whose centre is outside the polygon are set to the raster's nodata,
/// or to zero when none is declared, and that fill becomes the result's
/// nodata.
///
/// # Errors
/// [`Error::NoOverlap`] when the polygon misses the raster entirely,
/// [`Error::NonInvertibleTransform`] for a degenerate transform.
pub fn clip_to_geometry<T: RasterElement>(raster: &Raster<T>, geometry: &MultiPolygon<f64>) -> Result<Raster<T>> {
    let (rows, cols) = raster.shape();
    let window = geometry_window(raster.transform(), rows, cols, geometry)?;

    let mut clipped = raster.window(window)?;
    blank_outside(&mut clipped, geometry);
    Ok(clipped)
}

/// Clip the raster at `path` to `geometry`, decoding only the cells under
/// the polygon's extent.
///
/// The file is opened for the header and again for the window, and closed
/// before this returns. Same result as [`clip_to_geometry`] on the whole
/// raster.
pub fn clip_file<T, P>(path: P, geometry: &MultiPolygon<f64>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let meta = read_metadata(path)?;
    let window = geometry_window(&meta.transform, meta.rows, meta.cols, geometry)?;

    let mut clipped: Raster<T> = read_geotiff_window(path, window)?;
    blank_outside(&mut clipped, geometry);
    Ok(clipped)
}

/// Mask a raster with the union of several polygons, cropped to their
/// combined extent.
pub fn mask_with_polygons<T: RasterElement>(raster: &Raster<T>, polygons: &[MultiPolygon<f64>]) -> Result<Raster<T>> {
    let union = MultiPolygon::new(
        polygons
            .iter()
            .flat_map(|mp| mp.0.iter().cloned())
            .collect(),
    );
    clip_to_geometry(raster, &union)
}
