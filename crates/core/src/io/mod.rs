//! Reading and writing geospatial files
//!
//! - `geotiff`: single-band GeoTIFF through the pure-Rust `tiff` crate
//! - `geojson`: boundary polygons with attributes

mod geojson;
mod geotiff;

pub use geojson::{read_boundaries, read_geojson, read_geojson_from_str};
pub use geotiff::{
    read_geotiff, read_geotiff_from_buffer, read_geotiff_window, read_metadata, write_geotiff,
    write_geotiff_to_buffer,
};
