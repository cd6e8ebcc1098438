//! Native GeoTIFF reading/writing
//!
//! Georeferencing is stored in the standard GeoTIFF tags (pixel scale,
//! tiepoint, key directory) and nodata in the GDAL_NODATA ASCII tag, so the
//! files open in QGIS/GDAL with their transform, EPSG code and nodata intact.
//! Cells are written as 32-bit float.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, RasterMeta, Window};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;
const SAMPLE_FORMAT: u16 = 339;
const BITS_PER_SAMPLE: u16 = 258;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read band 1 of a GeoTIFF file.
///
/// The file is opened and closed inside this call. Any failure (missing
/// file, unsupported layout, corrupt header) is reported as
/// [`Error::RasterOpen`] naming the path.
///
/// # Example
/// ```ignore
/// let population: Raster<f64> = read_geotiff("worldpop_100m.tif")?;
/// ```
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::raster_open(path, e))?;
    decode_geotiff(BufReader::new(file)).map_err(|e| Error::raster_open(path, e))
}

/// Read only the cells of `window` from band 1 of a GeoTIFF file.
///
/// Only the strips or tiles overlapping the window are decoded, so memory
/// use is bounded by the window, not the file. The returned raster's
/// transform starts at the window origin. Failures are reported as
/// [`Error::RasterOpen`], like [`read_geotiff`].
pub fn read_geotiff_window<T, P>(path: P, window: Window) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::raster_open(path, e))?;
    decode_window(BufReader::new(file), window).map_err(|e| Error::raster_open(path, e))
}

/// Read a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

/// Read shape, transform, CRS and nodata without decoding pixels.
///
/// A file without pixel scale and tiepoint tags has no usable
/// georeferencing and is rejected with [`Error::RasterOpen`].
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<RasterMeta> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::raster_open(path, e))?;
    let mut decoder =
        Decoder::new(BufReader::new(file)).map_err(|e| Error::raster_open(path, e))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::raster_open(path, e))?;

    let bits = decoder
        .get_tag_u32(tag(BITS_PER_SAMPLE))
        .unwrap_or(8);
    let format = decoder.get_tag_u32(tag(SAMPLE_FORMAT)).unwrap_or(1);

    let transform = require_transform(&mut decoder).map_err(|e| Error::raster_open(path, e))?;

    Ok(RasterMeta {
        rows: height as usize,
        cols: width as usize,
        transform,
        crs: read_crs(&mut decoder),
        nodata: read_nodata(&mut decoder),
        data_type: sample_type_name(bits, format),
    })
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let image = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;
    let data: Vec<T> = cast_samples(image)?;

    // Multi-band chunky images decode to rows * cols * bands samples; keep band 1.
    let data = match data.len() {
        n if n == rows * cols => data,
        n if rows * cols > 0 && n % (rows * cols) == 0 => {
            let bands = n / (rows * cols);
            data.into_iter().step_by(bands).collect()
        }
        _ => {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            })
        }
    };

    let transform = require_transform(&mut decoder)?;
    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_transform(transform);
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder).and_then(T::from_f64));

    Ok(raster)
}

fn decode_window<T, R>(reader: R, window: Window) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let (width, height) = (width as usize, height as usize);

    let Window { row_off, col_off, rows, cols } = window;
    if rows == 0 || cols == 0 || row_off + rows > height || col_off + cols > width {
        return Err(Error::InvalidParameter {
            name: "window",
            value: format!("{}x{} at ({}, {})", rows, cols, row_off, col_off),
            reason: format!("outside the {}x{} raster", height, width),
        });
    }

    let transform = require_transform(&mut decoder)?;

    // Strips are chunks spanning the full width; tiles are laid out row-major.
    let (chunk_w, chunk_h) = decoder.chunk_dimensions();
    let (chunk_w, chunk_h) = (chunk_w as usize, chunk_h as usize);
    let chunks_across = width.div_ceil(chunk_w);

    let mut data = vec![T::zero(); rows * cols];
    for cy in row_off / chunk_h..=(row_off + rows - 1) / chunk_h {
        for cx in col_off / chunk_w..=(col_off + cols - 1) / chunk_w {
            let index = (cy * chunks_across + cx) as u32;
            let (data_w, data_h) = decoder.chunk_data_dimensions(index);
            let (data_w, data_h) = (data_w as usize, data_h as usize);

            let chunk = decoder
                .read_chunk(index)
                .map_err(|e| Error::Other(format!("Cannot read chunk {}: {}", index, e)))?;
            let chunk: Vec<T> = cast_samples(chunk)?;

            let samples = data_w * data_h;
            if samples == 0 || chunk.len() < samples {
                return Err(Error::InvalidDimensions {
                    width: data_w,
                    height: data_h,
                });
            }
            let bands = chunk.len() / samples;

            let (x0, y0) = (cx * chunk_w, cy * chunk_h);
            for row in y0.max(row_off)..(y0 + data_h).min(row_off + rows) {
                for col in x0.max(col_off)..(x0 + data_w).min(col_off + cols) {
                    let src = ((row - y0) * data_w + (col - x0)) * bands;
                    data[(row - row_off) * cols + (col - col_off)] = chunk[src];
                }
            }
        }
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_transform(transform.shifted(col_off, row_off));
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder).and_then(T::from_f64));

    Ok(raster)
}

fn cast_samples<T: RasterElement>(image: DecodingResult) -> Result<Vec<T>> {
    let data = match image {
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::U64(buf) => cast_buffer(&buf),
        DecodingResult::I8(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        DecodingResult::I64(buf) => cast_buffer(&buf),
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };
    Ok(data)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

/// ModelPixelScale + ModelTiepoint → north-up transform
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z]; raster (I, J) sits at world (X, Y)
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn require_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    read_transform(decoder).ok_or_else(|| {
        Error::Other("no georeferencing (ModelPixelScale/ModelTiepoint tags missing)".to_string())
    })
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).ok()?;
    epsg_from_geokeys(&keys).map(CRS::from_epsg)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    text.trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .parse::<f64>()
        .ok()
}

/// EPSG code from a GeoKeyDirectory (header of 4 shorts, then 4 shorts per key)
fn epsg_from_geokeys(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    keys.get(4..4 + count * 4)?
        .chunks_exact(4)
        .filter(|entry| entry[1] == 0)
        .find(|entry| entry[0] == PROJECTED_CS_TYPE_KEY || entry[0] == GEOGRAPHIC_TYPE_KEY)
        .map(|entry| u32::from(entry[3]))
}

fn geokeys_for(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .and_then(CRS::epsg)
        .and_then(|code| u16::try_from(code).ok());
    let geographic = crs.is_some_and(CRS::is_geographic);

    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_KEY, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE_KEY, 0, 1, 1],
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

fn sample_type_name(bits: u32, format: u32) -> &'static str {
    match (format, bits) {
        (3, 64) => "f64",
        (3, _) => "f32",
        (2, 8) => "i8",
        (2, 16) => "i16",
        (2, 64) => "i64",
        (2, _) => "i32",
        (_, 16) => "u16",
        (_, 32) => "u32",
        (_, 64) => "u64",
        _ => "u8",
    }
}

/// Write a raster as a single-band float GeoTIFF
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode a raster into an in-memory GeoTIFF
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{}: {}", what, e));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("Cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tiff_err("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tiff_err("Cannot write tiepoint tag", e))?;

    let geokeys = geokeys_for(raster.crs());
    image
        .encoder()
        .write_tag(tag(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| tiff_err("Cannot write geokey tag", e))?;

    if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()) {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(tag(GDAL_NODATA), text.as_str())
            .map_err(|e| tiff_err("Cannot write nodata tag", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| tiff_err("Cannot write image data", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geokeys_roundtrip_epsg() {
        let keys = geokeys_for(Some(&CRS::from_epsg(32719)));
        assert_eq!(epsg_from_geokeys(&keys), Some(32719));

        let keys = geokeys_for(Some(&CRS::wgs84()));
        assert_eq!(epsg_from_geokeys(&keys), Some(4326));
        assert_eq!(keys[7], 2);
    }

    #[test]
    fn test_geokeys_without_crs() {
        let keys = geokeys_for(None);
        assert_eq!(keys[3], 2);
        assert_eq!(epsg_from_geokeys(&keys), None);
    }

    #[test]
    fn test_buffer_roundtrip_keeps_nodata() {
        let mut raster = Raster::from_vec(vec![1.0, 3.0, 4.0, -9999.0], 2, 2).unwrap();
        raster.set_transform(GeoTransform::new(500.0, 1000.0, 30.0, -30.0));
        raster.set_nodata(Some(-9999.0));
        raster.set_crs(Some(CRS::from_epsg(32719)));

        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(loaded.shape(), (2, 2));
        assert_eq!(loaded.get(0, 1).unwrap(), 3.0);
        assert_eq!(loaded.nodata(), Some(-9999.0));
        assert_eq!(loaded.transform(), raster.transform());
        assert_eq!(loaded.crs().and_then(CRS::epsg), Some(32719));
    }

    /// Plain TIFF with no GeoTIFF tags
    fn plain_tiff() -> Vec<u8> {
        let mut buf = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
        encoder
            .write_image::<Gray32Float>(2, 2, &[1.0f32, 2.0, 3.0, 4.0])
            .unwrap();
        buf
    }

    #[test]
    fn test_missing_georeferencing_fails() {
        let result: Result<Raster<f32>> = read_geotiff_from_buffer(&plain_tiff());
        assert!(matches!(result, Err(Error::Other(msg)) if msg.contains("georeferencing")));
    }

    #[test]
    fn test_window_read_matches_full_read() {
        let values: Vec<f64> = (0..30).map(f64::from).collect();
        let mut raster = Raster::from_vec(values, 5, 6).unwrap();
        raster.set_transform(GeoTransform::new(100.0, 50.0, 2.0, -2.0));
        raster.set_nodata(Some(-1.0));
        let bytes = write_geotiff_to_buffer(&raster).unwrap();

        let window = Window::new(1, 2, 3, 3);
        let part: Raster<f64> = decode_window(Cursor::new(&bytes[..]), window).unwrap();

        assert_eq!(part.shape(), (3, 3));
        assert_eq!(part.get(0, 0).unwrap(), 8.0);
        assert_eq!(part.get(2, 2).unwrap(), 22.0);
        assert_eq!(part.transform().origin_x, 104.0);
        assert_eq!(part.transform().origin_y, 48.0);
        assert_eq!(part.nodata(), Some(-1.0));
        assert_eq!(part.data(), raster.window(window).unwrap().data());
    }

    #[test]
    fn test_window_outside_raster_fails() {
        let raster = Raster::from_vec(vec![0.0f64; 4], 2, 2).unwrap();
        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let window = Window::new(1, 1, 2, 1);

        let result: Result<Raster<f64>> = decode_window(Cursor::new(&bytes[..]), window);
        assert!(matches!(result, Err(Error::InvalidParameter { name: "window", .. })));
    }

    #[test]
    fn test_corrupt_buffer_fails() {
        let result: Result<Raster<f64>> = read_geotiff_from_buffer(b"not a tiff");
        assert!(result.is_err());
    }
}
