//! CSV writers for command output

use anyhow::{Context, Result};
use ladera_algorithms::exposure::ExposureRecord;
use ladera_core::raster::{Raster, RasterElement};
use serde::Serialize;
use std::path::Path;

/// Write the exposure table as `admin_boundary,total_population_at_risk`.
///
/// The header is written even when there are no records.
pub fn write_exposure_csv(records: &[ExposureRecord], path: &Path) -> Result<()> {
    let mut writer = create(path)?;

    writer.write_record(["admin_boundary", "total_population_at_risk"])?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Headers are written explicitly so an empty table still has them
fn create(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

#[derive(Debug, Serialize)]
struct PointRecord {
    longitude: f64,
    latitude: f64,
    value: f64,
}

/// Write one `longitude,latitude,value` row per valid cell, located at the
/// cell's upper-left corner. Returns the number of rows written.
pub fn write_points_csv<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<usize> {
    let mut writer = create(path)?;

    let mut count = 0;
    writer.write_record(["longitude", "latitude", "value"])?;
    for ((row, col), &value) in raster.data().indexed_iter() {
        if raster.is_nodata(value) {
            continue;
        }
        let Some(value) = value.to_f64() else {
            continue;
        };
        let (longitude, latitude) = raster.transform().pixel_to_geo_corner(col, row);
        writer.serialize(PointRecord {
            longitude,
            latitude,
            value,
        })?;
        count += 1;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladera_core::GeoTransform;
    use tempfile::tempdir;

    #[test]
    fn test_exposure_csv_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exposure.csv");
        let records = vec![
            ExposureRecord {
                index: 0,
                boundary: "Putaendo".into(),
                population_at_risk: 120,
            },
            ExposureRecord {
                index: 1,
                boundary: "Catemu".into(),
                population_at_risk: 0,
            },
        ];

        write_exposure_csv(&records, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert_eq!(
            text,
            "admin_boundary,total_population_at_risk\nPutaendo,120\nCatemu,0\n"
        );
    }

    #[test]
    fn test_empty_exposure_csv_keeps_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_exposure_csv(&[], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert_eq!(text, "admin_boundary,total_population_at_risk\n");
    }

    #[test]
    fn test_points_skip_nodata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let mut raster = Raster::from_vec(vec![1.0f64, -9999.0, 3.0, 4.0], 2, 2).unwrap();
        raster.set_transform(GeoTransform::new(-71.0, -32.0, 0.5, -0.5));
        raster.set_nodata(Some(-9999.0));

        let n = write_points_csv(&raster, &path).unwrap();
        assert_eq!(n, 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap(), vec!["longitude", "latitude", "value"]);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "-71.0");
        assert_eq!(&rows[0][1], "-32.0");
        assert_eq!(&rows[0][2], "1.0");
        // cell (1, 1) sits one step right and down from the origin
        assert_eq!(&rows[2][0], "-70.5");
        assert_eq!(&rows[2][1], "-32.5");
        assert_eq!(&rows[2][2], "4.0");
    }
}
