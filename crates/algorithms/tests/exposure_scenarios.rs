//! End-to-end exposure runs on small synthetic grids.
//!
//! Rasters are laid out on a 1-unit grid with the origin at the top-left
//! corner; boundaries are axis-aligned rectangles so the expected clip
//! footprints can be read straight from the coordinates.

use geo::{polygon, MultiPolygon};
use ladera_algorithms::exposure::{
    BoundaryStage, CancelToken, ExposureParams, ExposurePipeline, HighRiskClasses, RasterInput,
};
use ladera_algorithms::resample::align_to_reference;
use ladera_core::io::{read_boundaries, read_geotiff, write_geotiff};
use ladera_core::{Boundary, GeoTransform, Raster, CRS};
use ladera_parallel::ProcessingMode;
use tempfile::tempdir;

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0)
    ]])
}

/// Grid whose top-left corner is at (0, height) with square cells of `res`
fn grid<T: ladera_core::RasterElement>(
    values: Vec<T>,
    rows: usize,
    cols: usize,
    res: f64,
    nodata: T,
) -> Raster<T> {
    let mut r = Raster::from_vec(values, rows, cols).unwrap();
    r.set_transform(GeoTransform::new(0.0, rows as f64 * res, res, -res));
    r.set_nodata(Some(nodata));
    r.set_crs(Some(CRS::from_epsg(32719)));
    r
}

fn run<H, P>(
    pipeline: &ExposurePipeline,
    hazard: &Raster<H>,
    population: &Raster<P>,
    boundaries: &[Boundary],
) -> ladera_algorithms::exposure::ExposureTable
where
    H: ladera_core::RasterElement,
    P: ladera_core::RasterElement,
{
    pipeline
        .run(
            RasterInput::new(hazard, "hazard.tif"),
            RasterInput::new(population, "population.tif"),
            boundaries,
        )
        .unwrap()
}

#[test]
fn scenario_high_risk_cells_sum() {
    let hazard = grid(vec![1u8, 3, 4, 2], 2, 2, 1.0, 255);
    let population = grid(vec![10.0f32, 20.0, 30.0, 40.0], 2, 2, 1.0, -9999.0);
    let boundaries = vec![Boundary::new(0, "Quillota", rect(0.0, 0.0, 2.0, 2.0))];

    let table = run(&ExposurePipeline::default(), &hazard, &population, &boundaries);

    assert_eq!(table.records.len(), 1);
    assert_eq!(table.records[0].boundary, "Quillota");
    assert_eq!(table.records[0].population_at_risk, 50);
}

#[test]
fn scenario_no_high_risk_cells() {
    let hazard = grid(vec![1u8, 1, 2, 2], 2, 2, 1.0, 255);
    let population = grid(vec![500.0f64, 600.0, 700.0, 800.0], 2, 2, 1.0, -9999.0);
    let boundaries = vec![Boundary::new(0, "Limache", rect(0.0, 0.0, 2.0, 2.0))];

    let table = run(&ExposurePipeline::default(), &hazard, &population, &boundaries);

    assert_eq!(table.records[0].population_at_risk, 0);
}

#[test]
fn scenario_population_all_nodata() {
    let hazard = grid(vec![3u8, 4, 3, 4], 2, 2, 1.0, 255);
    let population = grid(vec![-9999.0f64; 4], 2, 2, 1.0, -9999.0);
    let boundaries = vec![Boundary::new(0, "Olmue", rect(0.0, 0.0, 2.0, 2.0))];

    let table = run(&ExposurePipeline::default(), &hazard, &population, &boundaries);

    assert_eq!(table.records[0].population_at_risk, 0);
}

#[test]
fn scenario_mismatched_clip_shapes() {
    // Same 2 x 2 unit footprint, hazard at 1.0 and population at 2/3 resolution
    let hazard = grid(vec![3u8; 4], 2, 2, 1.0, 255);
    let population = grid(vec![10.0f64; 9], 3, 3, 2.0 / 3.0, -9999.0);
    let boundaries = vec![Boundary::new(0, "La Ligua", rect(0.0, 0.0, 2.0, 2.0))];

    let table = run(&ExposurePipeline::default(), &hazard, &population, &boundaries);

    // Hazard is padded to 3 x 3 with nodata; only its original 2 x 2 corner counts.
    assert_eq!(table.records[0].population_at_risk, 40);
    assert!(table.skipped.is_empty());
}

#[test]
fn scenario_skip_boundary_outside_population() {
    let hazard = grid(vec![3u8; 8], 2, 4, 1.0, 255);
    let population = grid(vec![5.0f64; 4], 2, 2, 1.0, -9999.0);
    let boundaries = vec![
        Boundary::new(0, "West", rect(0.0, 0.0, 2.0, 2.0)),
        Boundary::new(1, "East", rect(2.0, 0.0, 4.0, 2.0)),
        Boundary::new(2, "Corner", rect(0.0, 1.0, 1.0, 2.0)),
    ];

    let table = run(&ExposurePipeline::default(), &hazard, &population, &boundaries);

    let names: Vec<&str> = table.records.iter().map(|r| r.boundary.as_str()).collect();
    assert_eq!(names, vec!["West", "Corner"]);
    assert_eq!(table.records[0].population_at_risk, 20);
    assert_eq!(table.records[1].population_at_risk, 5);

    assert_eq!(table.skipped.len(), 1);
    let skipped = &table.skipped[0];
    assert_eq!(skipped.boundary, "East");
    assert_eq!(skipped.index, 1);
    assert_eq!(skipped.stage, BoundaryStage::HazardClipped);
    assert_eq!(skipped.raster, "population.tif");
}

#[test]
fn parallel_run_keeps_input_order() {
    let (rows, cols) = (4, 24);
    let hazard = grid(vec![4i16; rows * cols], rows, cols, 1.0, -1);
    let population_values: Vec<f64> = (0..rows)
        .flat_map(|_| (0..cols).map(|c| (c + 1) as f64))
        .collect();
    let population = grid(population_values, rows, cols, 1.0, -9999.0);

    let boundaries: Vec<Boundary> = (0..cols)
        .map(|c| {
            let x = c as f64;
            Boundary::new(c, format!("strip-{:02}", c), rect(x, 0.0, x + 1.0, rows as f64))
        })
        .collect();

    let params = ExposureParams {
        high_risk: HighRiskClasses::default(),
        mode: ProcessingMode::ParallelWith(4),
    };
    let table = run(&ExposurePipeline::new(params), &hazard, &population, &boundaries);

    assert_eq!(table.records.len(), cols);
    for (c, record) in table.records.iter().enumerate() {
        assert_eq!(record.index, c);
        assert_eq!(record.boundary, format!("strip-{:02}", c));
        assert_eq!(record.population_at_risk, (rows * (c + 1)) as u64);
    }

    let sequential = run(&ExposurePipeline::default(), &hazard, &population, &boundaries);
    assert_eq!(sequential.records, table.records);
}

#[test]
fn cancelled_run_reports_unstarted_boundaries() {
    let hazard = grid(vec![3u8; 4], 2, 2, 1.0, 255);
    let population = grid(vec![1.0f64; 4], 2, 2, 1.0, -9999.0);
    let boundaries = vec![
        Boundary::new(0, "a", rect(0.0, 0.0, 1.0, 1.0)),
        Boundary::new(1, "b", rect(1.0, 1.0, 2.0, 2.0)),
    ];

    let token = CancelToken::new();
    let pipeline = ExposurePipeline::default().with_cancel_token(token.clone());
    token.cancel();

    let table = run(&pipeline, &hazard, &population, &boundaries);

    assert!(table.records.is_empty());
    assert_eq!(table.cancelled, 2);
    assert!(!table.is_complete());
}

#[test]
fn aligned_files_end_to_end() {
    let dir = tempdir().unwrap();
    let hazard_path = dir.path().join("hazard.tif");
    let population_path = dir.path().join("population.tif");
    let aligned_path = dir.path().join("hazard_aligned.tif");
    let boundary_path = dir.path().join("comunas.geojson");

    // Hazard at 1.0, population at 0.5 over the same 2 x 2 extent
    write_geotiff(&grid(vec![1u8, 3, 4, 2], 2, 2, 1.0, 255), &hazard_path).unwrap();
    write_geotiff(&grid(vec![5.0f64; 16], 4, 4, 0.5, -9999.0), &population_path).unwrap();
    std::fs::write(
        &boundary_path,
        r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"ADM2_EN": "Valparaiso"},
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]]}
            }]
        }"#,
    )
    .unwrap();

    align_to_reference(&hazard_path, &population_path, &aligned_path).unwrap();

    let hazard: Raster<f64> = read_geotiff(&aligned_path).unwrap();
    assert_eq!(hazard.shape(), (4, 4));
    assert_eq!(hazard.nodata(), Some(255.0));

    let boundaries = read_boundaries(&boundary_path, "ADM2_EN").unwrap();
    let table = ExposurePipeline::default()
        .run(
            RasterInput::<f32>::file(&aligned_path),
            RasterInput::<f64>::file(&population_path),
            &boundaries,
        )
        .unwrap();

    // Two high-risk quadrants of 4 cells, 5 people each
    assert_eq!(table.records[0].boundary, "Valparaiso");
    assert_eq!(table.records[0].population_at_risk, 40);

    // Same answer from fully decoded rasters
    let population: Raster<f64> = read_geotiff(&population_path).unwrap();
    let in_memory = run(&ExposurePipeline::default(), &hazard, &population, &boundaries);
    assert_eq!(in_memory.records, table.records);
}

#[test]
fn file_input_skip_names_the_path() {
    let dir = tempdir().unwrap();
    let hazard_path = dir.path().join("hazard.tif");
    write_geotiff(&grid(vec![3u8; 4], 2, 2, 1.0, 255), &hazard_path).unwrap();
    let missing = dir.path().join("missing_population.tif");
    let boundaries = vec![Boundary::new(0, "Petorca", rect(0.0, 0.0, 2.0, 2.0))];

    let table = ExposurePipeline::default()
        .run(
            RasterInput::<u8>::file(&hazard_path),
            RasterInput::<f64>::file(&missing),
            &boundaries,
        )
        .unwrap();

    assert!(table.records.is_empty());
    assert_eq!(table.skipped[0].raster, missing.display().to_string());
    assert_eq!(table.skipped[0].stage, BoundaryStage::HazardClipped);
}

#[test]
fn alignment_rejects_reference_without_georeferencing() {
    let dir = tempdir().unwrap();
    let hazard_path = dir.path().join("hazard.tif");
    let reference_path = dir.path().join("plain.tif");
    let output_path = dir.path().join("out.tif");
    write_geotiff(&grid(vec![1u8; 4], 2, 2, 0.01, 255), &hazard_path).unwrap();

    let file = std::fs::File::create(&reference_path).unwrap();
    let mut encoder = tiff::encoder::TiffEncoder::new(file).unwrap();
    encoder
        .write_image::<tiff::encoder::colortype::Gray32Float>(2, 2, &[1.0f32, 2.0, 3.0, 4.0])
        .unwrap();
    drop(encoder);

    let err = align_to_reference(&hazard_path, &reference_path, &output_path).unwrap_err();

    assert!(matches!(err, ladera_core::Error::RasterOpen { .. }));
    assert!(!output_path.exists());
}

#[test]
fn alignment_fails_without_reference() {
    let dir = tempdir().unwrap();
    let hazard_path = dir.path().join("hazard.tif");
    write_geotiff(&grid(vec![1u8; 4], 2, 2, 1.0, 255), &hazard_path).unwrap();

    let err = align_to_reference(
        &hazard_path,
        dir.path().join("missing.tif"),
        dir.path().join("out.tif"),
    )
    .unwrap_err();

    assert!(matches!(err, ladera_core::Error::RasterOpen { .. }));
    assert!(!dir.path().join("out.tif").exists());
}
