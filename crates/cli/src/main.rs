//! Ladera CLI - landslide population exposure

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ladera_algorithms::exposure::{ExposureParams, ExposurePipeline, HighRiskClasses, RasterInput};
use ladera_algorithms::mask::mask_with_polygons;
use ladera_algorithms::resample::align_to_reference;
use ladera_core::io::{read_boundaries, read_geojson, read_geotiff, read_metadata, write_geotiff};
use ladera_core::{Boundary, Raster, RasterMeta};
use ladera_parallel::ProcessingMode;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ladera")]
#[command(author, version, about = "Population exposure to landslide hazard", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Resample a raster to the resolution of a reference raster
    Align {
        /// Raster to resample
        input: PathBuf,
        /// Raster whose resolution is adopted
        reference: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Mask a raster with the union of all boundary polygons
    Mask {
        /// Input raster file
        input: PathBuf,
        /// Boundary GeoJSON file
        boundaries: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Export valid raster cells as longitude,latitude,value CSV (cell upper-left corners)
    Points {
        /// Input raster file
        input: PathBuf,
        /// Output CSV file
        output: PathBuf,
    },
    /// Population at risk per administrative boundary
    Exposure {
        /// Landslide hazard class raster
        #[arg(long)]
        hazard: PathBuf,
        /// Population count raster
        #[arg(long)]
        population: PathBuf,
        /// Boundary GeoJSON file
        #[arg(long)]
        boundaries: PathBuf,
        /// Output CSV file
        #[arg(short, long, default_value = "population_at_risk.csv")]
        output: PathBuf,
        /// Attribute holding the boundary name
        #[arg(long, default_value = "ADM2_EN")]
        id_field: String,
        /// Comma-separated hazard codes counted as high risk
        #[arg(long, default_value = "3,4")]
        classes: HighRiskClasses,
        /// Resample the hazard raster to this raster's resolution first
        #[arg(long)]
        align_to: Option<PathBuf>,
        /// Where to write the aligned hazard raster
        #[arg(long, requires = "align_to")]
        aligned_output: Option<PathBuf>,
        /// Worker threads (default: all cores, 1 = sequential)
        #[arg(short, long)]
        threads: Option<usize>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster = read_geotiff(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} x {}", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

fn write_raster(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path).with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn load_boundaries(path: &Path, id_field: &str) -> Result<Vec<Boundary>> {
    let boundaries = read_boundaries(path, id_field)
        .with_context(|| format!("Failed to load boundaries from {}", path.display()))?;
    info!("{} boundaries keyed by '{}'", boundaries.len(), id_field);
    Ok(boundaries)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn default_aligned_path(output: &Path) -> PathBuf {
    output.with_file_name("hazard_aligned.tif")
}

fn read_header(path: &Path) -> Result<RasterMeta> {
    let meta = read_metadata(path).with_context(|| format!("Failed to read {}", path.display()))?;
    info!(
        "{}: {} x {} {}",
        path.display(),
        meta.cols,
        meta.rows,
        meta.data_type
    );
    Ok(meta)
}

fn warn_on_crs_mismatch(hazard: &RasterMeta, population: &RasterMeta) {
    match (&hazard.crs, &population.crs) {
        (Some(a), Some(b)) if !a.is_equivalent(b) => {
            warn!("Hazard CRS {} differs from population CRS {}", a, b);
        }
        _ => {}
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn info_command(input: &Path) -> Result<()> {
    let meta = read_header(input)?;
    let raster = read_raster(input)?;
    let bounds = raster.bounds();
    let (res_x, res_y) = raster.transform().resolution();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", meta.cols, meta.rows, raster.len());
    println!("Data type: {}", meta.data_type);
    println!("Resolution: {} x {}", res_x, res_y);
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = &meta.crs {
        let kind = if crs.is_geographic() { "geographic" } else { "projected" };
        println!("CRS: {} ({})", crs, kind);
    }
    if let Some(nodata) = meta.nodata {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    if !raster.is_empty() {
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / raster.len() as f64
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn exposure_command(
    hazard: &Path,
    population: &Path,
    boundaries: &Path,
    output: &Path,
    id_field: &str,
    classes: HighRiskClasses,
    align_to: Option<&Path>,
    aligned_output: Option<&Path>,
    threads: Option<usize>,
) -> Result<()> {
    let start = Instant::now();

    let hazard_path = match align_to {
        Some(reference) => {
            let target = aligned_output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| default_aligned_path(output));
            let pb = spinner("Aligning hazard raster...");
            let aligned = align_to_reference(hazard, reference, &target)
                .with_context(|| format!("Failed to align {} to {}", hazard.display(), reference.display()))?;
            pb.finish_and_clear();
            aligned
        }
        None => hazard.to_path_buf(),
    };

    // Only the headers are read here; each boundary decodes its own window.
    let hazard_meta = read_header(&hazard_path)?;
    let population_meta = read_header(population)?;
    warn_on_crs_mismatch(&hazard_meta, &population_meta);
    let boundaries = load_boundaries(boundaries, id_field)?;

    let params = ExposureParams {
        high_risk: classes,
        mode: ProcessingMode::from_threads(threads),
    };

    let pb = ProgressBar::new(boundaries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.green} {pos}/{len} boundaries ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let ticker = pb.clone();
    let pipeline = ExposurePipeline::new(params).with_progress(move |_| ticker.inc(1));

    // Hazard codes are small integers, exact in f32
    let table = pipeline
        .run(
            RasterInput::<f32>::file(&hazard_path),
            RasterInput::<f64>::file(population),
            &boundaries,
        )
        .context("Exposure computation failed")?;
    pb.finish_and_clear();

    if table.records.is_empty() {
        warn!("No boundary produced a result; writing an empty table");
    }
    for skipped in &table.skipped {
        println!("  Skipped {}: {}", skipped.boundary, skipped.reason);
    }

    output::write_exposure_csv(&table.records, output)?;
    println!(
        "{} boundaries, {} skipped, {} people at risk",
        table.records.len(),
        table.skipped.len(),
        table.total_population()
    );
    done("Exposure table", output, start.elapsed());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => info_command(&input)?,

        Commands::Align {
            input,
            reference,
            output,
        } => {
            let start = Instant::now();
            let pb = spinner("Aligning raster...");
            align_to_reference(&input, &reference, &output)
                .with_context(|| format!("Failed to align {}", input.display()))?;
            pb.finish_and_clear();
            done("Aligned raster", &output, start.elapsed());
        }

        Commands::Mask {
            input,
            boundaries,
            output,
        } => {
            let raster = read_raster(&input)?;
            let polygons = read_geojson(&boundaries)
                .with_context(|| format!("Failed to load {}", boundaries.display()))?
                .polygons();
            if polygons.is_empty() {
                bail!("No polygons to mask with in {}", boundaries.display());
            }
            let start = Instant::now();
            let masked = mask_with_polygons(&raster, &polygons)
                .with_context(|| format!("Failed to mask {}", input.display()))?;
            let elapsed = start.elapsed();
            write_raster(&masked, &output)?;
            done("Masked raster", &output, elapsed);
        }

        Commands::Points { input, output } => {
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let count = output::write_points_csv(&raster, &output)?;
            info!("{} points written", count);
            done("Points", &output, start.elapsed());
        }

        Commands::Exposure {
            hazard,
            population,
            boundaries,
            output,
            id_field,
            classes,
            align_to,
            aligned_output,
            threads,
        } => exposure_command(
            &hazard,
            &population,
            &boundaries,
            &output,
            &id_field,
            classes,
            align_to.as_deref(),
            aligned_output.as_deref(),
            threads,
        )?,
    }

    Ok(())
}
