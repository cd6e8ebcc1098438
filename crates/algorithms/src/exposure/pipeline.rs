//! Per-boundary exposure pipeline
//!
//! Each boundary moves through
//! `Start → HazardClipped → PopulationClipped → Reconciled → Classified → Aggregated → Recorded`,
//! or stops as `Skipped` when either clip fails. A skipped boundary never
//! aborts the batch. Boundaries share no mutable state, so they can run on a
//! worker pool; the table is still emitted in input order.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ladera_core::raster::{Raster, RasterElement};
use ladera_core::{Boundary, Error, Result};
use ladera_parallel::{ParallelStrategy, ProcessingMode};
use tracing::{debug, info, warn};

use super::{aggregate_population, classify_high_risk, reconcile, HighRiskClasses};
use crate::mask::{clip_file, clip_to_geometry};
use geo::MultiPolygon;

/// Parameters for the exposure pipeline
#[derive(Debug, Clone, Default)]
pub struct ExposureParams {
    /// Hazard codes counted as high risk
    pub high_risk: HighRiskClasses,
    /// How boundaries are distributed over workers
    pub mode: ProcessingMode,
}

/// Cooperative cancellation flag shared between a caller and the pipeline.
///
/// Checked before each boundary starts; a boundary already in progress runs
/// to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where the pipeline takes a raster's cells from
#[derive(Debug, Clone, Copy)]
pub enum RasterInput<'a, T: RasterElement> {
    /// Already decoded raster; `label` names it in log messages
    Memory { raster: &'a Raster<T>, label: &'a str },
    /// GeoTIFF on disk; each boundary decodes only its own window
    File(&'a Path),
}

impl<'a, T: RasterElement> RasterInput<'a, T> {
    pub fn new(raster: &'a Raster<T>, label: &'a str) -> Self {
        RasterInput::Memory { raster, label }
    }

    pub fn file(path: &'a Path) -> Self {
        RasterInput::File(path)
    }

    /// Name used in log messages and skip reports
    pub fn label(&self) -> String {
        match self {
            RasterInput::Memory { label, .. } => label.to_string(),
            RasterInput::File(path) => path.display().to_string(),
        }
    }

    fn clip(&self, geometry: &MultiPolygon<f64>) -> Result<Raster<T>> {
        match self {
            RasterInput::Memory { raster, .. } => clip_to_geometry(raster, geometry),
            RasterInput::File(path) => clip_file(path, geometry),
        }
    }
}

/// Processing stage of one boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryStage {
    Start,
    HazardClipped,
    PopulationClipped,
    Reconciled,
    Classified,
    Aggregated,
    Recorded,
    Skipped,
}

impl fmt::Display for BoundaryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One row of the result table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposureRecord {
    #[serde(skip)]
    pub index: usize,
    #[serde(rename = "admin_boundary")]
    pub boundary: String,
    #[serde(rename = "total_population_at_risk")]
    pub population_at_risk: u64,
}

/// A boundary that produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBoundary {
    pub index: usize,
    pub boundary: String,
    /// Last stage reached before the failure
    pub stage: BoundaryStage,
    /// Label of the raster that failed
    pub raster: String,
    pub reason: String,
}

/// Result of processing a single boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryOutcome {
    Recorded(ExposureRecord),
    Skipped(SkippedBoundary),
    /// Not started because the batch was cancelled
    Cancelled { index: usize },
}

/// Ordered output of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct ExposureTable {
    /// One record per processed boundary, in input order
    pub records: Vec<ExposureRecord>,
    /// Boundaries whose clip failed, in input order
    pub skipped: Vec<SkippedBoundary>,
    /// Boundaries not started because of cancellation
    pub cancelled: usize,
}

impl ExposureTable {
    /// Population at risk over all recorded boundaries
    pub fn total_population(&self) -> u64 {
        self.records.iter().map(|r| r.population_at_risk).sum()
    }

    /// Whether every boundary was attempted
    pub fn is_complete(&self) -> bool {
        self.cancelled == 0
    }

    fn push(&mut self, outcome: BoundaryOutcome) {
        match outcome {
            BoundaryOutcome::Recorded(record) => self.records.push(record),
            BoundaryOutcome::Skipped(skipped) => self.skipped.push(skipped),
            BoundaryOutcome::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

/// Callback receiving each boundary's outcome as soon as it is known
pub type ProgressFn = Arc<dyn Fn(&BoundaryOutcome) + Send + Sync>;

/// Computes population at risk for each boundary
#[derive(Clone, Default)]
pub struct ExposurePipeline {
    params: ExposureParams,
    cancel: CancelToken,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for ExposurePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposurePipeline")
            .field("params", &self.params)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ExposurePipeline {
    pub fn new(params: ExposureParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Use a caller-owned cancellation token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that cancels this pipeline's runs
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Report every outcome to `progress`.
    ///
    /// In parallel modes it is called from worker threads, in completion
    /// order rather than input order.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&BoundaryOutcome) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Process every boundary and assemble the result table.
    ///
    /// Clip failures are logged and listed in [`ExposureTable::skipped`];
    /// only a worker pool that cannot be built fails the run.
    pub fn run<H, P>(
        &self,
        hazard: RasterInput<'_, H>,
        population: RasterInput<'_, P>,
        boundaries: &[Boundary],
    ) -> Result<ExposureTable>
    where
        H: RasterElement,
        P: RasterElement,
    {
        info!(
            "Computing exposure for {} boundaries (high-risk classes {}, {} workers)",
            boundaries.len(),
            self.params.high_risk,
            self.params.mode.workers()
        );

        let outcomes = self
            .params
            .mode
            .par_map(0..boundaries.len(), |i| {
                let outcome = if self.cancel.is_cancelled() {
                    BoundaryOutcome::Cancelled { index: i }
                } else {
                    self.process_boundary(hazard, population, &boundaries[i])
                };
                if let Some(progress) = &self.progress {
                    progress(&outcome);
                }
                outcome
            })
            .map_err(|e| Error::Other(e.to_string()))?;

        let mut table = ExposureTable::default();
        for outcome in outcomes {
            table.push(outcome);
        }

        info!(
            "Exposure done: {} recorded, {} skipped, {} cancelled, {} people at risk",
            table.records.len(),
            table.skipped.len(),
            table.cancelled,
            table.total_population()
        );

        Ok(table)
    }

    /// Run the full stage sequence for one boundary
    pub fn process_boundary<H, P>(
        &self,
        hazard: RasterInput<'_, H>,
        population: RasterInput<'_, P>,
        boundary: &Boundary,
    ) -> BoundaryOutcome
    where
        H: RasterElement,
        P: RasterElement,
    {
        let mut stage = BoundaryStage::Start;
        let mut advance = |next: BoundaryStage| {
            debug!("{}: {} -> {}", boundary.id, stage, next);
            stage = next;
            stage
        };

        let hazard_clip = match hazard.clip(&boundary.geometry) {
            Ok(clip) => clip,
            Err(e) => return skip(boundary, BoundaryStage::Start, &hazard.label(), &e),
        };
        let reached = advance(BoundaryStage::HazardClipped);

        let population_clip = match population.clip(&boundary.geometry) {
            Ok(clip) => clip,
            Err(e) => return skip(boundary, reached, &population.label(), &e),
        };
        advance(BoundaryStage::PopulationClipped);

        if hazard_clip.shape() != population_clip.shape() {
            debug!(
                "{}: hazard clip {:?} vs population clip {:?}, padding",
                boundary.id,
                hazard_clip.shape(),
                population_clip.shape()
            );
        }
        let pair = reconcile(&hazard_clip, &population_clip);
        advance(BoundaryStage::Reconciled);

        let mask = classify_high_risk(&pair.first, &self.params.high_risk);
        let reached = advance(BoundaryStage::Classified);

        let total = match aggregate_population(
            pair.second.view(),
            pair.second.nodata(),
            mask.view(),
            &boundary.id,
        ) {
            Ok(total) => total,
            Err(e) => return skip(boundary, reached, &population.label(), &e),
        };
        advance(BoundaryStage::Aggregated);
        advance(BoundaryStage::Recorded);

        BoundaryOutcome::Recorded(ExposureRecord {
            index: boundary.index,
            boundary: boundary.id.clone(),
            population_at_risk: total.total,
        })
    }
}

fn skip(boundary: &Boundary, stage: BoundaryStage, raster: &str, err: &Error) -> BoundaryOutcome {
    warn!(
        "Error masking raster {} for {}: {}. Skipping boundary.",
        raster, boundary.id, err
    );
    debug!("{}: {} -> {}", boundary.id, stage, BoundaryStage::Skipped);

    BoundaryOutcome::Skipped(SkippedBoundary {
        index: boundary.index,
        boundary: boundary.id.clone(),
        stage,
        raster: raster.to_string(),
        reason: err.to_string(),
    })
}
