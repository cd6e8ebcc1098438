//! Population aggregation under the high-risk mask

use ndarray::ArrayView2;
use ladera_core::raster::RasterElement;
use ladera_core::{Error, Result};
use tracing::warn;

/// Population total for one boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationTotal {
    /// Rounded, non-negative population at risk
    pub total: u64,
    /// Unrounded sum of the selected cells
    pub raw_sum: f64,
    /// Number of cells that contributed
    pub cells: usize,
    /// Whether a negative sum was clamped to zero
    pub clamped: bool,
}

/// Neumaier compensated summation
#[derive(Debug, Default)]
struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Sum population where `mask` is true.
///
/// Cells equal to `nodata` (and NaN cells) are missing and never counted;
/// the declared sentinel is trusted, so a nodata of 0 or -9999 is excluded
/// like any other. The sum is rounded half-to-even. A negative result is
/// clamped to zero with a warning naming `boundary`.
///
/// # Errors
/// [`Error::SizeMismatch`] if `population` and `mask` differ in shape.
pub fn aggregate_population<P: RasterElement>(
    population: ArrayView2<'_, P>,
    nodata: Option<P>,
    mask: ArrayView2<'_, bool>,
    boundary: &str,
) -> Result<PopulationTotal> {
    if population.dim() != mask.dim() {
        let ((er, ec), (ar, ac)) = (population.dim(), mask.dim());
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let mut sum = CompensatedSum::default();
    let mut cells = 0;

    for (&value, &high_risk) in population.iter().zip(mask.iter()) {
        if !high_risk || value.is_nodata(nodata) {
            continue;
        }
        if let Some(v) = value.to_f64().filter(|v| v.is_finite()) {
            sum.add(v);
            cells += 1;
        }
    }

    let raw_sum = sum.total();
    let rounded = raw_sum.round_ties_even();

    if rounded < 0.0 {
        warn!(
            "Negative population at risk ({:.2}) for {}. Setting to zero, check your data.",
            raw_sum, boundary
        );
        return Ok(PopulationTotal {
            total: 0,
            raw_sum,
            cells,
            clamped: true,
        });
    }

    Ok(PopulationTotal {
        total: rounded as u64,
        raw_sum,
        cells,
        clamped: false,
    })
}
