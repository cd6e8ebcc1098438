//! High-risk classification

use ndarray::Array2;
use ladera_core::raster::{Raster, RasterElement};

use super::HighRiskClasses;

/// Boolean mask of cells whose hazard code is in `classes`.
///
/// Nodata cells and values that are not whole numbers are never high risk,
/// so any cell type is accepted.
pub fn classify_high_risk<T: RasterElement>(hazard: &Raster<T>, classes: &HighRiskClasses) -> Array2<bool> {
    hazard.data().map(|&code| {
        !hazard.is_nodata(code) && code.to_f64().is_some_and(|v| classes.contains_value(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_not_range() {
        let hazard = Raster::from_vec(vec![1u8, 3, 4, 2, 5, 0], 2, 3).unwrap();
        let classes = HighRiskClasses::new([1, 5]);
        let mask = classify_high_risk(&hazard, &classes);

        assert_eq!(
            mask.iter().copied().collect::<Vec<_>>(),
            vec![true, false, false, false, true, false]
        );
    }

    #[test]
    fn test_default_classes() {
        let hazard = Raster::from_vec(vec![1.0f64, 3.0, 4.0, 2.0], 2, 2).unwrap();
        let mask = classify_high_risk(&hazard, &HighRiskClasses::default());
        assert_eq!(mask.dim(), (2, 2));
        assert!(mask[(0, 1)] && mask[(1, 0)]);
        assert!(!mask[(0, 0)] && !mask[(1, 1)]);
    }

    #[test]
    fn test_nodata_never_high_risk() {
        let mut hazard = Raster::from_vec(vec![3i16, 4], 1, 2).unwrap();
        hazard.set_nodata(Some(4));
        let mask = classify_high_risk(&hazard, &HighRiskClasses::default());
        assert!(mask[(0, 0)]);
        assert!(!mask[(0, 1)]);
    }

    #[test]
    fn test_fractional_codes_never_match() {
        let hazard = Raster::from_vec(vec![3.5f32, f32::NAN, 3.0], 1, 3).unwrap();
        let mask = classify_high_risk(&hazard, &HighRiskClasses::default());
        assert_eq!(mask.iter().filter(|&&m| m).count(), 1);
        assert!(mask[(0, 2)]);
    }
}
