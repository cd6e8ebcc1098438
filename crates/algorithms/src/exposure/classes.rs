//! High-risk hazard classes

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ladera_core::Error;

/// Set of integer hazard codes counted as high risk.
///
/// Membership is an exact set test, so codes need not be contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighRiskClasses(BTreeSet<i64>);

impl HighRiskClasses {
    pub fn new(codes: impl IntoIterator<Item = i64>) -> Self {
        Self(codes.into_iter().collect())
    }

    pub fn contains(&self, code: i64) -> bool {
        self.0.contains(&code)
    }

    /// Membership of a raw cell value. Non-integral or non-finite values never match.
    pub fn contains_value(&self, value: f64) -> bool {
        value.is_finite()
            && value.fract() == 0.0
            && value >= i64::MIN as f64
            && value <= i64::MAX as f64
            && self.0.contains(&(value as i64))
    }

    pub fn codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for HighRiskClasses {
    fn default() -> Self {
        Self::new([3, 4])
    }
}

impl fmt::Display for HighRiskClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", codes.join(", "))
    }
}

/// Parses a comma-separated list such as `3,4`
impl FromStr for HighRiskClasses {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let codes = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>().map_err(|e| Error::InvalidParameter {
                    name: "high_risk_classes",
                    value: part.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        if codes.is_empty() {
            return Err(Error::InvalidParameter {
                name: "high_risk_classes",
                value: s.to_string(),
                reason: "at least one class code is required".into(),
            });
        }
        Ok(Self(codes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_and_four() {
        let classes = HighRiskClasses::default();
        assert!(classes.contains(3));
        assert!(classes.contains(4));
        assert!(!classes.contains(2));
        assert_eq!(classes.to_string(), "{3, 4}");
    }

    #[test]
    fn test_value_membership() {
        let classes = HighRiskClasses::new([1, 5]);
        assert!(classes.contains_value(5.0));
        assert!(!classes.contains_value(3.0));
        assert!(!classes.contains_value(4.5));
        assert!(!classes.contains_value(f64::NAN));
    }

    #[test]
    fn test_parse() {
        let classes: HighRiskClasses = " 4, 3,4 ".parse().unwrap();
        assert_eq!(classes.codes().collect::<Vec<_>>(), vec![3, 4]);
        assert!("3,x".parse::<HighRiskClasses>().is_err());
        assert!("".parse::<HighRiskClasses>().is_err());
    }
}
