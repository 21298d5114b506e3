//! Per-stratum design parameters: treated counts and contrast weights.
//!
//! Both are plain ordered maps keyed by stratum label. Weight "modes"
//! (size-weighted, equal-weighted, or anything else a caller supplies) are just
//! different [`StratumWeights`] values; nothing downstream branches on the mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::StratumIndex;

// ---------------------------------------------------------------------------
// Treated counts
// ---------------------------------------------------------------------------

/// Configured number of treated units per stratum (`N1_by_stratum`).
///
/// Counts are signed so that a negative entry in a configuration file survives
/// parsing and is reported as an assignment error instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreatedCounts(BTreeMap<String, i64>);

impl TreatedCounts {
    pub fn new(counts: BTreeMap<String, i64>) -> Self {
        Self(counts)
    }

    pub fn get(&self, g: &str) -> Option<i64> {
        self.0.get(g).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(g, &n)| (g.as_str(), n))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validated treated count for stratum `g` holding `size` units.
    pub fn feasible(&self, g: &str, size: usize) -> Result<usize> {
        let n1 = self
            .get(g)
            .ok_or_else(|| Error::config(format!("no treated count for stratum '{g}'")))?;
        if n1 < 0 {
            return Err(Error::assignment(format!(
                "stratum '{g}': treated count {n1} is negative"
            )));
        }
        let n1 = n1 as usize;
        if n1 > size {
            return Err(Error::assignment(format!(
                "stratum '{g}': treated count {n1} exceeds stratum size {size}"
            )));
        }
        Ok(n1)
    }

    /// Validate every stratum of `index`, in label order.
    ///
    /// Strata configured here but absent from the data are ignored.
    pub fn resolve(&self, index: &StratumIndex) -> Result<Vec<usize>> {
        let counts = index
            .iter()
            .map(|(g, rows)| self.feasible(g, rows.len()))
            .collect::<Result<Vec<_>>>()?;
        for g in self.0.keys().filter(|g| index.get(g).is_none()) {
            log::debug!("treated count for stratum '{g}' ignored: stratum not in data");
        }
        Ok(counts)
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for TreatedCounts {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(g, n)| (g.into(), n)).collect())
    }
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Stratum weight map (`lambda_by_stratum`).
///
/// No normalization is imposed: `sum_g lambda_g` need not equal 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StratumWeights(BTreeMap<String, f64>);

impl StratumWeights {
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self(weights)
    }

    /// `lambda_g = n_g / N` over the strata of `index`.
    pub fn size_weighted(index: &StratumIndex) -> Self {
        let total = index.n_units() as f64;
        index
            .iter()
            .map(|(g, rows)| (g, rows.len() as f64 / total))
            .collect()
    }

    /// `lambda_g = 1 / G` over the strata of `index`.
    pub fn equal_weighted(index: &StratumIndex) -> Self {
        let each = 1.0 / index.n_strata() as f64;
        index.strata().map(|g| (g, each)).collect()
    }

    /// Weight for stratum `g`; a missing stratum is a configuration error.
    pub fn weight(&self, g: &str) -> Result<f64> {
        self.0
            .get(g)
            .copied()
            .ok_or_else(|| Error::config(format!("no weight for stratum '{g}'")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(g, &w)| (g.as_str(), w))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Reject non-finite weights.
    pub fn validate(&self) -> Result<()> {
        match self.0.iter().find(|(_, w)| !w.is_finite()) {
            Some((g, w)) => Err(Error::config(format!(
                "weight for stratum '{g}' is not finite: {w}"
            ))),
            None => Ok(()),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for StratumWeights {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(g, w)| (g.into(), w)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feasible_counts() {
        let counts: TreatedCounts = [("a", 2), ("b", -1)].into_iter().collect();
        assert_eq!(counts.feasible("a", 5).unwrap(), 2);
        assert_eq!(counts.feasible("a", 2).unwrap(), 2);
        assert!(matches!(counts.feasible("a", 1), Err(Error::Assignment(_))));
        assert!(matches!(counts.feasible("b", 5), Err(Error::Assignment(_))));
        assert!(matches!(counts.feasible("c", 5), Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_ignores_extra_strata() {
        let index = StratumIndex::build(["a", "a", "b"]);
        let counts: TreatedCounts = [("a", 1), ("b", 0), ("zz", 4)].into_iter().collect();
        assert_eq!(counts.resolve(&index).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_derived_weights_sum_to_one() {
        let index = StratumIndex::build(["a", "a", "a", "b"]);
        let size = StratumWeights::size_weighted(&index);
        assert!((size.weight("a").unwrap() - 0.75).abs() < 1e-12);
        assert!((size.total() - 1.0).abs() < 1e-12);
        let equal = StratumWeights::equal_weighted(&index);
        assert_eq!(equal.weight("b").unwrap(), 0.5);
        assert!((equal.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_weight_is_config_error() {
        let w: StratumWeights = [("a", 1.0)].into_iter().collect();
        assert!(matches!(w.weight("b"), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_finite_weight_rejected() {
        let w: StratumWeights = [("a", f64::INFINITY)].into_iter().collect();
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_weights_parse_from_json_object() {
        let w: StratumWeights = serde_json::from_str(r#"{"low": 0.25, "high": 0.75}"#).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w.weight("high").unwrap(), 0.75);
    }
}
