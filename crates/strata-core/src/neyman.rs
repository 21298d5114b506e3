//! Neyman inference for the weighted stratified estimator.
//!
//! For each stratum `g` present in the data:
//!
//! ```text
//! tau_g = mean(y | z=1, g) - mean(y | z=0, g)
//! V_g   = s2_tg / n_tg + s2_cg / n_cg
//! ```
//!
//! The estimator is `tau_hat = sum_g lambda_g * tau_g` with conservative
//! standard error `sqrt(sum_g lambda_g^2 * V_g)`. The unidentified covariance
//! of the potential outcomes is dropped, which can only overstate the
//! variance. Intervals use the standard normal quantile.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::design::StratumWeights;
use crate::error::{Error, Result};
use crate::statistics::{StratumContrast, stratum_contrasts};
use crate::table::ObservedData;

/// Point estimate, standard error and interval (`neyman_*` in the results).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedAteEstimate {
    pub tau_hat: f64,
    pub se_hat: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl WeightedAteEstimate {
    pub fn contains(&self, value: f64) -> bool {
        self.ci_lower <= value && value <= self.ci_upper
    }

    pub fn width(&self) -> f64 {
        self.ci_upper - self.ci_lower
    }
}

/// Weighted contrast and Neyman variance of one stratum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratumTerm {
    pub stratum: String,
    pub weight: f64,
    pub tau: f64,
    pub variance: f64,
}

/// Per-stratum terms, failing on a missing weight or an arm with fewer than
/// two units.
pub fn stratum_terms(
    data: &ObservedData,
    lambda_by_stratum: &StratumWeights,
) -> Result<Vec<StratumTerm>> {
    let contrasts = stratum_contrasts(data)?;
    contrasts
        .into_iter()
        .map(|StratumContrast { stratum, contrast }| {
            let weight = lambda_by_stratum.weight(&stratum)?;
            let variance = contrast.neyman_variance().ok_or_else(|| {
                Error::insufficient(format!(
                    "stratum '{stratum}': Neyman variance needs >= 2 units per arm (treated={}, control={})",
                    contrast.treated.n, contrast.control.n
                ))
            })?;
            Ok(StratumTerm {
                tau: contrast.difference(),
                stratum,
                weight,
                variance,
            })
        })
        .collect()
}

fn combine_se(terms: &[StratumTerm]) -> f64 {
    terms
        .iter()
        .map(|t| t.weight * t.weight * t.variance)
        .sum::<f64>()
        .sqrt()
}

/// Conservative Neyman standard error of the weighted estimator.
pub fn neyman_se_stratified(
    data: &ObservedData,
    lambda_by_stratum: &StratumWeights,
) -> Result<f64> {
    Ok(combine_se(&stratum_terms(data, lambda_by_stratum)?))
}

/// Two-sided standard normal critical value `z_{1 - alpha/2}`.
pub fn normal_critical_value(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::config(format!("alpha must be in (0, 1), got {alpha}")));
    }
    let norm = Normal::standard();
    Ok(norm.inverse_cdf(1.0 - alpha / 2.0))
}

/// Weighted ATE, its conservative SE, and a `1 - alpha` normal interval.
pub fn estimate_weighted_ate_and_ci(
    data: &ObservedData,
    lambda_by_stratum: &StratumWeights,
    alpha: f64,
) -> Result<WeightedAteEstimate> {
    let z = normal_critical_value(alpha)?;
    let terms = stratum_terms(data, lambda_by_stratum)?;
    if terms.is_empty() {
        return Err(Error::insufficient("no strata in data"));
    }
    let tau_hat: f64 = terms.iter().map(|t| t.weight * t.tau).sum();
    let se_hat = combine_se(&terms);
    let half_width = z * se_hat;

    log::debug!(
        "neyman estimate over {} strata: tau_hat={tau_hat:.6}, se_hat={se_hat:.6}, z={z:.4}",
        terms.len()
    );
    Ok(WeightedAteEstimate {
        tau_hat,
        se_hat,
        ci_lower: tau_hat - half_width,
        ci_upper: tau_hat + half_width,
    })
}
