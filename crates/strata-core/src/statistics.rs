//! Test statistics over an observed-data table.
//!
//! All statistics are pure functions of `(z, y, g)` and return an error rather
//! than a NaN when a mean or variance they need is undefined.

use serde::Serialize;

use crate::design::StratumWeights;
use crate::error::{Error, Result};
use crate::table::{Observation, ObservedData};

// ---------------------------------------------------------------------------
// Arm summaries
// ---------------------------------------------------------------------------

/// Size, mean and sample variance of one treatment arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmSummary {
    pub n: usize,
    pub mean: f64,
    /// Sample variance (denominator `n - 1`); `None` when `n < 2`.
    pub variance: Option<f64>,
}

impl ArmSummary {
    /// Summarize `values`; `None` for an empty arm.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n == 0 {
            return None;
        }
        // Shift by the first value so a constant arm has exactly zero spread.
        let origin = values[0];
        let shifted_mean = values.iter().map(|y| y - origin).sum::<f64>() / n as f64;
        let variance = (n >= 2).then(|| {
            values
                .iter()
                .map(|y| {
                    let d = y - origin - shifted_mean;
                    d * d
                })
                .sum::<f64>()
                / (n - 1) as f64
        });
        Some(Self {
            n,
            mean: origin + shifted_mean,
            variance,
        })
    }

    /// `s2 / n`, the sampling variance contribution of this arm's mean.
    fn variance_of_mean(&self) -> Option<f64> {
        self.variance.map(|s2| s2 / self.n as f64)
    }
}

/// Treated and control summaries of a set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contrast {
    pub treated: ArmSummary,
    pub control: ArmSummary,
}

impl Contrast {
    /// Summarize `rows`; an empty arm is an error naming `scope`.
    fn from_rows<'a>(rows: impl Iterator<Item = &'a Observation>, scope: &str) -> Result<Self> {
        let mut treated = Vec::new();
        let mut control = Vec::new();
        for r in rows {
            if r.z {
                treated.push(r.y);
            } else {
                control.push(r.y);
            }
        }
        let treated = ArmSummary::from_values(&treated)
            .ok_or_else(|| Error::insufficient(format!("{scope}: treated arm is empty")))?;
        let control = ArmSummary::from_values(&control)
            .ok_or_else(|| Error::insufficient(format!("{scope}: control arm is empty")))?;
        Ok(Self { treated, control })
    }

    /// `mean(y | z=1) - mean(y | z=0)`.
    pub fn difference(&self) -> f64 {
        self.treated.mean - self.control.mean
    }

    /// Neyman variance `s2_t/n_t + s2_c/n_c`; needs two units per arm.
    pub fn neyman_variance(&self) -> Option<f64> {
        Some(self.treated.variance_of_mean()? + self.control.variance_of_mean()?)
    }
}

/// Contrast of one stratum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratumContrast {
    pub stratum: String,
    #[serde(flatten)]
    pub contrast: Contrast,
}

/// Contrast over the whole table, ignoring strata.
pub fn pooled_contrast(data: &ObservedData) -> Result<Contrast> {
    Contrast::from_rows(data.rows().iter(), "pooled")
}

/// Per-stratum contrasts for every stratum present in `data`, in label order.
pub fn stratum_contrasts(data: &ObservedData) -> Result<Vec<StratumContrast>> {
    let rows = data.rows();
    data.partition()
        .iter()
        .map(|(g, idx)| {
            let contrast = Contrast::from_rows(
                idx.iter().map(|&i| &rows[i]),
                &format!("stratum '{g}'"),
            )?;
            Ok(StratumContrast {
                stratum: g.to_string(),
                contrast,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Unweighted difference in means over the whole table.
pub fn stat_diff_in_means(data: &ObservedData) -> Result<f64> {
    Ok(pooled_contrast(data)?.difference())
}

/// Difference in means divided by `sqrt(s2_t/n_t + s2_c/n_c)`.
///
/// Fails when either arm has fewer than two units, and when the standard
/// error is exactly zero (both arms constant), since the ratio is undefined.
pub fn stat_studentized(data: &ObservedData) -> Result<f64> {
    let c = pooled_contrast(data)?;
    let var = c.neyman_variance().ok_or_else(|| {
        Error::insufficient(format!(
            "studentized statistic needs >= 2 units per arm (treated={}, control={})",
            c.treated.n, c.control.n
        ))
    })?;
    let se = var.sqrt();
    if !(se > 0.0 && se.is_finite()) {
        return Err(Error::insufficient(format!(
            "studentized statistic undefined: standard error is {se}"
        )));
    }
    Ok(c.difference() / se)
}

/// `sum_g lambda_g * (mean(y | z=1, g) - mean(y | z=0, g))` over the strata
/// present in `data`.
///
/// A stratum with no weight is a configuration error; weights for strata not
/// in the data are ignored. Only a literally empty arm is insufficient.
pub fn stat_stratified(data: &ObservedData, lambda_by_stratum: &StratumWeights) -> Result<f64> {
    let rows = data.rows();
    let mut total = 0.0;
    for (g, idx) in data.partition().iter() {
        let lambda = lambda_by_stratum.weight(g)?;
        let c = Contrast::from_rows(idx.iter().map(|&i| &rows[i]), &format!("stratum '{g}'"))?;
        total += lambda * c.difference();
    }
    Ok(total)
}

/// The statistics the analysis runs a Fisher test for.
#[derive(Debug, Clone, PartialEq)]
pub enum TestStatistic {
    DiffInMeans,
    Studentized,
    Stratified(StratumWeights),
}

impl TestStatistic {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DiffInMeans => "diff_in_means",
            Self::Studentized => "studentized",
            Self::Stratified(_) => "stratified",
        }
    }

    pub fn compute(&self, data: &ObservedData) -> Result<f64> {
        match self {
            Self::DiffInMeans => stat_diff_in_means(data),
            Self::Studentized => stat_studentized(data),
            Self::Stratified(weights) => stat_stratified(data, weights),
        }
    }
}
