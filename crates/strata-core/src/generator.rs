//! Synthetic potential-outcome populations.
//!
//! Each stratum has its own outcome model:
//!
//! ```text
//! y0 = mu0 + sigma0 * e0
//! y1 = y0 + tau + tau_sd * e1        e0, e1 ~ N(0, 1)
//! ```
//!
//! Units are generated stratum by stratum in label order from one seeded
//! generator, so a `(config, seed)` pair always yields the same table.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::table::{PotentialOutcomes, Unit};

/// Outcome model for one stratum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratumModel {
    /// Number of units; must be positive.
    pub size: i64,
    /// Mean control outcome.
    pub mu0: f64,
    /// Standard deviation of the control outcome.
    pub sigma0: f64,
    /// Mean unit-level treatment effect.
    pub tau: f64,
    /// Standard deviation of the unit-level treatment effect.
    #[serde(default)]
    pub tau_sd: f64,
}

/// Population parameters (`population` in the experiment configuration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub seed: u64,
    pub strata: BTreeMap<String, StratumModel>,
}

impl PopulationConfig {
    /// Check every stratum model.
    pub fn validate(&self) -> Result<()> {
        if self.strata.is_empty() {
            return Err(Error::config("population has no strata"));
        }
        for (g, m) in &self.strata {
            if m.size <= 0 {
                return Err(Error::config(format!(
                    "stratum '{g}': size must be > 0, got {}",
                    m.size
                )));
            }
            if !m.mu0.is_finite() || !m.tau.is_finite() {
                return Err(Error::config(format!(
                    "stratum '{g}': mu0 and tau must be finite"
                )));
            }
            if !(m.sigma0.is_finite() && m.sigma0 >= 0.0) {
                return Err(Error::config(format!(
                    "stratum '{g}': sigma0 must be finite and >= 0, got {}",
                    m.sigma0
                )));
            }
            if !(m.tau_sd.is_finite() && m.tau_sd >= 0.0) {
                return Err(Error::config(format!(
                    "stratum '{g}': tau_sd must be finite and >= 0, got {}",
                    m.tau_sd
                )));
            }
        }
        Ok(())
    }

    /// Total population size.
    pub fn total_size(&self) -> usize {
        self.strata.values().map(|m| m.size.max(0) as usize).sum()
    }
}

/// Generate the potential-outcome table described by `config`.
pub fn generate_potential_outcomes(config: &PopulationConfig) -> Result<PotentialOutcomes> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut units = Vec::with_capacity(config.total_size());
    let mut next_id = 0u64;

    for (g, model) in &config.strata {
        for _ in 0..model.size {
            let e0: f64 = rng.sample(StandardNormal);
            let e1: f64 = rng.sample(StandardNormal);
            let y0 = model.mu0 + model.sigma0 * e0;
            let y1 = y0 + model.tau + model.tau_sd * e1;
            units.push(Unit {
                unit_id: next_id,
                g: g.clone(),
                y0,
                y1,
            });
            next_id += 1;
        }
    }

    log::debug!(
        "generated {} units across {} strata (seed={})",
        units.len(),
        config.strata.len(),
        config.seed
    );
    PotentialOutcomes::new(units)
}
