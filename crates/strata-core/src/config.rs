//! Experiment configuration.
//!
//! A single JSON document drives a run:
//!
//! ```json
//! {
//!   "population": { "seed": 20240601, "strata": { "a": { "size": 80, "mu0": 0.0, "sigma0": 1.0, "tau": 0.5 } } },
//!   "N1_by_stratum": { "a": 40 },
//!   "lambda_by_stratum": {
//!     "size_weighted": { "a": 1.0 },
//!     "equal_weighted": { "a": 1.0 }
//!   },
//!   "R_fisher": 999,
//!   "seed_assignment": 12345,
//!   "alpha": 0.05
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::design::{StratumWeights, TreatedCounts};
use crate::error::{Error, Result};
use crate::generator::PopulationConfig;

/// Weight scheme key for `n_g / N` weights.
pub const SIZE_WEIGHTED: &str = "size_weighted";
/// Weight scheme key for `1 / G` weights.
pub const EQUAL_WEIGHTED: &str = "equal_weighted";

/// Full configuration of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub population: PopulationConfig,
    #[serde(rename = "N1_by_stratum")]
    pub n1_by_stratum: TreatedCounts,
    /// Named weight maps.
    pub lambda_by_stratum: BTreeMap<String, StratumWeights>,
    #[serde(rename = "R_fisher")]
    pub r_fisher: usize,
    pub seed_assignment: u64,
    pub alpha: f64,
}

impl ExperimentConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.population.validate()?;
        if self.r_fisher < 1 {
            return Err(Error::config("R_fisher must be >= 1"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::config(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        for name in [SIZE_WEIGHTED, EQUAL_WEIGHTED] {
            self.weights(name)?;
        }
        for (name, weights) in &self.lambda_by_stratum {
            weights
                .validate()
                .map_err(|e| Error::config(format!("lambda_by_stratum.{name}: {e}")))?;
        }
        Ok(())
    }

    /// Weight map registered under `name`.
    pub fn weights(&self, name: &str) -> Result<&StratumWeights> {
        self.lambda_by_stratum
            .get(name)
            .ok_or_else(|| Error::config(format!("missing lambda_by_stratum.{name}")))
    }

    pub fn size_weighted(&self) -> Result<&StratumWeights> {
        self.weights(SIZE_WEIGHTED)
    }

    pub fn equal_weighted(&self) -> Result<&StratumWeights> {
        self.weights(EQUAL_WEIGHTED)
    }
}
