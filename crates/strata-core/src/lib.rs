//! # strata-core
//!
//! **Randomization inference for stratified experiments.**
//!
//! `strata-core` simulates a finite population of potential outcomes, assigns
//! treatment with a fixed treated count inside every stratum, and analyzes the
//! observed table two ways: Fisher randomization p-values for several test
//! statistics, and a Neyman confidence interval for a stratum-weighted average
//! treatment effect.
//!
//! ## Quick Start
//!
//! ```
//! use strata_core::{
//!     StratifiedRerandomizer, StratumWeights, TreatedCounts, assign_treatment_stratified,
//!     estimate_weighted_ate_and_ci, fisher_pvalue, generate_potential_outcomes,
//!     stat_diff_in_means, PopulationConfig,
//! };
//!
//! let population: PopulationConfig = serde_json::from_str(r#"{
//!     "seed": 1,
//!     "strata": {
//!         "a": { "size": 20, "mu0": 0.0, "sigma0": 1.0, "tau": 1.0 },
//!         "b": { "size": 40, "mu0": 3.0, "sigma0": 1.0, "tau": 1.0 }
//!     }
//! }"#).unwrap();
//! let potential = generate_potential_outcomes(&population).unwrap();
//!
//! let n1: TreatedCounts = [("a", 10), ("b", 20)].into_iter().collect();
//! let observed = assign_treatment_stratified(&potential, &n1, 42).unwrap();
//!
//! let rerandomizer = StratifiedRerandomizer::new(&observed, &n1).unwrap();
//! let p = fisher_pvalue(&observed, stat_diff_in_means, &rerandomizer, 199, 42).unwrap();
//! assert!(p > 0.0 && p <= 1.0);
//!
//! let weights = StratumWeights::size_weighted(&observed.partition());
//! let ci = estimate_weighted_ate_and_ci(&observed, &weights, 0.05).unwrap();
//! assert!(ci.ci_lower <= ci.tau_hat && ci.tau_hat <= ci.ci_upper);
//! ```
//!
//! ## Architecture
//!
//! Generator → Assignment → (Statistics + Fisher test) and → Neyman estimator
//!
//! The assignment engine doubles as the rerandomization primitive of the
//! Fisher test through the [`Rerandomize`] trait. Every random draw comes from
//! a generator seeded by the call, so results are reproducible from seeds alone
//! and independent of thread count.

pub mod assignment;
pub mod config;
pub mod design;
pub mod error;
pub mod fisher;
pub mod generator;
pub mod neyman;
pub mod pipeline;
pub mod statistics;
pub mod table;

pub use assignment::{Rerandomize, StratifiedRerandomizer, assign_treatment_stratified};
pub use config::{EQUAL_WEIGHTED, ExperimentConfig, SIZE_WEIGHTED};
pub use design::{StratumWeights, TreatedCounts};
pub use error::{Error, Result};
pub use fisher::{
    FisherResult, count_assignments, fisher_exact_test, fisher_pvalue, fisher_test,
};
pub use generator::{PopulationConfig, StratumModel, generate_potential_outcomes};
pub use neyman::{
    StratumTerm, WeightedAteEstimate, estimate_weighted_ate_and_ci, neyman_se_stratified,
    normal_critical_value, stratum_terms,
};
pub use pipeline::{AnalysisResults, analysis_statistics, analyze, clean};
pub use statistics::{
    ArmSummary, Contrast, StratumContrast, TestStatistic, pooled_contrast, stat_diff_in_means,
    stat_stratified, stat_studentized, stratum_contrasts,
};
pub use table::{Observation, ObservedData, PotentialOutcomes, StratumIndex, Unit, UnitId};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
