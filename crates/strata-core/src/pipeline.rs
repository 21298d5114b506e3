//! In-memory "clean → analyze" pipeline.
//!
//! `clean` builds the population and the observed assignment; `analyze` runs
//! the four Fisher tests and the two Neyman intervals over an observed table.
//! File handling is left to the caller.

use serde::{Deserialize, Serialize};

use crate::assignment::{StratifiedRerandomizer, assign_treatment_stratified};
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::fisher::fisher_pvalue;
use crate::generator::generate_potential_outcomes;
use crate::neyman::{WeightedAteEstimate, estimate_weighted_ate_and_ci};
use crate::statistics::TestStatistic;
use crate::table::{ObservedData, PotentialOutcomes};

/// Results persisted by the caller, with the key names of `results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub fisher_diff_in_means_pvalue: f64,
    pub fisher_studentized_pvalue: f64,
    pub fisher_stratified_size_weighted_pvalue: f64,
    pub fisher_stratified_equal_weighted_pvalue: f64,
    pub neyman_size_weighted: WeightedAteEstimate,
    pub neyman_equal_weighted: WeightedAteEstimate,
}

/// Generate the population and draw the observed assignment.
pub fn clean(config: &ExperimentConfig) -> Result<(PotentialOutcomes, ObservedData)> {
    let potential = generate_potential_outcomes(&config.population)?;
    let observed =
        assign_treatment_stratified(&potential, &config.n1_by_stratum, config.seed_assignment)?;
    log::info!(
        "cleaned: {} units, {} treated",
        observed.len(),
        observed.rows().iter().filter(|r| r.z).count()
    );
    Ok((potential, observed))
}

/// The analysis statistics, labeled, in the order their Fisher seeds are
/// offset from `seed_assignment` (`+0`, `+1`, `+2`, `+3`).
pub fn analysis_statistics(config: &ExperimentConfig) -> Result<Vec<(&'static str, TestStatistic)>> {
    Ok(vec![
        ("diff_in_means", TestStatistic::DiffInMeans),
        ("studentized", TestStatistic::Studentized),
        (
            "stratified_size_weighted",
            TestStatistic::Stratified(config.size_weighted()?.clone()),
        ),
        (
            "stratified_equal_weighted",
            TestStatistic::Stratified(config.equal_weighted()?.clone()),
        ),
    ])
}

/// Fisher p-values and Neyman intervals for `observed`.
pub fn analyze(observed: &ObservedData, config: &ExperimentConfig) -> Result<AnalysisResults> {
    let rerandomizer = StratifiedRerandomizer::new(observed, &config.n1_by_stratum)?;

    let mut p_values = Vec::with_capacity(4);
    for (offset, (label, stat)) in analysis_statistics(config)?.into_iter().enumerate() {
        let seed = config.seed_assignment.wrapping_add(offset as u64);
        let p = fisher_pvalue(
            observed,
            |d: &ObservedData| stat.compute(d),
            &rerandomizer,
            config.r_fisher,
            seed,
        )?;
        log::info!("fisher {label}: p={p:.4} (R={}, seed={seed})", config.r_fisher);
        p_values.push(p);
    }

    let neyman_size_weighted =
        estimate_weighted_ate_and_ci(observed, config.size_weighted()?, config.alpha)?;
    let neyman_equal_weighted =
        estimate_weighted_ate_and_ci(observed, config.equal_weighted()?, config.alpha)?;

    Ok(AnalysisResults {
        fisher_diff_in_means_pvalue: p_values[0],
        fisher_studentized_pvalue: p_values[1],
        fisher_stratified_size_weighted_pvalue: p_values[2],
        fisher_stratified_equal_weighted_pvalue: p_values[3],
        neyman_size_weighted,
        neyman_equal_weighted,
    })
}

/// `clean` followed by `analyze`.
pub fn run(config: &ExperimentConfig) -> Result<(PotentialOutcomes, ObservedData, AnalysisResults)> {
    let (potential, observed) = clean(config)?;
    let results = analyze(&observed, config)?;
    Ok((potential, observed, results))
}
