//! Basic stratified experiment example.
//!
//! Generates a two-stratum population, assigns treatment, and prints a Fisher
//! p-value and a size-weighted Neyman interval.
//!
//! Run: `cargo run --example basic`

use strata_core::{
    PopulationConfig, StratifiedRerandomizer, StratumModel, StratumWeights, TreatedCounts,
    assign_treatment_stratified, estimate_weighted_ate_and_ci, fisher_test,
    generate_potential_outcomes, stat_diff_in_means,
};

fn main() -> strata_core::Result<()> {
    let population = PopulationConfig {
        seed: 11,
        strata: [
            ("young", StratumModel { size: 80, mu0: 2.0, sigma0: 1.0, tau: 0.8, tau_sd: 0.2 }),
            ("old", StratumModel { size: 120, mu0: 5.0, sigma0: 1.5, tau: 0.3, tau_sd: 0.2 }),
        ]
        .into_iter()
        .map(|(g, m)| (g.to_string(), m))
        .collect(),
    };
    let potential = generate_potential_outcomes(&population)?;
    println!("Population: {} units, true ATE {:.3}", potential.len(), potential.true_ate()?);

    let n1: TreatedCounts = [("young", 40), ("old", 60)].into_iter().collect();
    let observed = assign_treatment_stratified(&potential, &n1, 2024)?;

    let rerandomizer = StratifiedRerandomizer::new(&observed, &n1)?;
    let fisher = fisher_test(&observed, stat_diff_in_means, &rerandomizer, 999, 2024)?;
    println!(
        "Difference in means: {:.3} (Fisher p = {:.4}, {}/{} draws as extreme)",
        fisher.observed, fisher.p_value, fisher.extreme_count, fisher.repetitions
    );

    let weights = StratumWeights::size_weighted(&observed.partition());
    let ci = estimate_weighted_ate_and_ci(&observed, &weights, 0.05)?;
    println!(
        "Size-weighted ATE: {:.3} ± {:.3}  [{:.3}, {:.3}]",
        ci.tau_hat,
        ci.ci_upper - ci.tau_hat,
        ci.ci_lower,
        ci.ci_upper
    );
    Ok(())
}
