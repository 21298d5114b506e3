use std::path::Path;

use strata_core::{ObservedData, Result, analysis_statistics, count_assignments, fisher_exact_test};

pub fn run(config_path: &str, cleaned_dir: &str, limit: u64) -> Result<()> {
    let config = super::load_config(config_path)?;
    let observed = super::read_observed(&Path::new(cleaned_dir).join(super::OBSERVED_FILE))?;

    let index = observed.partition();
    let counts = config.n1_by_stratum.resolve(&index)?;
    match count_assignments(&index, &counts) {
        Some(total) => println!("Enumerating {total} assignments (limit {limit})...\n"),
        None => println!("Assignment count overflows u64 (limit {limit})...\n"),
    }

    println!("{:<28} {:>10} {:>10} {:>12}", "Statistic", "Observed", "p-value", "Extreme");
    println!("{}", "-".repeat(64));
    for (label, stat) in analysis_statistics(&config)? {
        let res = fisher_exact_test(
            &observed,
            |d: &ObservedData| stat.compute(d),
            &config.n1_by_stratum,
            limit,
        )?;
        println!(
            "  {label:<26} {:>10.4} {:>10.4} {:>12}",
            res.observed,
            res.p_value,
            format!("{}/{}", res.extreme_count, res.repetitions)
        );
    }
    Ok(())
}
