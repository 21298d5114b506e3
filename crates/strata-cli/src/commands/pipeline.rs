use std::path::Path;

use strata_core::Result;

/// Both steps in one process; the observed table is still written to
/// `cleaned_dir` so that `analyze` can be rerun on it later.
pub fn run(config_path: &str, cleaned_dir: &str, output_dir: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let (potential, observed, results) = strata_core::pipeline::run(&config)?;

    let cleaned = Path::new(cleaned_dir);
    super::write_potential(&cleaned.join(super::POTENTIAL_FILE), &potential)?;
    super::write_observed(&cleaned.join(super::OBSERVED_FILE), &observed)?;

    let path = Path::new(output_dir).join(super::RESULTS_FILE);
    super::write_results(&path, &results)?;

    println!(
        "{} units, R = {}, true ATE {:.4}",
        potential.len(),
        config.r_fisher,
        potential.true_ate()?
    );
    super::print_results(&results);
    println!("\nTables in {cleaned_dir}/, results in {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    const CONFIG: &str = r#"{
        "population": { "seed": 3, "strata": {
            "a": { "size": 6, "mu0": 0.0, "sigma0": 1.0, "tau": 2.0 },
            "b": { "size": 8, "mu0": 1.0, "sigma0": 1.0, "tau": 2.0 }
        } },
        "N1_by_stratum": { "a": 3, "b": 4 },
        "lambda_by_stratum": {
            "size_weighted": { "a": 0.42857142857142855, "b": 0.5714285714285714 },
            "equal_weighted": { "a": 0.5, "b": 0.5 }
        },
        "R_fisher": 49,
        "seed_assignment": 8,
        "alpha": 0.1
    }"#;

    #[test]
    fn test_run_then_reanalyze_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("config.json");
        fs::write(&config, CONFIG).unwrap();
        let config = config.to_str().unwrap();
        let cleaned = tmp.path().join("cleaned");
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");

        super::run(config, cleaned.to_str().unwrap(), first.to_str().unwrap()).unwrap();
        assert!(cleaned.join(super::super::POTENTIAL_FILE).exists());
        assert!(cleaned.join(super::super::OBSERVED_FILE).exists());

        super::super::analyze::run(config, cleaned.to_str().unwrap(), second.to_str().unwrap())
            .unwrap();
        let a = fs::read_to_string(first.join(super::super::RESULTS_FILE)).unwrap();
        let b = fs::read_to_string(second.join(super::super::RESULTS_FILE)).unwrap();
        assert_eq!(a, b);

        super::super::exact::run(config, cleaned.to_str().unwrap(), 10_000).unwrap();
        assert!(super::super::exact::run(config, cleaned.to_str().unwrap(), 10).is_err());
    }

    #[test]
    fn test_missing_config_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent.json");
        let out = tmp.path().to_str().unwrap();
        assert!(super::run(missing.to_str().unwrap(), out, out).is_err());
    }
}
