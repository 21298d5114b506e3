pub mod analyze;
pub mod clean;
pub mod exact;
pub mod pipeline;

use std::fs;
use std::path::Path;

use strata_core::{
    AnalysisResults, Error, ExperimentConfig, Observation, ObservedData, PotentialOutcomes, Result,
};

pub const DEFAULT_CONFIG: &str = "config/assignment.json";
pub const DEFAULT_CLEANED_DIR: &str = "cleaned";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

pub const POTENTIAL_FILE: &str = "potential_outcomes.csv";
pub const OBSERVED_FILE: &str = "observed_data.csv";
pub const RESULTS_FILE: &str = "results.json";

/// Load and validate the experiment configuration.
pub fn load_config(path: &str) -> Result<ExperimentConfig> {
    let config = ExperimentConfig::load_from_path(Path::new(path))?;
    log::info!("loaded configuration from {path}");
    Ok(config)
}

fn csv_error(path: &Path, e: csv::Error) -> Error {
    Error::Config(format!("{}: {e}", path.display()))
}

/// Write `rows` as a headed CSV table, creating the parent directory.
fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `unit_id, g, y0, y1`.
pub fn write_potential(path: &Path, table: &PotentialOutcomes) -> Result<()> {
    write_csv(path, table.units())
}

/// Write `unit_id, g, z, y`.
pub fn write_observed(path: &Path, table: &ObservedData) -> Result<()> {
    write_csv(path, table.rows())
}

/// Read an observed-data table written by [`write_observed`].
pub fn read_observed(path: &Path) -> Result<ObservedData> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let rows = reader
        .deserialize::<Observation>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| csv_error(path, e))?;
    ObservedData::new(rows)
}

/// Write pretty-printed `results.json`, creating the parent directory.
pub fn write_results(path: &Path, results: &AnalysisResults) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(results)
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    fs::write(path, json)?;
    Ok(())
}

/// Print the results table shared by `analyze` and `run`.
pub fn print_results(results: &AnalysisResults) {
    println!("\n{}", "=".repeat(60));
    println!("{:<36} {:>10}", "Fisher test", "p-value");
    println!("{}", "-".repeat(60));
    for (name, p) in [
        ("difference in means", results.fisher_diff_in_means_pvalue),
        ("studentized", results.fisher_studentized_pvalue),
        ("stratified (size-weighted)", results.fisher_stratified_size_weighted_pvalue),
        ("stratified (equal-weighted)", results.fisher_stratified_equal_weighted_pvalue),
    ] {
        println!("  {name:<34} {p:>10.4}");
    }

    println!("\n{:<16} {:>10} {:>10} {:>10} {:>10}", "Neyman", "tau_hat", "se_hat", "lower", "upper");
    println!("{}", "-".repeat(60));
    for (name, ci) in [
        ("size-weighted", &results.neyman_size_weighted),
        ("equal-weighted", &results.neyman_equal_weighted),
    ] {
        println!(
            "  {name:<14} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            ci.tau_hat, ci.se_hat, ci.ci_lower, ci.ci_upper
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Unit, WeightedAteEstimate};

    fn potential() -> PotentialOutcomes {
        PotentialOutcomes::new(
            (0..6u64)
                .map(|i| Unit {
                    unit_id: i,
                    g: if i % 2 == 0 { "even" } else { "odd" }.to_string(),
                    y0: i as f64 * 0.5,
                    y1: i as f64 * 0.5 + 1.25,
                })
                .collect(),
        )
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // CSV tables
    // -----------------------------------------------------------------------

    #[test]
    fn test_observed_csv_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join(OBSERVED_FILE);
        let pop = potential();
        let observed = ObservedData::new(
            pop.units()
                .iter()
                .map(|u| u.reveal(u.unit_id < 3))
                .collect(),
        )
        .unwrap();

        write_observed(&path, &observed).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("unit_id,g,z,y"), "{raw}");
        assert!(raw.contains("0,even,1,1.25"), "{raw}");

        let back = read_observed(&path).unwrap();
        assert_eq!(back, observed);
    }

    #[test]
    fn test_potential_csv_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(POTENTIAL_FILE);
        write_potential(&path, &potential()).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("unit_id,g,y0,y1"), "{raw}");
        assert_eq!(raw.lines().count(), 7);
    }

    #[test]
    fn test_bad_treatment_value_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(OBSERVED_FILE);
        fs::write(&path, "unit_id,g,z,y\n0,a,2,1.0\n").unwrap();
        assert!(matches!(read_observed(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_observed_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_observed(&tmp.path().join("absent.csv")).is_err());
    }

    // -----------------------------------------------------------------------
    // Results JSON
    // -----------------------------------------------------------------------

    #[test]
    fn test_results_json_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out").join(RESULTS_FILE);
        let ci = WeightedAteEstimate {
            tau_hat: 1.0,
            se_hat: 0.5,
            ci_lower: 0.02,
            ci_upper: 1.98,
        };
        let results = AnalysisResults {
            fisher_diff_in_means_pvalue: 0.01,
            fisher_studentized_pvalue: 0.02,
            fisher_stratified_size_weighted_pvalue: 0.03,
            fisher_stratified_equal_weighted_pvalue: 0.04,
            neyman_size_weighted: ci,
            neyman_equal_weighted: ci,
        };
        write_results(&path, &results).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["fisher_studentized_pvalue"], 0.02);
        assert_eq!(parsed["neyman_equal_weighted"]["ci_upper"], 1.98);
        let back: AnalysisResults = serde_json::from_value(parsed).unwrap();
        assert_eq!(back, results);
    }
}
