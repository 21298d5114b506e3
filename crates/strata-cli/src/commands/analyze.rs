use std::path::Path;

use strata_core::Result;

pub fn run(config_path: &str, cleaned_dir: &str, output_dir: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let observed = super::read_observed(&Path::new(cleaned_dir).join(super::OBSERVED_FILE))?;

    println!(
        "Analyzing {} units with R = {} rerandomizations, alpha = {}",
        observed.len(),
        config.r_fisher,
        config.alpha
    );
    let results = strata_core::analyze(&observed, &config)?;

    let path = Path::new(output_dir).join(super::RESULTS_FILE);
    super::write_results(&path, &results)?;
    super::print_results(&results);
    println!("\nResults written to {}", path.display());
    Ok(())
}
