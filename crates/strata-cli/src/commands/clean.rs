use std::path::Path;

use strata_core::Result;

pub fn run(config_path: &str, out_dir: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let (potential, observed) = strata_core::clean(&config)?;

    let out = Path::new(out_dir);
    super::write_potential(&out.join(super::POTENTIAL_FILE), &potential)?;
    super::write_observed(&out.join(super::OBSERVED_FILE), &observed)?;

    println!(
        "Generated {} units in {} strata (seed {}), assignment seed {}\n",
        potential.len(),
        config.population.strata.len(),
        config.population.seed,
        config.seed_assignment
    );
    println!("{:<20} {:>8} {:>8} {:>8}", "Stratum", "Size", "Treated", "Control");
    println!("{}", "-".repeat(48));
    for (g, rows) in observed.partition().iter() {
        let treated = rows.iter().filter(|&&i| observed.rows()[i].z).count();
        println!(
            "  {g:<18} {:>8} {:>8} {:>8}",
            rows.len(),
            treated,
            rows.len() - treated
        );
    }
    println!(
        "\nTrue ATE {:.4}. Wrote {} and {} to {out_dir}/",
        potential.true_ate()?,
        super::POTENTIAL_FILE,
        super::OBSERVED_FILE
    );
    Ok(())
}
