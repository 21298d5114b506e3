//! CLI for strata: generate, assign and analyze a stratified experiment.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "strata: randomization inference for stratified experiments")]
#[command(version = strata_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate potential outcomes, assign treatment, and write both tables as CSV
    Clean {
        /// Experiment configuration JSON
        #[arg(long, default_value = commands::DEFAULT_CONFIG)]
        config: String,

        /// Directory for potential_outcomes.csv and observed_data.csv
        #[arg(long, default_value = commands::DEFAULT_CLEANED_DIR)]
        out_dir: String,
    },

    /// Fisher p-values and Neyman intervals for the observed table.
    /// Writes results.json to the output directory.
    Analyze {
        /// Experiment configuration JSON
        #[arg(long, default_value = commands::DEFAULT_CONFIG)]
        config: String,

        /// Directory holding observed_data.csv
        #[arg(long, default_value = commands::DEFAULT_CLEANED_DIR)]
        cleaned_dir: String,

        /// Directory for results.json
        #[arg(long, default_value = commands::DEFAULT_OUTPUT_DIR)]
        output_dir: String,
    },

    /// Run clean, then analyze
    Run {
        /// Experiment configuration JSON
        #[arg(long, default_value = commands::DEFAULT_CONFIG)]
        config: String,

        /// Directory for the cleaned tables
        #[arg(long, default_value = commands::DEFAULT_CLEANED_DIR)]
        cleaned_dir: String,

        /// Directory for results.json
        #[arg(long, default_value = commands::DEFAULT_OUTPUT_DIR)]
        output_dir: String,
    },

    /// Exact randomization p-values by full enumeration (small designs only)
    Exact {
        /// Experiment configuration JSON
        #[arg(long, default_value = commands::DEFAULT_CONFIG)]
        config: String,

        /// Directory holding observed_data.csv
        #[arg(long, default_value = commands::DEFAULT_CLEANED_DIR)]
        cleaned_dir: String,

        /// Refuse designs with more assignments than this
        #[arg(long, default_value = "1000000")]
        limit: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Clean { config, out_dir } => commands::clean::run(&config, &out_dir),
        Commands::Analyze {
            config,
            cleaned_dir,
            output_dir,
        } => commands::analyze::run(&config, &cleaned_dir, &output_dir),
        Commands::Run {
            config,
            cleaned_dir,
            output_dir,
        } => commands::pipeline::run(&config, &cleaned_dir, &output_dir),
        Commands::Exact {
            config,
            cleaned_dir,
            limit,
        } => commands::exact::run(&config, &cleaned_dir, limit),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
