use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use stagehand::config::AppConfig;
use stagehand::dsp::f0::F0Method;
use stagehand::pipeline::{self, ExtractOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagehand", version, about = "Voice-conversion dataset preprocessor")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract training features (F0, spectrogram, loudness, mel) for every clip
    Extract {
        /// Dataset root holding <speaker>/<clip>.wav (defaults to config dataset_dir)
        #[arg(long)]
        in_dir: Option<PathBuf>,

        /// F0 estimation method
        #[arg(long, value_enum, default_value = "yin")]
        f0_method: F0Method,

        /// Also extract mel features and augmented variants for the diffusion refiner
        #[arg(long)]
        use_diff: bool,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Recompute artifacts even when they already exist on disk
        #[arg(long)]
        force: bool,
    },

    /// Report which feature artifacts are already cached
    Status {
        /// Dataset root holding <speaker>/<clip>.wav (defaults to config dataset_dir)
        #[arg(long)]
        in_dir: Option<PathBuf>,

        /// Include diffusion-mode artifacts in the report
        #[arg(long)]
        use_diff: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Extract {
            in_dir,
            f0_method,
            use_diff,
            jobs,
            force,
        } => {
            let root = in_dir.unwrap_or_else(|| config.dataset_dir.clone());
            if !root.is_dir() {
                bail!(
                    "Dataset root {} does not exist. Pass --in-dir or set dataset_dir in config.",
                    root.display()
                );
            }
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };

            log::info!("Dataset root: {}", root.display());
            log::info!("F0 method: {}", f0_method.name());
            log::info!("Diffusion mode: {}", use_diff);

            let files = stagehand::discover::discover_wavs(&root);
            if files.is_empty() {
                println!("No wav files found under {}", root.display());
                return Ok(());
            }

            let options = ExtractOptions {
                f0_method,
                use_diff,
                force,
                workers,
            };
            let result = pipeline::extract_features(&config, &files, &options);
            println!(
                "Extraction complete: {} processed, {} failed",
                result.processed, result.failed
            );
        }

        Commands::Status { in_dir, use_diff } => {
            let root = in_dir.unwrap_or_else(|| config.dataset_dir.clone());
            if !root.is_dir() {
                bail!(
                    "Dataset root {} does not exist. Pass --in-dir or set dataset_dir in config.",
                    root.display()
                );
            }

            let mut files = stagehand::discover::discover_wavs(&root);
            files.sort();
            let report = pipeline::status(&files, use_diff, config.model.vol_embedding);

            println!("Dataset: {}", root.display());
            println!("Files:    {}", report.total);
            println!("Complete: {}", report.complete);
            println!();
            println!("{:<10} {:>8} {:>8}", "Artifact", "Cached", "Missing");
            println!("{}", "-".repeat(28));
            for count in &report.counts {
                println!(
                    "{:<10} {:>8} {:>8}",
                    count.artifact.label(),
                    count.cached,
                    report.total - count.cached
                );
            }
        }
    }

    Ok(())
}
