use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info, warn};

use risk_prep::config::{Config, DEFAULT_CONFIG_PATH};
use risk_prep::logging;
use risk_prep::metrics;
use risk_prep::pipeline::{Pipeline, PipelineResult};
use risk_prep::storage::{SqliteStore, Store};
use risk_prep::types::Mode;

#[derive(Parser)]
#[command(name = "risk_prep")]
#[command(about = "Enterprise risk dataset preprocessing")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Train,
    Validate,
    /// Train, then validate
    All,
}

impl ModeArg {
    fn modes(self) -> Vec<Mode> {
        match self {
            ModeArg::Train => vec![Mode::Train],
            ModeArg::Validate => vec![Mode::Validate],
            ModeArg::All => Mode::all().to_vec(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load, clean, join and store the dataset tables
    Run {
        #[arg(long, value_enum, default_value = "train")]
        mode: ModeArg,
        /// Print run results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored keys and the runs that wrote them
    Keys,
    /// Print the first rows of a stored table
    Show {
        #[arg(long)]
        key: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn print_summary(result: &PipelineResult) {
    println!("\n📊 Results for {} (run {}):", result.mode, result.run_id);
    for key in &result.keys {
        println!("   {:<16} {:>8} rows × {:>3} columns", key.key, key.rows, key.columns);
    }
    println!("   Inputs fingerprinted: {}", result.inputs.len());
    println!("   Duration: {:.2}s", result.duration_secs);
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init_logging(&config.dataset.log_dir);

    match cli.command {
        Commands::Run { mode, json } => {
            metrics::init_metrics();
            let mut store = SqliteStore::open(&config.dataset.store)
                .with_context(|| format!("opening store {}", config.dataset.store.display()))?;

            for mode in mode.modes() {
                println!("🔄 Preprocessing {} data...", mode);
                match Pipeline::run(&config, mode, &mut store) {
                    Ok(result) => {
                        if json {
                            println!("{}", serde_json::to_string_pretty(&result)?);
                        } else {
                            print_summary(&result);
                        }
                    }
                    Err(e) => {
                        error!("{} run failed: {}", mode, e);
                        return Err(e.into());
                    }
                }
            }

            let snapshot = config.dataset.log_dir.join("metrics.prom");
            match metrics::write_snapshot(&snapshot) {
                Ok(true) => info!("Metrics snapshot written to {}", snapshot.display()),
                Ok(false) => {}
                Err(e) => warn!("Failed to write metrics snapshot: {}", e),
            }
        }
        Commands::Keys => {
            let store = SqliteStore::open(&config.dataset.store)?;
            let manifest = store.manifest()?;
            let keys = store.keys()?;
            if keys.is_empty() {
                println!("📭 No tables in {}", config.dataset.store.display());
            }
            for key in keys {
                match manifest.iter().find(|m| m.key == key) {
                    Some(entry) => println!(
                        "   {:<16} {:>8} rows × {:>3} columns  run {}  at {}",
                        key,
                        entry.rows,
                        entry.columns,
                        entry.run_id,
                        entry.written_at.format("%Y-%m-%d %H:%M:%S")
                    ),
                    None => println!("   {:<16} (no manifest entry)", key),
                }
            }
        }
        Commands::Show { key, limit } => {
            let store = SqliteStore::open(&config.dataset.store)?;
            let frame = store.read_frame(&key)?;
            println!("{}", frame.head(Some(limit)));
            if frame.height() > limit {
                println!("... {} more rows", frame.height() - limit);
            }
        }
    }

    Ok(())
}
