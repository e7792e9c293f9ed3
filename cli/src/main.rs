//! `tenders`: build, search, and inspect per-year tender indexes.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use tender_cli::App;
use tender_cli::render::{format_outcome, format_stats};
use tender_cli::shell;
use tender_search::SearchConfig;

/// Similarity search over public procurement tenders
#[derive(Parser)]
#[command(name = "tenders")]
#[command(version, long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true, env = "TENDERS_CONFIG")]
    config: Option<PathBuf>,

    /// Never contact the feed; use the local backup only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or load) the index for a financial year
    Build {
        /// Financial year, e.g. 2024-2025
        #[arg(long)]
        year: String,

        /// Rebuild even if a saved partition exists
        #[arg(long)]
        force: bool,
    },

    /// Search one financial year
    Search {
        /// Search query
        query: String,

        /// Financial year, e.g. 2024-2025
        #[arg(long)]
        year: String,

        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum similarity score
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Rebuild the partition before searching
        #[arg(long)]
        rebuild: bool,
    },

    /// Deadline statistics for a financial year
    Stats {
        /// Financial year, e.g. 2024-2025
        #[arg(long)]
        year: String,
    },

    /// List financial years with a saved partition
    Years,

    /// Delete the saved partition for a financial year
    Remove {
        /// Financial year, e.g. 2024-2025
        #[arg(long)]
        year: String,
    },

    /// Interactive menu
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(SearchConfig::default_path);
    let config = SearchConfig::load(config_path.as_deref())?;
    let app = App::new(config, cli.offline).await?;

    match cli.command {
        Commands::Build { year, force } => {
            let engine = app.select_year(&year, force).await?;
            println!(
                "{}: {} tenders, dimension {}",
                engine.year(),
                engine.partition().len(),
                engine.partition().dimension()
            );
        }
        Commands::Search {
            query,
            year,
            top_k,
            threshold,
            json,
            rebuild,
        } => {
            app.select_year(&year, rebuild).await?;
            let outcome = app.search(&query, threshold, top_k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", format_outcome(&outcome));
            }
        }
        Commands::Stats { year } => {
            app.select_year(&year, false).await?;
            let (year, stats) = app.stats(chrono::Local::now().naive_local()).await?;
            print!("{}", format_stats(&year, &stats));
        }
        Commands::Years => {
            for year in app.cached_years().await? {
                println!("{year}");
            }
        }
        Commands::Remove { year } => {
            app.remove_year(&year).await?;
            println!("Removed {year}");
        }
        Commands::Shell => {
            let input = BufReader::new(tokio::io::stdin());
            let mut out = std::io::stdout();
            shell::run(&app, input, &mut out).await?;
        }
    }

    Ok(())
}
