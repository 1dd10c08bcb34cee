#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the crime dashboard.
//!
//! `import` loads a crime CSV export into the store, `report` prints the
//! dashboard tables for one filter, and `serve` starts the JSON API. With
//! no subcommand an interactive terminal dashboard is started.
//!
//! Uses `indicatif-log-bridge` (via [`crime_dashboard_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod report;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use crime_dashboard_analytics::queries;
use crime_dashboard_cli_utils::IndicatifProgress;
use crime_dashboard_database::{db, import};
use crime_dashboard_models::DEFAULT_TOP_LIMIT;

#[derive(Parser)]
#[command(name = "crime_dashboard", about = "Crime incident analytics dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a crime incident CSV export into the store
    Import {
        /// Path to the CSV file
        path: PathBuf,
        /// Rows buffered per insert batch
        #[arg(long, default_value_t = import::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Print the dashboard tables for a filter
    Report {
        /// First included day (YYYY-MM-DD). Defaults to the first month with data.
        #[arg(long)]
        from: Option<String>,
        /// Last included day (YYYY-MM-DD). Defaults to the end of the last month with data.
        #[arg(long)]
        to: Option<String>,
        /// Comma-separated districts. Defaults to every district.
        #[arg(long)]
        districts: Option<String>,
        /// Number of offense categories to list
        #[arg(long, default_value_t = DEFAULT_TOP_LIMIT)]
        limit: u32,
    },
    /// Start the JSON API server (`BIND_ADDR`, `PORT`)
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_dashboard_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run().await;
    };

    match command {
        Commands::Import { path, batch_size } => {
            let store = db::connect_from_env().await?;
            let start = Instant::now();

            let progress = IndicatifProgress::records_bar(&multi, "Importing incidents");
            let summary = import::import_csv(&store, &path, batch_size, progress).await?;

            log::info!(
                "Imported {} incident(s), skipped {}, in {:.1}s",
                summary.inserted,
                summary.skipped,
                start.elapsed().as_secs_f64()
            );
        }
        Commands::Report {
            from,
            to,
            districts,
            limit,
        } => {
            let store = db::connect_from_env().await?;

            let filter = report::resolve_filter(
                &store,
                from.as_deref(),
                to.as_deref(),
                districts.as_deref(),
            )
            .await?;
            let state = report::build(&store, &filter, limit).await?;
            let total = queries::count_incidents(&store).await?;

            println!("{}", report::format_state(&state));
            println!(
                "{} of {} incident(s) in the store match this filter",
                state.series.total_offenses(),
                total
            );
        }
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(crime_dashboard_server::run_server())
            })
            .await??;
        }
    }

    Ok(())
}
