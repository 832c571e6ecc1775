mod api;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod services;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "fixturecast")]
#[command(about = "Football fixtures and predictions ingestion service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Fetch fixtures for a date (defaults to today, UTC)
    FetchFixtures {
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// How many consecutive days to ingest
        #[arg(long, default_value = "1")]
        days: u32,
    },
    /// Fetch provider predictions for a date's major-league fixtures
    FetchPredictions {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Generate a model insight for one fixture
    Enrich {
        #[arg(short, long)]
        fixture: i64,
    },
    /// Run the daily 00:01 UTC fixture schedule in the foreground
    Schedule,
    /// Initialize the database
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            let config = Config::from_env()?;
            tracing::info!("Starting fixturecast API server on port {}", port);
            api::serve(port, config).await?;
        }
        Some(Commands::FetchFixtures { date, days }) => {
            let config = Config::from_env()?;
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            cli::fetch_fixtures(&config, date, days.max(1)).await?;
        }
        Some(Commands::FetchPredictions { date }) => {
            let config = Config::from_env()?;
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            cli::fetch_predictions(&config, date).await?;
        }
        Some(Commands::Enrich { fixture }) => {
            let config = Config::from_env()?;
            cli::enrich(&config, fixture).await?;
        }
        Some(Commands::Schedule) => {
            let config = Config::from_env()?;
            cli::schedule(&config).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            cli::init_db().await?;
        }
        None => {
            // Default to serving
            let config = Config::from_env()?;
            tracing::info!("Starting fixturecast API server on port 3000");
            api::serve(3000, config).await?;
        }
    }

    Ok(())
}
