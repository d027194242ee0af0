mod extract;
mod pacer;
mod scrape;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pricewatch")]
#[command(about = "Track retailer product prices")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape active product links and record prices
    Scrape {
        /// Restrict the run to one retailer (id or alias)
        #[arg(long)]
        retailer: Option<String>,

        /// Scrape a single product link by id
        #[arg(long)]
        link: Option<i64>,

        /// List the links that would be scraped without fetching anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract a price from a saved HTML page without touching the network
    Extract {
        /// Retailer whose selectors and rules to apply (id or alias)
        #[arg(long)]
        retailer: String,

        /// Retailers configuration file
        #[arg(
            long,
            env = "PRICEWATCH_RETAILERS_PATH",
            default_value = "./config/retailers.yaml"
        )]
        retailers_path: PathBuf,

        /// Saved product page
        file: PathBuf,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("pricewatch: no command given; see --help");
        return Ok(());
    };

    match command {
        // Offline extraction needs neither the database nor DATABASE_URL.
        Commands::Extract {
            retailer,
            retailers_path,
            file,
        } => {
            init_tracing("info")?;
            extract::run_extract(&retailers_path, &retailer, &file)
        }
        Commands::Scrape {
            retailer,
            link,
            dry_run,
        } => {
            let (config, pool) = connect().await?;
            scrape::run_scrape(&pool, &config, retailer.as_deref(), link, dry_run).await
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            let (_, pool) = connect().await?;
            pricewatch_db::ping(&pool)
                .await
                .context("database ping failed")?;
            println!("database: ok");
            Ok(())
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let (_, pool) = connect().await?;
            let applied = pricewatch_db::run_migrations(&pool)
                .await
                .context("failed to run migrations")?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
    }
}

/// Loads configuration, installs tracing and opens the database pool.
async fn connect() -> anyhow::Result<(pricewatch_core::AppConfig, sqlx::PgPool)> {
    let config = pricewatch_core::load_app_config().context("failed to load configuration")?;
    init_tracing(&config.log_level)?;
    tracing::debug!(env = ?config.env, "configuration loaded");

    let pool_config = pricewatch_db::PoolConfig::from_app_config(&config);
    let pool = pricewatch_db::connect_pool(&config.database_url, pool_config)
        .await
        .context("failed to connect to database")?;
    Ok((config, pool))
}

/// Installs the `fmt` subscriber. `RUST_LOG` wins over `default_directive`.
fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

/// Marks a run as failed, logging rather than propagating a secondary error.
async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    message: &str,
    counts: pricewatch_db::ScrapeRunCounts,
) {
    if let Err(mark_err) = pricewatch_db::fail_scrape_run(pool, run_id, message, counts).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark scrape run as failed"
        );
    }
}
