use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use stock_watchbot::config;
use stock_watchbot::db::{self, SqliteProductStore};
use stock_watchbot::model::RunOutcome;
use stock_watchbot::notify::TelegramNotifier;
use stock_watchbot::runner::CategoryRunner;
use stock_watchbot::scheduler;
use stock_watchbot::scrape::HtmlScraper;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run each selected category once and exit instead of scheduling
    #[arg(long)]
    once: bool,

    /// Only handle this category (by name)
    #[arg(long)]
    category: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
        tracing_subscriber::EnvFilter::new(level.to_lowercase())
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let categories = match &args.category {
        Some(name) => vec![cfg
            .category(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown category {}", name))?],
        None => cfg.categories.clone(),
    };

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let runner = Arc::new(CategoryRunner::new(
        Arc::new(HtmlScraper::from_config(&cfg.scraper)?),
        Arc::new(SqliteProductStore::new(pool)),
        Arc::new(TelegramNotifier::new(&cfg.telegram)),
        cfg.backoff(),
    ));

    if args.once {
        for (name, outcome) in runner.run_all(&categories).await {
            match outcome {
                RunOutcome::Applied(report) => info!(category = %name, ?report, "applied"),
                other => warn!(category = %name, outcome = other.as_str(), "not applied"),
            }
        }
        return Ok(());
    }

    info!(categories = categories.len(), "starting stock watcher");
    scheduler::run_until(runner, categories, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}
