use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use stock_watchbot::config;
use stock_watchbot::db::{self, SqliteProductStore};
use stock_watchbot::store::ProductStore;

#[derive(Debug, Parser)]
#[command(author, version, about = "Print the persisted stock state per category")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only print this category; defaults to every category in the database
    #[arg(long)]
    category: Option<String>,

    /// Emit one JSON array of rows instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;
    let store = SqliteProductStore::new(pool);

    let categories = match args.category {
        Some(name) => vec![name],
        None => store.categories().await?,
    };

    if args.json {
        let mut rows = Vec::new();
        for category in &categories {
            rows.extend(store.scan_all(category).await?);
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for category in &categories {
        let (in_stock, sold_out) = store.stock_counts(category).await?;
        println!("[{}] in stock: {} sold out: {}", category, in_stock, sold_out);
        for row in store.scan_all(category).await? {
            let mark = if row.in_stock { "+" } else { "-" };
            println!(
                "  {} {} - {} - {} (seen since {}, updated {})",
                mark,
                row.name,
                row.price,
                row.link,
                row.first_seen_at.format("%Y-%m-%d"),
                row.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}
