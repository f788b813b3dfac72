use super::model::ProductRow;
use crate::model::{PersistedProductState, ProductFields};
use crate::store::{ProductStore, StoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {}", normalized))?
        .create_if_missing(true)
        // Enable WAL and stricter durability.
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", normalized))?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{}", expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Map driver errors onto the store's two failure classes.
fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        other => StoreError::Query(other.to_string()),
    }
}

const SELECT_PRODUCT: &str =
    "SELECT link, category, name, price, in_stock, first_seen_at, updated_at FROM products";

/// [`ProductStore`] backed by a SQLite `products` table.
#[derive(Debug, Clone)]
pub struct SqliteProductStore {
    pool: Pool,
}

impl SqliteProductStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Distinct categories present in the table, sorted.
    #[instrument(skip_all)]
    pub async fn categories(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM products ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// `(in_stock, sold_out)` row counts for one category.
    #[instrument(skip_all)]
    pub async fn stock_counts(&self, category: &str) -> Result<(i64, i64)> {
        let (in_stock, sold_out): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(in_stock), 0), COALESCE(SUM(1 - in_stock), 0) FROM products WHERE category = ?",
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok((in_stock, sold_out))
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    #[instrument(skip_all)]
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn find_one(
        &self,
        link: &str,
        category: &str,
    ) -> Result<Option<PersistedProductState>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "{} WHERE link = ? AND category = ?",
            SELECT_PRODUCT
        ))
        .bind(link)
        .bind(category)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(PersistedProductState::from))
    }

    #[instrument(skip_all)]
    async fn upsert(
        &self,
        link: &str,
        category: &str,
        fields: &ProductFields,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products (link, category, name, price, in_stock) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (link, category) DO UPDATE SET \
                name = excluded.name, \
                price = excluded.price, \
                in_stock = excluded.in_stock, \
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(link)
        .bind(category)
        .bind(&fields.name)
        .bind(fields.price)
        .bind(fields.in_stock)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        debug!(link, category, in_stock = fields.in_stock, "upserted product");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn scan_all(&self, category: &str) -> Result<Vec<PersistedProductState>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{} WHERE category = ? ORDER BY rowid ASC",
            SELECT_PRODUCT
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        Ok(rows.into_iter().map(PersistedProductState::from).collect())
    }
}
