#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stock_watchbot::config::CategoryConfig;
use stock_watchbot::db::SqliteProductStore;
use stock_watchbot::model::{PersistedProductState, ProductFields, ProductRecord};
use stock_watchbot::notify::{Notifier, NotifyError};
use stock_watchbot::scrape::{ScrapeError, ScrapeOutcome, Scraper};
use stock_watchbot::store::{ProductStore, StoreError};
use tokio::sync::Mutex;

pub async fn setup_sqlite_store() -> SqliteProductStore {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    SqliteProductStore::new(pool)
}

pub fn record(link: &str, name: &str, price: i64) -> ProductRecord {
    ProductRecord::scraped(name, price, link, "gpu")
}

pub fn category(name: &str, minutes: u64) -> CategoryConfig {
    CategoryConfig {
        name: name.into(),
        base_url: format!("https://shop.example/{}", name),
        interval_minutes: minutes,
    }
}

/// In-memory store with switchable failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<PersistedProductState>>>,
    fail_upsert_link: Arc<Mutex<Option<String>>>,
    fail_lookup: Arc<Mutex<Option<(String, bool)>>>,
    unavailable_pings: Arc<AtomicUsize>,
    pings: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub async fn seed(&self, link: &str, category: &str, name: &str, price: i64, in_stock: bool) {
        let now = Utc::now();
        self.rows.lock().await.push(PersistedProductState {
            link: link.into(),
            category: category.into(),
            name: name.into(),
            price,
            in_stock,
            first_seen_at: now,
            updated_at: now,
        });
    }

    pub async fn row(&self, link: &str, category: &str) -> Option<PersistedProductState> {
        self.rows
            .lock()
            .await
            .iter()
            .find(|r| r.link == link && r.category == category)
            .cloned()
    }

    pub async fn rows(&self) -> Vec<PersistedProductState> {
        self.rows.lock().await.clone()
    }

    pub async fn fail_upserts_for(&self, link: &str) {
        *self.fail_upsert_link.lock().await = Some(link.to_string());
    }

    /// Lookups of `link` fail with a query error.
    pub async fn fail_lookups_for(&self, link: &str) {
        *self.fail_lookup.lock().await = Some((link.to_string(), false));
    }

    /// Lookups of `link` fail as if the connection dropped mid-run.
    pub async fn disconnect_at_lookup_of(&self, link: &str) {
        *self.fail_lookup.lock().await = Some((link.to_string(), true));
    }

    /// The next `n` pings report the store as unavailable.
    pub fn unavailable_for(&self, n: usize) {
        self.unavailable_pings.store(n, Ordering::SeqCst);
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProductStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let remaining = self.unavailable_pings.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unavailable_pings.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    async fn find_one(
        &self,
        link: &str,
        category: &str,
    ) -> Result<Option<PersistedProductState>, StoreError> {
        if let Some((failing, unavailable)) = self.fail_lookup.lock().await.clone() {
            if failing == link {
                return Err(if unavailable {
                    StoreError::Unavailable("connection reset".into())
                } else {
                    StoreError::Query(format!("lookup rejected for {}", link))
                });
            }
        }
        Ok(self.row(link, category).await)
    }

    async fn upsert(
        &self,
        link: &str,
        category: &str,
        fields: &ProductFields,
    ) -> Result<(), StoreError> {
        if self.fail_upsert_link.lock().await.as_deref() == Some(link) {
            return Err(StoreError::Query(format!("write rejected for {}", link)));
        }
        let mut rows = self.rows.lock().await;
        let now = Utc::now();
        match rows
            .iter_mut()
            .find(|r| r.link == link && r.category == category)
        {
            Some(row) => {
                row.name = fields.name.clone();
                row.price = fields.price;
                row.in_stock = fields.in_stock;
                row.updated_at = now;
            }
            None => rows.push(PersistedProductState {
                link: link.into(),
                category: category.into(),
                name: fields.name.clone(),
                price: fields.price,
                in_stock: fields.in_stock,
                first_seen_at: now,
                updated_at: now,
            }),
        }
        Ok(())
    }

    async fn scan_all(&self, category: &str) -> Result<Vec<PersistedProductState>, StoreError> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect())
    }
}

/// Scraper returning queued outcomes; `Complete(vec![])` once the queue is empty.
#[derive(Clone, Default)]
pub struct RecordingScraper {
    responses: Arc<Mutex<VecDeque<Result<ScrapeOutcome, ScrapeError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl RecordingScraper {
    pub fn with_responses(responses: Vec<Result<ScrapeOutcome, ScrapeError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Scraper for RecordingScraper {
    async fn scrape(&self, category: &CategoryConfig) -> Result<ScrapeOutcome, ScrapeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().await.push(category.name.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(ScrapeOutcome::Complete(Vec::new())));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery {
                failed: vec![1],
                last_error: "bot was blocked by the user".into(),
            });
        }
        self.messages.lock().await.push(text.to_string());
        Ok(())
    }
}
