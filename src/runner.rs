use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::compose::compose;
use crate::config::CategoryConfig;
use crate::dedupe::dedupe;
use crate::model::{ProductRecord, RunOutcome, RunReport};
use crate::notify::Notifier;
use crate::reconcile::reconcile;
use crate::scrape::{ScrapeOutcome, Scraper};
use crate::store::{ProductStore, StoreError};

/// Capped exponential backoff for the pre-flight store check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total pings before giving up, including the first.
    pub attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base: Duration::from_secs(5),
            max: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped at `max`.
    pub fn delay(&self, retry: u32) -> Duration {
        self.base
            .saturating_mul(1u32 << retry.min(16))
            .min(self.max)
    }
}

/// Ping the store until it answers or the policy runs out of attempts.
pub async fn wait_until_available(
    store: &dyn ProductStore,
    policy: &BackoffPolicy,
) -> Result<(), StoreError> {
    let mut attempt = 0u32;
    loop {
        match store.ping().await {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.attempts {
                    return Err(err);
                }
                let delay = policy.delay(attempt - 1);
                warn!(%err, attempt, max_attempts = policy.attempts, ?delay, "store not available; retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// One async mutex per category name, created on first use.
#[derive(Debug, Clone, Default)]
pub struct CategoryLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl CategoryLocks {
    pub async fn acquire(&self, category: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(category.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Runs scrape, dedupe, reconcile, compose and deliver for one category,
/// containing every failure at its boundary.
pub struct CategoryRunner {
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn ProductStore>,
    notifier: Arc<dyn Notifier>,
    locks: CategoryLocks,
    backoff: BackoffPolicy,
}

impl CategoryRunner {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn ProductStore>,
        notifier: Arc<dyn Notifier>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            scraper,
            store,
            notifier,
            locks: CategoryLocks::default(),
            backoff,
        }
    }

    pub async fn run(&self, category: &CategoryConfig) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("category_run", category = %category.name, %run_id);
        let outcome = self.run_locked(category).instrument(span.clone()).await;
        span.in_scope(|| info!(outcome = outcome.as_str(), "run finished"));
        outcome
    }

    /// Run every category once, concurrently.
    pub async fn run_all(&self, categories: &[CategoryConfig]) -> Vec<(String, RunOutcome)> {
        let runs = categories.iter().map(|c| async move { (c.name.clone(), self.run(c).await) });
        join_all(runs).await
    }

    async fn run_locked(&self, category: &CategoryConfig) -> RunOutcome {
        let _guard = self.locks.acquire(&category.name).await;
        info!("run started");

        let scraped = match self.scraper.scrape(category).await {
            Ok(ScrapeOutcome::Complete(batch)) => batch,
            Ok(ScrapeOutcome::Incomplete { reason }) => {
                warn!(%reason, "scrape incomplete; leaving store untouched until next run");
                return RunOutcome::SkippedIncompleteScrape;
            }
            Err(err) => {
                warn!(%err, "scrape failed; leaving store untouched until next run");
                return RunOutcome::SkippedIncompleteScrape;
            }
        };

        let batch: Vec<ProductRecord> = scraped
            .into_iter()
            .map(|mut record| {
                record.category = category.name.clone();
                record
            })
            .collect();
        let batch = dedupe(batch);

        if let Err(err) = wait_until_available(self.store.as_ref(), &self.backoff).await {
            error!(%err, "store unavailable; skipping run");
            return RunOutcome::SkippedStoreUnavailable;
        }

        let summary = match reconcile(&category.name, &batch, self.store.as_ref()).await {
            Ok(summary) => summary,
            Err(err) => {
                error!(%err, "reconciliation aborted");
                return RunOutcome::Failed(err.to_string());
            }
        };

        let mut report = RunReport {
            scraped: batch.len(),
            new_or_restocked: summary.new_or_restocked.len(),
            sold_out: summary.sold_out.len(),
            ..RunReport::default()
        };
        for message in compose(&summary).into_messages() {
            match self.notifier.deliver(&message).await {
                Ok(()) => report.messages_sent += 1,
                Err(err) => {
                    error!(%err, "notification delivery failed");
                    report.messages_failed += 1;
                }
            }
        }

        info!(
            scraped = report.scraped,
            new_or_restocked = report.new_or_restocked,
            sold_out = report.sold_out,
            messages_sent = report.messages_sent,
            messages_failed = report.messages_failed,
            "run applied"
        );
        RunOutcome::Applied(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(40));
        assert_eq!(policy.delay(4), Duration::from_secs(60));
        assert_eq!(policy.delay(40), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn locks_are_shared_per_category() {
        let locks = CategoryLocks::default();
        let gpu = locks.acquire("gpu").await;

        // A different category is not blocked.
        let _cpu = locks.acquire("cpu").await;

        let second = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = second.acquire("gpu").await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(gpu);
        waiter.await.unwrap();
    }
}
