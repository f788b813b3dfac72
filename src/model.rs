use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped listing at a point in time.
///
/// Equality and hashing are structural over every field; `link` is the
/// natural key inside a category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub price: i64,
    pub link: String,
    pub in_stock: bool,
    pub category: String,
}

impl ProductRecord {
    /// A freshly scraped record, which is always in stock.
    pub fn scraped(
        name: impl Into<String>,
        price: i64,
        link: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            link: link.into(),
            in_stock: true,
            category: category.into(),
        }
    }

    pub fn fields(&self) -> ProductFields {
        ProductFields {
            name: self.name.clone(),
            price: self.price,
            in_stock: true,
        }
    }
}

/// Mutable part of a persisted row; `(link, category)` addresses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFields {
    pub name: String,
    pub price: i64,
    pub in_stock: bool,
}

/// Durable counterpart of [`ProductRecord`], one row per `(link, category)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedProductState {
    pub link: String,
    pub category: String,
    pub name: String,
    pub price: i64,
    pub in_stock: bool,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    NewListing,
    BackInStock,
    SoldOut,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::NewListing => "new_listing",
            ChangeKind::BackInStock => "back_in_stock",
            ChangeKind::SoldOut => "sold_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub kind: ChangeKind,
    pub name: String,
    pub price: i64,
    pub link: String,
}

/// Transitions found by one reconciliation pass.
///
/// `new_or_restocked` is in batch order, `sold_out` in persisted-scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub new_or_restocked: Vec<ChangeEntry>,
    pub sold_out: Vec<ChangeEntry>,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.new_or_restocked.is_empty() && self.sold_out.is_empty()
    }

    pub fn sold_out_links(&self) -> Vec<&str> {
        self.sold_out.iter().map(|e| e.link.as_str()).collect()
    }

    pub fn new_or_restocked_links(&self) -> Vec<&str> {
        self.new_or_restocked
            .iter()
            .map(|e| e.link.as_str())
            .collect()
    }
}

/// Counts reported by a run whose diff was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub scraped: usize,
    pub new_or_restocked: usize,
    pub sold_out: usize,
    pub messages_sent: usize,
    pub messages_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Applied(RunReport),
    SkippedIncompleteScrape,
    SkippedStoreUnavailable,
    Failed(String),
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Applied(_) => "applied",
            RunOutcome::SkippedIncompleteScrape => "skipped_incomplete_scrape",
            RunOutcome::SkippedStoreUnavailable => "skipped_store_unavailable",
            RunOutcome::Failed(_) => "failed",
        }
    }
}
