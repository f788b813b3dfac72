//! Persisted product state, addressed by `(link, category)`.
use async_trait::async_trait;
use thiserror::Error;

use crate::model::{PersistedProductState, ProductFields};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached at all; safe to retry later.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store query failed: {0}")]
    Query(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Cheap round trip used as a pre-flight availability check.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_one(
        &self,
        link: &str,
        category: &str,
    ) -> Result<Option<PersistedProductState>, StoreError>;

    /// Insert the row on first sighting, otherwise overwrite its fields.
    async fn upsert(
        &self,
        link: &str,
        category: &str,
        fields: &ProductFields,
    ) -> Result<(), StoreError>;

    /// Every row of `category`, in insertion order.
    async fn scan_all(&self, category: &str) -> Result<Vec<PersistedProductState>, StoreError>;
}
