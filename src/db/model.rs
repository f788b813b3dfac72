//! Row models returned by repository queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::model::PersistedProductState;

/// One row of the `products` table as stored.
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub link: String,
    pub category: String,
    pub name: String,
    pub price: i64,
    pub in_stock: bool,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for PersistedProductState {
    fn from(row: ProductRow) -> Self {
        PersistedProductState {
            link: row.link,
            category: row.category,
            name: row.name,
            price: row.price,
            in_stock: row.in_stock,
            first_seen_at: row.first_seen_at,
            updated_at: row.updated_at,
        }
    }
}
