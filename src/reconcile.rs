//! Stock-diff reconciliation for one category.
//!
//! A batch is treated as a full snapshot of what is currently listed: every
//! record in it is upserted as in stock, and every previously in-stock row
//! whose link is missing from it is flipped to sold out. Membership, not
//! position, drives classification, so pagination changes on the source site
//! do not produce spurious transitions.
use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::model::{ChangeEntry, ChangeKind, ChangeSummary, ProductFields, ProductRecord};
use crate::store::{ProductStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A store operation failed mid-run. `applied` counts the batch records
    /// already written, so the partial state is visible when diagnosing.
    #[error("persistence failure in category {category} at {link} after {applied} applied records: {source}")]
    PersistenceFailure {
        category: String,
        link: String,
        applied: usize,
        #[source]
        source: StoreError,
    },
}

/// Apply `batch` to the persisted rows of `category` and report transitions.
///
/// `batch` must be a complete scrape; callers skip the run otherwise. Must not
/// run concurrently with another reconciliation of the same category.
#[instrument(skip_all, fields(category = %category, batch = batch.len()))]
pub async fn reconcile(
    category: &str,
    batch: &[ProductRecord],
    store: &dyn ProductStore,
) -> Result<ChangeSummary, ReconcileError> {
    let mut summary = ChangeSummary::default();
    let mut seen_links: HashSet<&str> = HashSet::with_capacity(batch.len());
    let mut applied = 0usize;

    let failure = |link: &str, applied: usize, source: StoreError| ReconcileError::PersistenceFailure {
        category: category.to_string(),
        link: link.to_string(),
        applied,
        source,
    };

    for record in batch {
        if record.category != category {
            warn!(
                link = %record.link,
                record_category = %record.category,
                "dropping record from another category"
            );
            continue;
        }
        seen_links.insert(record.link.as_str());

        let existing = store
            .find_one(&record.link, category)
            .await
            .map_err(|e| failure(&record.link, applied, e))?;

        let kind = match existing {
            None => Some(ChangeKind::NewListing),
            Some(row) if !row.in_stock => Some(ChangeKind::BackInStock),
            Some(_) => None,
        };
        if let Some(kind) = kind {
            info!(
                kind = kind.as_str(),
                name = %record.name,
                price = record.price,
                link = %record.link,
                "stock change"
            );
            summary.new_or_restocked.push(ChangeEntry {
                kind,
                name: record.name.clone(),
                price: record.price,
                link: record.link.clone(),
            });
        }

        store
            .upsert(&record.link, category, &record.fields())
            .await
            .map_err(|e| failure(&record.link, applied, e))?;
        applied += 1;
    }

    debug!("sweeping for sold out products");
    let rows = store
        .scan_all(category)
        .await
        .map_err(|e| failure("<scan>", applied, e))?;
    for row in rows {
        if seen_links.contains(row.link.as_str()) || !row.in_stock {
            continue;
        }
        info!(
            kind = ChangeKind::SoldOut.as_str(),
            name = %row.name,
            price = row.price,
            link = %row.link,
            "stock change"
        );
        let fields = ProductFields {
            name: row.name.clone(),
            price: row.price,
            in_stock: false,
        };
        store
            .upsert(&row.link, category, &fields)
            .await
            .map_err(|e| failure(&row.link, applied, e))?;
        summary.sold_out.push(ChangeEntry {
            kind: ChangeKind::SoldOut,
            name: row.name,
            price: row.price,
            link: row.link,
        });
    }

    info!(
        new_or_restocked = summary.new_or_restocked.len(),
        sold_out = summary.sold_out.len(),
        "reconciliation complete"
    );
    Ok(summary)
}
