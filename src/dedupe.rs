use std::collections::HashSet;

use tracing::{debug, info};

use crate::model::ProductRecord;

/// Drop structural duplicates produced by overlapping scrape pages.
///
/// Keeps the first occurrence of each distinct record.
pub fn dedupe(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let original = records.len();
    let mut seen: HashSet<ProductRecord> = HashSet::with_capacity(original);
    let mut unique = Vec::with_capacity(original);
    for record in records {
        if seen.contains(&record) {
            debug!(link = %record.link, "dropping duplicate record");
            continue;
        }
        seen.insert(record.clone());
        unique.push(record);
    }
    info!(original, deduplicated = unique.len(), "removed duplicate records");
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, price: i64, link: &str) -> ProductRecord {
        ProductRecord::scraped(name, price, link, "gpu")
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(dedupe(Vec::new()).is_empty());
    }

    #[test]
    fn k_copies_reduce_to_one() {
        let batch = vec![rec("Card A", 1000, "/a"); 5];
        let out = dedupe(batch);
        assert_eq!(out, vec![rec("Card A", 1000, "/a")]);
    }

    #[test]
    fn records_differing_in_any_field_are_kept() {
        let mut other_category = rec("Card A", 1000, "/a");
        other_category.category = "cpu".into();
        let batch = vec![
            rec("Card A", 1000, "/a"),
            rec("Card A", 1100, "/a"),
            rec("Card A v2", 1000, "/a"),
            other_category,
        ];
        assert_eq!(dedupe(batch).len(), 4);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let batch = vec![
            rec("Card A", 1000, "/a"),
            rec("Card B", 2000, "/b"),
            rec("Card A", 1000, "/a"),
            rec("Card C", 3000, "/c"),
            rec("Card B", 2000, "/b"),
        ];
        let once = dedupe(batch);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }
}
