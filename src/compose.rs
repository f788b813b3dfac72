use crate::model::{ChangeEntry, ChangeSummary};

pub const RESTOCKED_HEADER: &str = "NEW PRODUCT IN STOCK! :";
pub const SOLD_OUT_HEADER: &str = "NO LONGER IN STOCK, SOLD!:";

/// Message texts for one reconciliation pass. A side with no entries is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedMessages {
    pub restocked: Option<String>,
    pub sold_out: Option<String>,
}

impl ComposedMessages {
    /// Non-empty messages in delivery order: restocked first, then sold out.
    pub fn into_messages(self) -> Vec<String> {
        self.restocked.into_iter().chain(self.sold_out).collect()
    }
}

pub fn compose(summary: &ChangeSummary) -> ComposedMessages {
    ComposedMessages {
        restocked: render(RESTOCKED_HEADER, &summary.new_or_restocked),
        sold_out: render(SOLD_OUT_HEADER, &summary.sold_out),
    }
}

fn render(header: &str, entries: &[ChangeEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut text = String::from(header);
    for entry in entries {
        text.push_str("\n\n");
        text.push_str(&format!("{} - {} - {}", entry.name, entry.price, entry.link));
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeKind;

    fn entry(kind: ChangeKind, name: &str, price: i64, link: &str) -> ChangeEntry {
        ChangeEntry {
            kind,
            name: name.into(),
            price,
            link: link.into(),
        }
    }

    #[test]
    fn empty_summary_composes_nothing() {
        let out = compose(&ChangeSummary::default());
        assert_eq!(out, ComposedMessages::default());
        assert!(out.into_messages().is_empty());
    }

    #[test]
    fn restocked_blocks_are_separated_by_blank_lines() {
        let summary = ChangeSummary {
            new_or_restocked: vec![
                entry(ChangeKind::NewListing, "Card A", 1000, "https://shop/a"),
                entry(ChangeKind::BackInStock, "Card B", 2000, "https://shop/b"),
            ],
            sold_out: vec![],
        };
        let out = compose(&summary);
        assert_eq!(
            out.restocked.as_deref(),
            Some(
                "NEW PRODUCT IN STOCK! :\n\nCard A - 1000 - https://shop/a\n\nCard B - 2000 - https://shop/b"
            )
        );
        assert!(out.sold_out.is_none());
    }

    #[test]
    fn single_change_is_enough_to_notify() {
        let summary = ChangeSummary {
            new_or_restocked: vec![],
            sold_out: vec![entry(ChangeKind::SoldOut, "Chip", 5, "/c")],
        };
        let out = compose(&summary);
        assert_eq!(
            out.sold_out.as_deref(),
            Some("NO LONGER IN STOCK, SOLD!:\n\nChip - 5 - /c")
        );
        assert_eq!(out.into_messages().len(), 1);
    }

    #[test]
    fn long_summaries_are_not_truncated() {
        let entries: Vec<ChangeEntry> = (0..500)
            .map(|i| entry(ChangeKind::NewListing, "Some long product name", i, "https://shop/item"))
            .collect();
        let summary = ChangeSummary {
            new_or_restocked: entries,
            sold_out: vec![],
        };
        let text = compose(&summary).restocked.unwrap();
        assert!(text.len() > 4096);
        assert_eq!(text.matches("Some long product name").count(), 500);
    }
}
