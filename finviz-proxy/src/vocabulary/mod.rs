//! Screener vocabulary: the filters, sort orders and signal presets the
//! upstream currently accepts.
//!
//! The vocabulary is scraped from the screener's filter page, published as an
//! immutable [`VocabularySnapshot`] through a [`SnapshotStore`], and replaced
//! wholesale by the background refresher.

mod parser;
mod store;

pub use parser::{parse_key_value_pairs, parse_url_params, parse_vocabulary};
pub(crate) use parser::{element_text, selector};
pub use store::SnapshotStore;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProxyError;
use crate::upstream::UpstreamClient;

/// Query the upstream filter page is requested with.
pub const VOCABULARY_QUERY: &str = "ft=4";

/// One selectable choice of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub name: String,
    /// Fully-qualified value, `filterId_rawValue`
    pub value: String,
}

/// A filter category with its options in UI order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: String,
    pub name: String,
    pub description: String,
    pub options: Vec<FilterOption>,
}

impl Filter {
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// A sortable column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub name: String,
    pub value: String,
}

/// A named preset screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub value: String,
}

/// The complete vocabulary at one point in time. Never mutated after publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularySnapshot {
    pub filters: Vec<Filter>,
    pub sorters: Vec<Sorter>,
    pub signals: Vec<Signal>,
}

impl VocabularySnapshot {
    pub fn has_sorter(&self, value: &str) -> bool {
        self.sorters.iter().any(|s| s.value == value)
    }

    pub fn has_signal(&self, value: &str) -> bool {
        self.signals.iter().any(|s| s.value == value)
    }

    /// True when any filter offers `value`.
    pub fn has_filter_option(&self, value: &str) -> bool {
        self.filters.iter().any(|f| f.has_option(value))
    }

    pub fn filter(&self, id: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.id == id)
    }
}

/// Fetch the filter page and parse it into a fresh snapshot.
pub async fn fetch_vocabulary(client: &UpstreamClient) -> Result<VocabularySnapshot, ProxyError> {
    let page = client.fetch_screener(VOCABULARY_QUERY).await?;
    let html = String::from_utf8_lossy(&page);
    let snapshot = parse_vocabulary(&html)?;

    info!(
        filters = snapshot.filters.len(),
        sorters = snapshot.sorters.len(),
        signals = snapshot.signals.len(),
        "Vocabulary fetched"
    );

    Ok(snapshot)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_snapshot() -> VocabularySnapshot {
        VocabularySnapshot {
            filters: vec![
                Filter {
                    id: "exch".into(),
                    name: "Exchange".into(),
                    description: "Stock Exchange at which a stock is listed.".into(),
                    options: vec![
                        FilterOption { name: "AMEX".into(), value: "exch_amex".into() },
                        FilterOption { name: "NASDAQ".into(), value: "exch_nasd".into() },
                    ],
                },
                Filter {
                    id: "cap".into(),
                    name: "Market Cap.".into(),
                    description: String::new(),
                    options: vec![FilterOption { name: "Mega".into(), value: "cap_mega".into() }],
                },
            ],
            sorters: vec![Sorter { name: "Price".into(), value: "price".into() }],
            signals: vec![Signal { name: "Top Gainers".into(), value: "ta_topgainers".into() }],
        }
    }

    #[test]
    fn test_snapshot_lookups() {
        let snapshot = sample_snapshot();
        assert!(snapshot.has_sorter("price"));
        assert!(!snapshot.has_sorter("bogus"));
        assert!(snapshot.has_signal("ta_topgainers"));
        assert!(snapshot.has_filter_option("cap_mega"));
        assert!(!snapshot.has_filter_option("cap_nano"));
        assert_eq!(snapshot.filter("exch").map(|f| f.options.len()), Some(2));
        assert!(snapshot.filter("sec").is_none());
    }

    #[test]
    fn test_snapshot_serialization() {
        let json = serde_json::to_value(sample_snapshot()).unwrap();
        assert_eq!(json["filters"][0]["id"], "exch");
        assert_eq!(json["filters"][0]["options"][1]["value"], "exch_nasd");
        assert_eq!(json["sorters"][0]["value"], "price");
        assert_eq!(json["signals"][0]["name"], "Top Gainers");
    }
}
