//! Table decoding for screener pages and CSV exports.
//!
//! Rows keep whatever number of cells the source has. They are never padded
//! or truncated to the header count.

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ParseError;
use crate::vocabulary::{element_text, selector};

const SCREENER_TABLE: &str = "#screener-table";

/// Headers plus rows of cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }
}

/// Decode the result table of a screener page.
///
/// Header cells without a `header` class are decorative and ignored. Rows come
/// from every `tbody` next to the table's `thead`.
pub fn parse_screener_table(page: &[u8]) -> Result<Table, ParseError> {
    let html = String::from_utf8_lossy(page);
    let document = Html::parse_document(&html);

    let container_selector = selector(SCREENER_TABLE)?;
    let thead_selector = selector("thead")?;
    let th_selector = selector("th")?;
    let tr_selector = selector("tr")?;
    let td_selector = selector("td")?;

    let container = document
        .select(&container_selector)
        .next()
        .ok_or(ParseError::MissingElement(SCREENER_TABLE))?;
    let thead = container
        .select(&thead_selector)
        .next()
        .ok_or(ParseError::MissingElement("#screener-table thead"))?;

    let headers = thead
        .select(&th_selector)
        .filter(|th| th.value().attr("class").is_some_and(|class| class.contains("header")))
        .map(|th| element_text(&th))
        .collect();

    let bodies = thead
        .parent()
        .into_iter()
        .flat_map(|parent| parent.children())
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "tbody");

    let mut rows = Vec::new();
    for body in bodies {
        for tr in body.select(&tr_selector) {
            rows.push(tr.select(&td_selector).map(|td| element_text(&td)).collect());
        }
    }

    Ok(Table { headers, rows })
}

/// Decode a CSV export. The first record is the header row; a record that
/// fails to decode is logged and skipped.
pub fn parse_export_csv(data: &[u8]) -> Table {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut table = Table::default();
    let mut seen_header = false;

    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(record = index, error = %e, "Skipping malformed CSV record");
                continue;
            }
        };

        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if seen_header {
            table.rows.push(cells);
        } else {
            table.headers = cells;
            seen_header = true;
        }
    }

    table
}
