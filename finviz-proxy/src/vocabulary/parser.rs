//! Markup extraction for the screener filter page.

use std::collections::HashMap;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{Filter, FilterOption, Signal, Sorter, VocabularySnapshot};
use crate::error::ParseError;

/// Tooltip attribute format: `key=[value] key=[value] ...`
const TOOLTIP_PATTERN: &str = r"(\w+)=\[(.*?)\]";

const FILTER_TABLE: &str = "table#filter-table-filters";
const FILTER_LABEL: &str = "span.screener-combo-title";
const FILTER_CONTROL: &str = "select.screener-combo-text";
const ORDER_OPTIONS: &str = "select#orderSelect option";
const SIGNAL_OPTIONS: &str = "select#signalSelect option";

/// Option labels that are not real filter choices.
const EXCLUDED_OPTIONS: &[&str] = &["Any", "Custom (Elite only)"];

/// Signal label meaning "no preset".
const NO_SIGNAL: &str = "None (all stocks)";

pub(crate) fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css,
        reason: format!("{:?}", e),
    })
}

pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse the filter page into a vocabulary snapshot.
///
/// Only a missing filter table is fatal. Individual entries with unexpected
/// markup are skipped and logged.
pub fn parse_vocabulary(html: &str) -> Result<VocabularySnapshot, ParseError> {
    let document = Html::parse_document(html);
    let pattern = Regex::new(TOOLTIP_PATTERN)?;

    let filters = parse_filters(&document, &pattern)?;
    let sorters = parse_sorters(&document)?;
    let signals = parse_signals(&document)?;

    Ok(VocabularySnapshot {
        filters,
        sorters,
        signals,
    })
}

/// Split a tooltip attribute into its `key=[value]` pairs.
pub fn parse_key_value_pairs(text: &str) -> Result<HashMap<String, String>, ParseError> {
    let pattern = Regex::new(TOOLTIP_PATTERN)?;
    Ok(key_value_pairs(&pattern, text))
}

fn key_value_pairs(pattern: &Regex, text: &str) -> HashMap<String, String> {
    pattern
        .captures_iter(text)
        .map(|caps| {
            let value = caps[2].trim_matches(|c| c == '[' || c == ']').to_string();
            (caps[1].to_string(), value)
        })
        .collect()
}

/// Extract the parameters of a (possibly relative) URL such as
/// `screener.ashx?v=111&o=price`.
pub fn parse_url_params(link: &str) -> HashMap<String, String> {
    let query = link.split_once('?').map_or(link, |(_, q)| q);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

// ============================================================================
// Filters
// ============================================================================

fn parse_filters(document: &Html, pattern: &Regex) -> Result<Vec<Filter>, ParseError> {
    let table_selector = selector(FILTER_TABLE)?;
    let table = document
        .select(&table_selector)
        .next()
        .ok_or(ParseError::MissingElement(FILTER_TABLE))?;

    let label_selector = selector(FILTER_LABEL)?;
    let control_selector = selector(FILTER_CONTROL)?;
    let cell_selector = selector("td")?;
    let option_selector = selector("option")?;

    let labels: Vec<ElementRef<'_>> = table.select(&label_selector).collect();
    let controls: Vec<ElementRef<'_>> = table.select(&control_selector).collect();

    if labels.len() != controls.len() {
        warn!(
            labels = labels.len(),
            controls = controls.len(),
            "Filter label and control counts differ, pairing the shorter run"
        );
    }

    let mut filters = Vec::with_capacity(labels.len());
    for (index, (label, control)) in labels.iter().zip(controls.iter()).enumerate() {
        let Some((name, description)) = parse_filter_label(label, pattern, &cell_selector) else {
            continue;
        };
        let Some((id, options)) = parse_filter_options(control, &option_selector) else {
            continue;
        };

        if options.is_empty() {
            warn!(index, filter = %id, "Filter has no selectable options, skipping");
            continue;
        }

        debug!(index, filter = %id, options = options.len(), "Filter parsed");
        filters.push(Filter {
            id,
            name,
            description,
            options,
        });
    }

    Ok(filters)
}

/// Name and description of a filter from its label's tooltip.
fn parse_filter_label(
    label: &ElementRef<'_>,
    pattern: &Regex,
    cell_selector: &Selector,
) -> Option<(String, String)> {
    let label_text = element_text(label);

    let Some(tooltip) = label.value().attr("data-boxover") else {
        warn!(label = %label_text, "Filter label has no data-boxover attribute, skipping");
        return None;
    };

    let pairs = key_value_pairs(pattern, tooltip);
    let name = pairs
        .get("header")
        .filter(|header| !header.is_empty())
        .cloned()
        .unwrap_or(label_text);

    if name.is_empty() {
        warn!("Filter label has neither header nor text, skipping");
        return None;
    }

    let Some(body) = pairs.get("body") else {
        warn!(filter = %name, "Filter tooltip has no body, description left empty");
        return Some((name, String::new()));
    };

    let fragment = Html::parse_fragment(body);
    let description = match fragment.select(cell_selector).next() {
        Some(cell) => element_text(&cell),
        None => {
            warn!(filter = %name, "Filter tooltip body has no cell, description left empty");
            String::new()
        }
    };

    Some((name, description))
}

/// Filter id and qualified options of a filter's select control.
fn parse_filter_options(
    control: &ElementRef<'_>,
    option_selector: &Selector,
) -> Option<(String, Vec<FilterOption>)> {
    let Some(prefix) = control.value().attr("data-filter") else {
        warn!(
            control = control.value().id().unwrap_or("<no id>"),
            "Filter control has no data-filter attribute, skipping"
        );
        return None;
    };

    let mut options = Vec::new();
    for option in control.select(option_selector) {
        let name = element_text(&option);
        if EXCLUDED_OPTIONS.contains(&name.as_str()) {
            continue;
        }

        match option.value().attr("value").filter(|v| !v.is_empty()) {
            Some(raw) => options.push(FilterOption {
                name,
                value: format!("{}_{}", prefix, raw),
            }),
            None => warn!(filter = %prefix, option = %name, "Filter option has no value, skipping"),
        }
    }

    Some((prefix.to_string(), options))
}

// ============================================================================
// Sorters and signals
// ============================================================================

fn parse_sorters(document: &Html) -> Result<Vec<Sorter>, ParseError> {
    let option_selector = selector(ORDER_OPTIONS)?;
    Ok(document
        .select(&option_selector)
        .filter_map(|option| {
            let (name, value) = option_token(&option, "o")?;
            Some(Sorter { name, value })
        })
        .collect())
}

fn parse_signals(document: &Html) -> Result<Vec<Signal>, ParseError> {
    let option_selector = selector(SIGNAL_OPTIONS)?;
    Ok(document
        .select(&option_selector)
        .filter(|option| element_text(option) != NO_SIGNAL)
        .filter_map(|option| {
            let (name, value) = option_token(&option, "s")?;
            Some(Signal { name, value })
        })
        .collect())
}

/// Display name and the `param` token carried in an option's link value.
fn option_token(option: &ElementRef<'_>, param: &str) -> Option<(String, String)> {
    let name = element_text(option);

    let Some(link) = option.value().attr("value") else {
        warn!(option = %name, "Option has no value attribute, skipping");
        return None;
    };

    match parse_url_params(link).remove(param).filter(|v| !v.is_empty()) {
        Some(token) => Some((name, token)),
        None => {
            warn!(option = %name, param, "Option link carries no token, skipping");
            None
        }
    }
}
