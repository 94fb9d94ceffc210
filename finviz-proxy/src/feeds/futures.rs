//! Futures quote board.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ParseError, ProxyError};
use crate::upstream::UpstreamClient;

/// One futures contract quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureQuote {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub last: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub prev_close: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
}

/// All quotes keyed by upstream id.
pub type FuturesBoard = BTreeMap<String, FutureQuote>;

pub fn parse_futures(payload: &[u8]) -> Result<FuturesBoard, ParseError> {
    Ok(serde_json::from_slice(payload)?)
}

pub async fn fetch_futures(client: &UpstreamClient) -> Result<FuturesBoard, ProxyError> {
    let payload = client.fetch_futures().await?;
    let board = parse_futures(&payload)?;
    info!(quotes = board.len(), "Futures fetched");
    Ok(board)
}

/// Quotes whose label matches each requested symbol, in request order.
pub fn select_futures(board: &FuturesBoard, symbols: &[String]) -> Result<Vec<FutureQuote>, ProxyError> {
    symbols
        .iter()
        .map(|symbol| {
            board
                .values()
                .find(|quote| &quote.label == symbol)
                .cloned()
                .ok_or_else(|| ProxyError::BadRequest(format!("can't find symbol: {}", symbol)))
        })
        .collect()
}
