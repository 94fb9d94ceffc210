//! Query validation against the live vocabulary and canonical URI building.
//!
//! A caller query is checked against one [`VocabularySnapshot`] and turned
//! into a [`TableParams`]. Its [`build_uri`](TableParams::build_uri) output is
//! both the upstream query string and the response cache key, so it depends
//! only on the validated field values and never on the order keys arrived in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vocabulary::VocabularySnapshot;

/// Multi-valued query, keys in sorted order.
pub type QueryMap = BTreeMap<String, Vec<String>>;

/// Decode a raw `application/x-www-form-urlencoded` query string.
pub fn parse_query(raw: &str) -> QueryMap {
    let mut query = QueryMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        query.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    query
}

// ============================================================================
// Errors
// ============================================================================

/// A query rejected against the current vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("invalid query key: {key}")]
    InvalidKey { key: String, value: String },

    #[error("invalid order: {value}")]
    InvalidOrder { value: String },

    #[error("invalid signal: {value}")]
    InvalidSignal { value: String },

    #[error("invalid filter {key}: {value}")]
    InvalidFilter { key: String, value: String },

    #[error("missing api key")]
    MissingApiKey,
}

/// Wire form of a [`ParamError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamErrorPayload {
    pub code: String,
    pub key: String,
    pub value: String,
}

impl ParamError {
    /// Machine-readable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey { .. } => "invalid_key",
            Self::InvalidOrder { .. } => "invalid_order",
            Self::InvalidSignal { .. } => "invalid_signal",
            Self::InvalidFilter { .. } => "invalid_filter",
            Self::MissingApiKey => "missing_auth",
        }
    }

    /// The offending query key.
    pub fn key(&self) -> &str {
        match self {
            Self::InvalidKey { key, .. } | Self::InvalidFilter { key, .. } => key,
            Self::InvalidOrder { .. } => "order",
            Self::InvalidSignal { .. } => "signal",
            Self::MissingApiKey => "auth",
        }
    }

    /// The offending value.
    pub fn value(&self) -> &str {
        match self {
            Self::InvalidKey { value, .. }
            | Self::InvalidOrder { value }
            | Self::InvalidSignal { value }
            | Self::InvalidFilter { value, .. } => value,
            Self::MissingApiKey => "",
        }
    }

    pub fn payload(&self) -> ParamErrorPayload {
        ParamErrorPayload {
            code: self.code().to_string(),
            key: self.key().to_string(),
            value: self.value().to_string(),
        }
    }
}

// ============================================================================
// Validated parameters
// ============================================================================

/// A validated screener request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableParams {
    pub order: Option<String>,
    pub desc: bool,
    pub signal: Option<String>,
    /// Fully-qualified filter option values, in request order.
    pub filters: Vec<String>,
}

impl TableParams {
    /// Canonical upstream query: `o=[-]order&s=signal&f=v1,v2`.
    pub fn build_uri(&self) -> String {
        let mut parts = Vec::with_capacity(3);

        if let Some(order) = &self.order {
            let sign = if self.desc { "-" } else { "" };
            parts.push(format!("o={}{}", sign, order));
        }
        if let Some(signal) = &self.signal {
            parts.push(format!("s={}", signal));
        }
        if !self.filters.is_empty() {
            parts.push(format!("f={}", self.filters.join(",")));
        }

        parts.join("&")
    }
}

/// A validated export request carrying the caller's API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedParams {
    pub params: TableParams,
    pub api_key: String,
}

impl AuthenticatedParams {
    /// Canonical upstream query with the percent-encoded key appended.
    pub fn build_uri(&self) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(self.api_key.as_bytes()).collect();
        let base = self.params.build_uri();
        if base.is_empty() {
            format!("auth={}", encoded)
        } else {
            format!("{}&auth={}", base, encoded)
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

fn is_filter_key(key: &str) -> bool {
    key == "filters" || key.starts_with("filters[")
}

fn is_known_key(key: &str) -> bool {
    matches!(key, "order" | "desc" | "signal" | "auth") || is_filter_key(key)
}

/// First non-missing value of `key`.
fn first<'a>(query: &'a QueryMap, key: &str) -> Option<&'a str> {
    query.get(key).and_then(|values| values.first()).map(String::as_str)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Validate a URL-style query against `snapshot`.
pub fn validate_query(snapshot: &VocabularySnapshot, query: &QueryMap) -> Result<TableParams, ParamError> {
    if let Some((key, values)) = query.iter().find(|(key, _)| !is_known_key(key)) {
        return Err(ParamError::InvalidKey {
            key: key.clone(),
            value: values.first().cloned().unwrap_or_default(),
        });
    }

    let order = match first(query, "order") {
        Some(order) if !snapshot.has_sorter(order) => {
            return Err(ParamError::InvalidOrder { value: order.to_string() });
        }
        order => order.map(str::to_string),
    };

    let desc = first(query, "desc").is_some_and(is_truthy);

    let signal = match first(query, "signal") {
        Some(signal) if !snapshot.has_signal(signal) => {
            return Err(ParamError::InvalidSignal { value: signal.to_string() });
        }
        signal => signal.map(str::to_string),
    };

    let mut filters = Vec::new();
    for (key, values) in query.iter().filter(|(key, _)| is_filter_key(key)) {
        for value in values {
            if !snapshot.has_filter_option(value) {
                return Err(ParamError::InvalidFilter {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
            filters.push(value.clone());
        }
    }

    Ok(TableParams {
        order,
        desc,
        signal,
        filters,
    })
}

/// Validate an export query: the regular rules plus a non-empty `auth` key.
pub fn validate_authenticated(
    snapshot: &VocabularySnapshot,
    query: &QueryMap,
) -> Result<AuthenticatedParams, ParamError> {
    let params = validate_query(snapshot, query)?;
    match first(query, "auth") {
        Some(key) if !key.is_empty() => Ok(AuthenticatedParams {
            params,
            api_key: key.to_string(),
        }),
        _ => Err(ParamError::MissingApiKey),
    }
}

/// JSON body of the keyed request variant. `filters` maps a filter id to one
/// of that filter's option values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableRequest {
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Validate a keyed request against `snapshot`.
pub fn validate_request(snapshot: &VocabularySnapshot, request: &TableRequest) -> Result<TableParams, ParamError> {
    if let Some((key, value)) = request.extra.iter().next() {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ParamError::InvalidKey {
            key: key.clone(),
            value,
        });
    }

    let order = request.order.as_deref().filter(|o| !o.is_empty());
    if let Some(order) = order {
        if !snapshot.has_sorter(order) {
            return Err(ParamError::InvalidOrder { value: order.to_string() });
        }
    }

    let signal = request.signal.as_deref().filter(|s| !s.is_empty());
    if let Some(signal) = signal {
        if !snapshot.has_signal(signal) {
            return Err(ParamError::InvalidSignal { value: signal.to_string() });
        }
    }

    let mut filters = Vec::with_capacity(request.filters.len());
    for (id, value) in &request.filters {
        let known = snapshot.filter(id).is_some_and(|f| f.has_option(value));
        if !known {
            return Err(ParamError::InvalidFilter {
                key: id.clone(),
                value: value.clone(),
            });
        }
        filters.push(value.clone());
    }

    Ok(TableParams {
        order: order.map(str::to_string),
        desc: request.desc,
        signal: signal.map(str::to_string),
        filters,
    })
}
