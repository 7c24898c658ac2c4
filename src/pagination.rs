#![allow(dead_code)]
//! Paginated fetching of element listings.
//!
//! Page 1 is fetched alone to learn the page count; pages 2..N are fetched
//! with at most `concurrent` requests in flight and appended in completion
//! order. A failing interior page is dropped and recorded, not fatal.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::transport::{ApiClient, Params};

const SNIPPET_CHARS: usize = 150;

/// An interior page that could not be fetched or decoded.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    pub page: u64,
    pub error: String,
}

/// Records gathered from every page of one path.
#[derive(Debug, Clone, Default)]
pub struct PagedRecords {
    pub records: Vec<Value>,
    /// `meta.pagination.total` as reported by page 1.
    pub expected_total: u64,
    pub total_pages: u64,
    pub dropped_pages: Vec<PageFailure>,
}

impl PagedRecords {
    /// How many records the API reported but we did not receive.
    pub fn shortfall(&self) -> u64 {
        self.expected_total
            .saturating_sub(self.records.len() as u64)
    }

    pub fn is_complete(&self) -> bool {
        self.dropped_pages.is_empty()
    }
}

pub struct PagedFetcher {
    client: ApiClient,
    concurrent: usize,
}

impl PagedFetcher {
    pub fn new(client: ApiClient, concurrent: usize) -> Self {
        Self {
            client,
            concurrent: concurrent.max(1),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Fetch every page of `path`. Errors on page 1 are fatal.
    pub async fn fetch_paged(&self, path: &str) -> Result<PagedRecords, SourceError> {
        let first = self.client.fetch(path, &[]).await?;
        let envelope = decode_envelope(path, first.body)?;

        let pagination = envelope.pointer("/meta/pagination");
        let expected_total = pagination.and_then(|p| p.get("total")).map(parse_count).unwrap_or(0);
        let total_pages = pagination
            .and_then(|p| p.get("total_pages"))
            .map(parse_count)
            .unwrap_or(0);

        let mut records = ensure_array_data(path, envelope)?;

        let mut result = PagedRecords {
            records: Vec::new(),
            expected_total,
            total_pages,
            dropped_pages: Vec::new(),
        };

        if expected_total == 0 || total_pages <= 1 {
            result.records = records;
            return Ok(result);
        }

        info!(
            "Fetching {} pages of {} ({} records, {} concurrent)",
            total_pages, path, expected_total, self.concurrent
        );

        let pages = stream::iter(2..=total_pages)
            .map(|page| async move { (page, self.fetch_page(path, page).await) })
            .buffer_unordered(self.concurrent)
            .collect::<Vec<_>>()
            .await;

        for (page, outcome) in pages {
            match outcome {
                Ok(page_records) => {
                    debug!("{} page {}: {} records", path, page, page_records.len());
                    records.extend(page_records);
                }
                Err(e) => {
                    warn!("Dropping page {} of {}: {}", page, path, e);
                    result.dropped_pages.push(PageFailure {
                        page,
                        error: e.to_string(),
                    });
                }
            }
        }

        result.records = records;
        if result.shortfall() > 0 {
            warn!(
                "{}: received {} of {} records ({} pages dropped)",
                path,
                result.records.len(),
                expected_total,
                result.dropped_pages.len()
            );
        }
        Ok(result)
    }

    async fn fetch_page(&self, path: &str, page: u64) -> Result<Vec<Value>, SourceError> {
        let params: Params = vec![("page".to_string(), page.to_string())];
        let response = self.client.fetch(path, &params).await?;
        let envelope = decode_envelope(path, response.body)?;
        ensure_array_data(path, envelope)
    }
}

/// Decode a body that arrived as a JSON string into structured JSON.
pub fn decode_envelope(path: &str, body: Value) -> Result<Value, SourceError> {
    match body {
        Value::String(text) => serde_json::from_str(&text).map_err(|_| malformed(path, &text)),
        other => Ok(other),
    }
}

/// Take the `data` payload out of an envelope, requiring an array. A string
/// payload is parsed first.
pub fn ensure_array_data(path: &str, mut envelope: Value) -> Result<Vec<Value>, SourceError> {
    match envelope.get_mut("data").map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::String(text)) => match serde_json::from_str(&text) {
            Ok(Value::Array(items)) => Ok(items),
            _ => Err(malformed(path, &text)),
        },
        Some(other) => Err(malformed(path, &other.to_string())),
        None => Err(malformed(path, &envelope.to_string())),
    }
}

fn malformed(path: &str, payload: &str) -> SourceError {
    SourceError::MalformedResponse {
        path: path.to_string(),
        snippet: payload.trim().chars().take(SNIPPET_CHARS).collect(),
    }
}

/// Integer prefix of a count that may arrive as a number or a string.
fn parse_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}
