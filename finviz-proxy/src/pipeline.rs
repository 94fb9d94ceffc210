//! Request flow for tables: canonical URI, cache lookup, fetch, parse, store.

use std::sync::Arc;

use finviz_common::util::sanitize_for_log;
use tracing::{debug, info};

use crate::cache::ResponseCache;
use crate::error::ProxyError;
use crate::params::{AuthenticatedParams, TableParams};
use crate::table::{parse_export_csv, parse_screener_table, Table};
use crate::upstream::TableSource;

/// Serves validated table requests from the cache or the upstream.
#[derive(Clone)]
pub struct TablePipeline {
    source: Arc<dyn TableSource>,
    cache: Arc<ResponseCache>,
}

impl TablePipeline {
    pub fn new(source: Arc<dyn TableSource>, cache: Arc<ResponseCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Screener HTML table for `params`.
    pub async fn screener(&self, params: &TableParams) -> Result<Arc<Table>, ProxyError> {
        let uri = params.build_uri();
        info!(uri = %uri, "Screener table requested");

        if let Some(table) = self.cache.get(&uri) {
            debug!(uri = %uri, "Cache hit");
            return Ok(table);
        }

        let page = self.source.screener_page(&uri).await?;
        let table = Arc::new(parse_screener_table(&page)?);
        self.cache.set(uri, Arc::clone(&table));
        Ok(table)
    }

    /// CSV export table for `params`.
    pub async fn export(&self, params: &AuthenticatedParams) -> Result<Arc<Table>, ProxyError> {
        let uri = params.build_uri();
        let logged_uri = sanitize_for_log(&uri);
        info!(uri = %logged_uri, "Export table requested");

        if let Some(table) = self.cache.get(&uri) {
            debug!(uri = %logged_uri, "Cache hit");
            return Ok(table);
        }

        let csv = self.source.export_csv(&uri).await?;
        let table = Arc::new(parse_export_csv(&csv));
        self.cache.set(uri, Arc::clone(&table));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const PAGE: &str = include_str!("../tests/fixtures/screener.html");

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        uris: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TableSource for FakeSource {
        async fn screener_page(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut uris) = self.uris.lock() {
                uris.push(uri.to_string());
            }
            if self.fail {
                return Err(FetchError::UpstreamStatus {
                    url: format!("https://finviz.com/screener.ashx?{}", uri),
                    status: 503,
                });
            }
            Ok(PAGE.as_bytes().to_vec())
        }

        async fn export_csv(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut uris) = self.uris.lock() {
                uris.push(uri.to_string());
            }
            Ok(b"Ticker,Price\nAAPL,227.52\nMSFT\n".to_vec())
        }
    }

    fn pipeline(source: Arc<FakeSource>) -> TablePipeline {
        TablePipeline::new(source, Arc::new(ResponseCache::new(Duration::from_secs(60))))
    }

    fn params() -> TableParams {
        TableParams {
            order: Some("price".into()),
            filters: vec!["exch_nasd".into()],
            ..TableParams::default()
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upstream() {
        let source = Arc::new(FakeSource::default());
        let pipeline = pipeline(Arc::clone(&source));

        let first = pipeline.screener(&params()).await.unwrap();
        let second = pipeline.screener(&params()).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.headers[1], "Ticker");
        assert_eq!(source.uris.lock().unwrap()[0], "o=price&f=exch_nasd");
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let source = Arc::new(FakeSource {
            fail: true,
            ..FakeSource::default()
        });
        let pipeline = pipeline(Arc::clone(&source));

        assert!(matches!(
            pipeline.screener(&params()).await,
            Err(ProxyError::Fetch(FetchError::UpstreamStatus { status: 503, .. }))
        ));
        assert!(pipeline.screener(&params()).await.is_err());

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.cache().stats().total_entries, 0);
    }

    #[tokio::test]
    async fn test_export_uses_authenticated_uri() {
        let source = Arc::new(FakeSource::default());
        let pipeline = pipeline(Arc::clone(&source));
        let request = AuthenticatedParams {
            params: params(),
            api_key: "secret".into(),
        };

        let table = pipeline.export(&request).await.unwrap();
        assert_eq!(table.rows, vec![vec!["AAPL", "227.52"], vec!["MSFT"]]);
        assert_eq!(
            source.uris.lock().unwrap()[0],
            "o=price&f=exch_nasd&auth=secret"
        );

        // Export and screener entries never share a key.
        pipeline.screener(&params()).await.unwrap();
        assert_eq!(pipeline.cache().stats().total_entries, 2);
    }
}
