//! Finviz Proxy Library
//!
//! A stable JSON API over the finviz stock screener.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     finviz-proxy (Rust Service)                  │
//! │                              :8000                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │  Vocabulary  │──▶│  Validator   │──▶│  Table pipeline      │  │
//! │  │  snapshot    │   │  + URI       │   │  cache → fetch →     │  │
//! │  └──────▲───────┘   └──────────────┘   │  parse → store       │  │
//! │         │                              └──────────────────────┘  │
//! │  ┌──────┴───────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │  Refreshers  │   │  Futures /   │   │  Elite session       │  │
//! │  │  (interval)  │──▶│  news feeds  │   │  (login, re-login)   │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Vocabulary
//! The sort orders, signal presets and filter options the upstream currently
//! accepts. Scraped at startup (fatal on failure) and re-scraped hourly.
//!
//! ## Canonical URI
//! A validated request serializes to `o=[-]order&s=signal&f=v1,v2`. The same
//! string is the upstream query and the response cache key.
//!
//! ## Snapshots
//! Shared feeds are immutable values behind a [`SnapshotStore`]. Refreshers
//! replace them whole; readers load one and keep it for the whole request.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod feeds;
pub mod params;
pub mod pipeline;
pub mod refresher;
pub mod routes;
pub mod session;
pub mod table;
pub mod upstream;
pub mod vocabulary;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::Uri,
    routing::{get, post},
    Router,
};
use finviz_common::config::Config;
use finviz_common::util::sanitize_for_log;
use tokio::task::JoinHandle;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Span;

use crate::cache::ResponseCache;
use crate::feeds::{fetch_futures, fetch_news, FuturesBoard, NewsFeed};
use crate::pipeline::TablePipeline;
use crate::refresher::Refresher;
use crate::session::{EliteSession, SessionTracker};
use crate::upstream::UpstreamClient;
use crate::vocabulary::{fetch_vocabulary, SnapshotStore, VocabularySnapshot};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Proxy service state
pub struct ProxyState {
    /// Configuration
    pub config: Config,
    /// Upstream client (shares the session cookie jar)
    pub client: UpstreamClient,
    /// Current screener vocabulary
    pub vocabulary: SnapshotStore<VocabularySnapshot>,
    /// Current futures board
    pub futures: SnapshotStore<FuturesBoard>,
    /// Current news and blog listings
    pub news: SnapshotStore<NewsFeed>,
    /// Table request flow and its cache
    pub pipeline: TablePipeline,
}

impl ProxyState {
    /// Create state around an already fetched vocabulary.
    pub fn new(config: Config, client: UpstreamClient, vocabulary: VocabularySnapshot) -> Self {
        let cache = Arc::new(ResponseCache::new(config.server.cache_ttl()));
        let pipeline = TablePipeline::new(Arc::new(client.clone()), cache);

        Self {
            config,
            client,
            vocabulary: SnapshotStore::new(vocabulary),
            futures: SnapshotStore::default(),
            news: SnapshotStore::default(),
            pipeline,
        }
    }

    fn vocabulary_refresher(&self) -> Refresher<VocabularySnapshot> {
        Refresher::new(
            "vocabulary",
            self.vocabulary.clone(),
            self.config.refresh.vocabulary_interval(),
            self.config.server.timeout(),
        )
    }

    fn futures_refresher(&self) -> Refresher<FuturesBoard> {
        Refresher::new(
            "futures",
            self.futures.clone(),
            self.config.refresh.futures_interval(),
            self.config.server.timeout(),
        )
    }

    fn news_refresher(&self) -> Refresher<NewsFeed> {
        Refresher::new(
            "news",
            self.news.clone(),
            self.config.refresh.news_interval(),
            self.config.server.timeout(),
        )
    }
}

/// Build the HTTP router with its middleware stack.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    let timeout = state.config.server.timeout();
    let throttle = state.config.server.throttle;

    Router::new()
        .route("/health", get(routes::health))
        // Screener
        .route("/params", get(routes::get_params))
        .route("/table", get(routes::get_table))
        .route("/table_v2", post(routes::post_table_v2))
        .route("/export", get(routes::get_export))
        // Auxiliary feeds
        .route("/futures/all", get(routes::get_all_futures))
        .route("/futures", post(routes::post_futures))
        .route("/news", get(routes::get_news))
        .route("/blogs", get(routes::get_blogs))
        // Operations
        .route("/cache/stats", get(routes::get_cache_stats))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // Timeout sits outside the throttle so queued requests are bounded too.
        .layer(GlobalConcurrencyLimitLayer::new(throttle))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CatchPanicLayer::new())
}

/// Request span with credentials stripped from the logged URI.
fn request_span(request: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        uri = %logged_uri(request.uri()),
        version = ?request.version(),
    )
}

fn logged_uri(uri: &Uri) -> String {
    sanitize_for_log(&uri.to_string())
}

/// Main proxy service
pub struct ProxyService {
    state: Arc<ProxyState>,
    session: Option<Arc<EliteSession>>,
}

impl ProxyService {
    /// Log in (when elite mode is on), fetch the vocabulary and prime the feeds.
    ///
    /// Login and vocabulary failures are fatal. The feeds start empty when
    /// their first fetch fails and fill in on the next refresh.
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let client =
            UpstreamClient::new(&config.upstream, SessionTracker::default()).with_elite(config.elite.enabled);

        let session = if config.elite.enabled {
            let session = Arc::new(EliteSession::from_config(client.clone(), &config)?);
            session.login().await.context("Elite login failed")?;
            Some(session)
        } else {
            None
        };

        let vocabulary = fetch_vocabulary(&client)
            .await
            .context("Initial vocabulary fetch failed")?;

        let state = ProxyState::new(config, client, vocabulary);
        state
            .futures_refresher()
            .refresh_once(&|| fetch_futures(&state.client))
            .await;
        state
            .news_refresher()
            .refresh_once(&|| fetch_news(&state.client))
            .await;

        Ok(Self {
            state: Arc::new(state),
            session,
        })
    }

    pub fn state(&self) -> &Arc<ProxyState> {
        &self.state
    }

    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Start the background tasks: refreshers, cache janitor and re-login.
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        let state = &self.state;
        let mut handles = Vec::with_capacity(5);

        let client = state.client.clone();
        handles.push(state.vocabulary_refresher().spawn(move || {
            let client = client.clone();
            async move { fetch_vocabulary(&client).await }
        }));

        let client = state.client.clone();
        handles.push(state.futures_refresher().spawn(move || {
            let client = client.clone();
            async move { fetch_futures(&client).await }
        }));

        let client = state.client.clone();
        handles.push(state.news_refresher().spawn(move || {
            let client = client.clone();
            async move { fetch_news(&client).await }
        }));

        handles.push(Arc::clone(state.pipeline.cache()).spawn_janitor());

        if let Some(session) = &self.session {
            handles.push(Arc::clone(session).spawn_relogin(state.config.refresh.login_interval()));
        }

        handles
    }

    /// Start the proxy service
    pub async fn start(self) -> Result<()> {
        let handles = self.spawn_background();

        let addr: SocketAddr = self
            .state
            .config
            .bind_address()
            .parse()
            .context("Invalid bind address")?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        for handle in &handles {
            handle.abort();
        }
        tracing::info!("Server stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
