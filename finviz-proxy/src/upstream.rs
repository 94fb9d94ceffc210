//! HTTP transport to the upstream screener site.
//!
//! All outbound requests share one `reqwest::Client`, so the session cookies
//! set by an elite login are sent with every later fetch. In elite mode every
//! request goes to the elite host, including while a re-login is in flight.

use async_trait::async_trait;
use finviz_common::util::sanitize_for_log;
use finviz_common::UpstreamConfig;
use reqwest::header::USER_AGENT;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::session::SessionTracker;

pub const SCREENER_PATH: &str = "/screener.ashx";
pub const EXPORT_PATH: &str = "/export.ashx";
pub const FUTURES_PATH: &str = "/api/futures_all.ashx?timeframe=NO";
pub const NEWS_PATH: &str = "/news.ashx";

// ============================================================================
// Table source seam
// ============================================================================

/// Raw payload provider for the table pipeline.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Screener page HTML for a canonical query.
    async fn screener_page(&self, uri: &str) -> Result<Vec<u8>, FetchError>;

    /// CSV export for an authenticated canonical query.
    async fn export_csv(&self, uri: &str) -> Result<Vec<u8>, FetchError>;
}

// ============================================================================
// Client
// ============================================================================

/// Upstream HTTP client.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    public_base: String,
    elite_base: String,
    user_agent: String,
    elite: bool,
    session: SessionTracker,
}

impl UpstreamClient {
    /// Create a client from config, sharing `session` with the login task.
    pub fn new(config: &UpstreamConfig, session: SessionTracker) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.client_timeout())
            .cookie_store(true)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build upstream client, falling back to defaults");
                reqwest::Client::new()
            });

        Self {
            http,
            public_base: trim_base(&config.public_base),
            elite_base: trim_base(&config.elite_base),
            user_agent: config.user_agent.clone(),
            elite: false,
            session,
        }
    }

    /// Route screener, futures and news requests to the elite host.
    pub fn with_elite(mut self, enabled: bool) -> Self {
        self.elite = enabled;
        self
    }

    /// The shared HTTP client, cookie jar included.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn session(&self) -> &SessionTracker {
        &self.session
    }

    pub fn public_base(&self) -> &str {
        &self.public_base
    }

    pub fn elite_base(&self) -> &str {
        &self.elite_base
    }

    /// Base URL for screener, futures and news requests.
    ///
    /// Fixed by mode, not by session state, so cached screener tables never
    /// mix hosts across a re-login.
    pub fn base(&self) -> &str {
        if self.elite {
            &self.elite_base
        } else {
            &self.public_base
        }
    }

    /// GET `url` with the client identity header and return the body.
    ///
    /// Dropping the returned future aborts the request.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let logged_url = sanitize_for_log(url);
        debug!(url = %logged_url, "Fetching upstream");

        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: logged_url.clone(),
                source: source.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus {
                url: logged_url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Transport {
            url: logged_url.clone(),
            source: source.without_url(),
        })?;

        debug!(url = %logged_url, bytes = body.len(), "Upstream responded");
        Ok(body.to_vec())
    }

    /// Screener page for a canonical query.
    pub async fn fetch_screener(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        self.get(&format!("{}{}?{}", self.base(), SCREENER_PATH, uri)).await
    }

    /// CSV export; always served by the elite host.
    pub async fn fetch_export(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        self.get(&format!("{}{}?{}", self.elite_base, EXPORT_PATH, uri)).await
    }

    pub async fn fetch_futures(&self) -> Result<Vec<u8>, FetchError> {
        self.get(&format!("{}{}", self.base(), FUTURES_PATH)).await
    }

    pub async fn fetch_news(&self) -> Result<Vec<u8>, FetchError> {
        self.get(&format!("{}{}", self.base(), NEWS_PATH)).await
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("public_base", &self.public_base)
            .field("elite_base", &self.elite_base)
            .field("elite", &self.elite)
            .field("session", &self.session.state())
            .finish()
    }
}

#[async_trait]
impl TableSource for UpstreamClient {
    async fn screener_page(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_screener(uri).await
    }

    async fn export_csv(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_export(uri).await
    }
}

fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> UpstreamClient {
        let config = UpstreamConfig {
            public_base: server.uri(),
            elite_base: format!("{}/elite/", server.uri()),
            ..UpstreamConfig::default()
        };
        UpstreamClient::new(&config, SessionTracker::default())
    }

    #[tokio::test]
    async fn test_fetch_screener_sends_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screener.ashx"))
            .and(query_param("o", "price"))
            .and(header("user-agent", "curl/7.88.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client.fetch_screener("o=price").await.unwrap();
        assert_eq!(body, b"<html></html>");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/elite/export.ashx"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_export("auth=secret").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        // The api key never reaches error messages.
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_transport_error() {
        let config = UpstreamConfig {
            public_base: "http://127.0.0.1:1".into(),
            ..UpstreamConfig::default()
        };
        let client = UpstreamClient::new(&config, SessionTracker::default());

        let err = client.fetch_news().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_export_transport_error_hides_api_key() {
        let config = UpstreamConfig {
            elite_base: "http://127.0.0.1:1".into(),
            ..UpstreamConfig::default()
        };
        let client = UpstreamClient::new(&config, SessionTracker::default());

        let err = client.fetch_export("o=price&auth=secret").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));

        let message = err.to_string();
        assert!(!message.contains("secret"), "{}", message);
        let source = std::error::Error::source(&err).map(ToString::to_string).unwrap_or_default();
        assert!(!source.contains("secret"), "{}", source);
    }

    #[tokio::test]
    async fn test_elite_mode_fixes_base() {
        let server = MockServer::start().await;
        let public = client_for(&server);
        public.session().set(SessionState::Active);
        assert_eq!(public.base(), server.uri());

        let elite = client_for(&server).with_elite(true);
        assert_eq!(elite.base(), format!("{}/elite", server.uri()));

        // Stays on the elite host through a re-login and after a failed one.
        elite.session().set(SessionState::LoggingIn);
        assert_eq!(elite.base(), format!("{}/elite", server.uri()));
        elite.session().set(SessionState::LoggedOut);
        assert_eq!(elite.base(), format!("{}/elite", server.uri()));
    }
}
