//! Elite (authenticated) session.
//!
//! The login form is posted through the shared upstream client so the
//! resulting cookies ride along on every later request. A login only counts
//! as successful when the redirect chain ends on the elite host; the upstream
//! answers a failed login with a 200 page on the public host.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use finviz_common::config::Config;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use crate::error::LoginError;
use crate::upstream::UpstreamClient;

pub const LOGIN_PATH: &str = "/login_submit.ashx";

/// Session lifecycle: `LoggedOut -> LoggingIn -> Active`, back to
/// `LoggedOut` when a login attempt fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggingIn,
    Active,
}

/// Shared view of the session state.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    state: Arc<RwLock<SessionState>>,
}

impl SessionTracker {
    pub fn state(&self) -> SessionState {
        self.state.read().map(|s| *s).unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn set(&self, next: SessionState) {
        if let Ok(mut state) = self.state.write() {
            if *state != next {
                debug!(from = ?*state, to = ?next, "Session state changed");
            }
            *state = next;
        }
    }
}

/// Logs into the elite site and keeps the session fresh.
pub struct EliteSession {
    client: UpstreamClient,
    email: String,
    password: String,
    user_agent: String,
}

impl EliteSession {
    pub fn new(
        client: UpstreamClient,
        email: impl Into<String>,
        password: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            email: email.into(),
            password: password.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Build from config; fails when credentials are missing.
    pub fn from_config(client: UpstreamClient, config: &Config) -> Result<Self, LoginError> {
        let (email, password) = config.elite.credentials().ok_or(LoginError::MissingCredentials)?;
        Ok(Self::new(client, email, password, config.upstream.login_user_agent.clone()))
    }

    pub fn state(&self) -> SessionState {
        self.client.session().state()
    }

    /// Perform one login, updating the shared state either way.
    pub async fn login(&self) -> Result<(), LoginError> {
        let tracker = self.client.session();
        tracker.set(SessionState::LoggingIn);

        match self.submit_login().await {
            Ok(()) => {
                tracker.set(SessionState::Active);
                info!("Elite login succeeded");
                Ok(())
            }
            Err(e) => {
                tracker.set(SessionState::LoggedOut);
                Err(e)
            }
        }
    }

    async fn submit_login(&self) -> Result<(), LoginError> {
        let url = format!("{}{}", self.client.public_base(), LOGIN_PATH);
        let form = [("email", self.email.as_str()), ("password", self.password.as_str())];

        let response = self
            .client
            .http()
            .post(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoginError::Status(status.as_u16()));
        }

        let landed = authority(response.url());
        let expected = Url::parse(self.client.elite_base())
            .ok()
            .and_then(|u| authority(&u));

        match (landed, expected) {
            (Some(landed), Some(expected)) if landed == expected => Ok(()),
            (landed, expected) => Err(LoginError::WrongHost {
                landed: landed.unwrap_or_default(),
                expected: expected.unwrap_or_else(|| self.client.elite_base().to_string()),
            }),
        }
    }

    /// Re-login every `interval`; a failed attempt leaves the session logged out
    /// until the next one.
    pub fn spawn_relogin(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                info!("Refreshing elite session");
                if let Err(e) = self.login().await {
                    error!(error = %e, "Elite re-login failed");
                }
            }
        })
    }
}

/// `host:port` of a URL, with the scheme's default port filled in.
fn authority(url: &Url) -> Option<String> {
    Some(format!("{}:{}", url.host_str()?, url.port_or_known_default()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finviz_common::UpstreamConfig;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";

    fn session_for(public: &MockServer, elite: &MockServer) -> EliteSession {
        let config = UpstreamConfig {
            public_base: public.uri(),
            elite_base: elite.uri(),
            ..UpstreamConfig::default()
        };
        let client = UpstreamClient::new(&config, SessionTracker::default());
        EliteSession::new(client, "me@example.com", "hunter2", FIREFOX)
    }

    #[test]
    fn test_tracker_transitions() {
        let tracker = SessionTracker::default();
        assert_eq!(tracker.state(), SessionState::LoggedOut);

        tracker.set(SessionState::LoggingIn);
        assert!(!tracker.is_active());

        let shared = tracker.clone();
        tracker.set(SessionState::Active);
        assert!(shared.is_active());
    }

    #[test]
    fn test_authority_defaults_port() {
        let url = Url::parse("https://elite.finviz.com/screener.ashx").unwrap();
        assert_eq!(authority(&url).as_deref(), Some("elite.finviz.com:443"));
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let client = UpstreamClient::new(&UpstreamConfig::default(), SessionTracker::default());
        let result = EliteSession::from_config(client, &Config::default());
        assert!(matches!(result, Err(LoginError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_login_lands_on_elite_host() {
        let public = MockServer::start().await;
        let elite = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/login_submit.ashx"))
            .and(header("user-agent", FIREFOX))
            .and(body_string_contains("email=me%40example.com"))
            .and(body_string_contains("password=hunter2"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/screener.ashx", elite.uri()).as_str())
                    .insert_header("set-cookie", "sessionid=abc; Path=/"),
            )
            .expect(1)
            .mount(&public)
            .await;
        Mock::given(method("GET"))
            .and(path("/screener.ashx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
            .mount(&elite)
            .await;

        let session = session_for(&public, &elite);
        session.login().await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_login_rejected_when_staying_on_public_host() {
        let public = MockServer::start().await;
        let elite = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/login_submit.ashx"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/login.ashx", public.uri()).as_str()),
            )
            .mount(&public)
            .await;
        Mock::given(method("GET"))
            .and(path("/login.ashx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("try again"))
            .mount(&public)
            .await;

        let session = session_for(&public, &elite);
        let err = session.login().await.unwrap_err();
        assert!(matches!(err, LoginError::WrongHost { .. }));
        assert_eq!(session.state(), SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn test_login_error_status() {
        let public = MockServer::start().await;
        let elite = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/login_submit.ashx"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&public)
            .await;

        let session = session_for(&public, &elite);
        assert!(matches!(session.login().await, Err(LoginError::Status(500))));
        assert_eq!(session.state(), SessionState::LoggedOut);
    }
}
