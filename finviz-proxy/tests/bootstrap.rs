//! Startup integration tests: elite login, initial vocabulary fetch and feed priming.

use tokio_test::assert_ok;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use finviz_common::config::Config;
use finviz_proxy::session::SessionState;
use finviz_proxy::ProxyService;

const FILTER_PAGE: &str = include_str!("fixtures/filters.html");
const NEWS_PAGE: &str = include_str!("fixtures/news.html");
const FUTURES: &str = r#"{
    "ES": {"label": "S&P 500", "ticker": "ES", "last": 5801.25},
    "NQ": {"label": "Nasdaq 100", "ticker": "NQ", "last": 20412.5}
}"#;

async fn bootstrap_error(config: Config) -> anyhow::Error {
    match ProxyService::bootstrap(config).await {
        Ok(_) => panic!("bootstrap should fail"),
        Err(e) => e,
    }
}

fn config_for(public: &MockServer, elite: &MockServer) -> Config {
    let mut config = Config::default();
    config.upstream.public_base = public.uri();
    config.upstream.elite_base = elite.uri();
    config
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/screener.ashx"))
        .and(query_param("ft", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FILTER_PAGE))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/futures_all.ashx"))
        .and(query_param("timeframe", "NO"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FUTURES))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news.ashx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(NEWS_PAGE))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_bootstrap_public_mode() {
    let public = MockServer::start().await;
    mount_site(&public).await;

    let service = assert_ok!(ProxyService::bootstrap(config_for(&public, &public)).await);
    let state = service.state();

    let vocabulary = state.vocabulary.load();
    assert_eq!(vocabulary.filters.len(), 3);
    assert_eq!(vocabulary.signals.len(), 2);

    let futures = state.futures.load();
    assert_eq!(futures.len(), 2);
    assert_eq!(futures["NQ"].label, "Nasdaq 100");

    let news = state.news.load();
    assert_eq!(news.news.len(), 2);
    assert_eq!(news.blogs.len(), 1);
    assert_eq!(news.news[0].title, "Markets open higher");

    assert_eq!(state.client.session().state(), SessionState::LoggedOut);
}

#[tokio::test]
async fn test_vocabulary_failure_is_fatal() {
    let public = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/screener.ashx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .mount(&public)
        .await;

    let err = bootstrap_error(config_for(&public, &public)).await;
    assert!(format!("{:#}", err).contains("Initial vocabulary fetch failed"));
}

#[tokio::test]
async fn test_feed_failures_start_empty() {
    let public = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/screener.ashx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FILTER_PAGE))
        .mount(&public)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/futures_all.ashx"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&public)
        .await;
    Mock::given(method("GET"))
        .and(path("/news.ashx"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&public)
        .await;

    let service = assert_ok!(ProxyService::bootstrap(config_for(&public, &public)).await);
    assert!(service.state().futures.load().is_empty());
    assert!(service.state().news.load().news.is_empty());
}

#[tokio::test]
async fn test_elite_mode_requires_credentials() {
    let public = MockServer::start().await;
    mount_site(&public).await;

    let mut config = config_for(&public, &public);
    config.elite.enabled = true;

    let err = bootstrap_error(config).await;
    assert!(format!("{:#}", err).contains("credentials"));
}

#[tokio::test]
async fn test_elite_login_then_fetch_from_elite_host() {
    let public = MockServer::start().await;
    let elite = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login_submit.ashx"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/", elite.uri()).as_str())
                .insert_header("set-cookie", "sessionid=abc; Path=/"),
        )
        .expect(1)
        .mount(&public)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .mount(&elite)
        .await;
    mount_site(&elite).await;

    let mut config = config_for(&public, &elite);
    config.elite.enabled = true;
    config.elite.email = Some("me@example.com".into());
    config.elite.password = Some("hunter2".into());

    let service = assert_ok!(ProxyService::bootstrap(config).await);
    let state = service.state();

    assert_eq!(state.client.session().state(), SessionState::Active);
    assert_eq!(state.vocabulary.load().sorters.len(), 3);
    assert_eq!(state.futures.load().len(), 2);
}

#[tokio::test]
async fn test_elite_login_on_wrong_host_is_fatal() {
    let public = MockServer::start().await;
    let elite = MockServer::start().await;

    // Bad credentials bounce back to the public login page.
    Mock::given(method("POST"))
        .and(path("/login_submit.ashx"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login.ashx"))
        .mount(&public)
        .await;
    Mock::given(method("GET"))
        .and(path("/login.ashx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("try again"))
        .mount(&public)
        .await;
    mount_site(&public).await;

    let mut config = config_for(&public, &elite);
    config.elite.enabled = true;
    config.elite.email = Some("me@example.com".into());
    config.elite.password = Some("wrong".into());

    let err = bootstrap_error(config).await;
    assert!(format!("{:#}", err).contains("Elite login failed"));
}
