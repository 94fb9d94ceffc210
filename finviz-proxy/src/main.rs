//! Finviz Proxy - stable JSON API over the finviz stock screener.

use anyhow::Result;
use finviz_common::config::Config;
use finviz_common::logging::init_logging_with_exclusions;
use finviz_common::validation::Validate;
use finviz_proxy::ProxyService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration: file, then FINVIZ_* environment overrides
    let config = Config::load_with_env()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Finviz Proxy v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    let service = ProxyService::bootstrap(config).await?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
