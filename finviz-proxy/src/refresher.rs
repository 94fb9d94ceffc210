//! Periodic snapshot refresh.
//!
//! A refresher owns the only write path into its [`SnapshotStore`]. Each cycle
//! runs one fetch under its own timeout. A failed or timed-out cycle is logged
//! and the previously published snapshot keeps being served.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::vocabulary::SnapshotStore;

/// Outcome of a single refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published,
    Failed,
    TimedOut,
}

/// Re-fetches a value on a fixed interval and republishes it.
#[derive(Debug, Clone)]
pub struct Refresher<T> {
    name: &'static str,
    store: SnapshotStore<T>,
    interval: Duration,
    timeout: Duration,
}

impl<T> Refresher<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(name: &'static str, store: SnapshotStore<T>, interval: Duration, timeout: Duration) -> Self {
        Self {
            name,
            store,
            interval,
            timeout,
        }
    }

    pub fn store(&self) -> &SnapshotStore<T> {
        &self.store
    }

    /// Run one bounded fetch and publish its result on success.
    pub async fn refresh_once<F, Fut, E>(&self, fetch: &F) -> RefreshOutcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match tokio::time::timeout(self.timeout, fetch()).await {
            Ok(Ok(value)) => {
                self.store.publish(value);
                debug!(feed = self.name, "Snapshot refreshed");
                RefreshOutcome::Published
            }
            Ok(Err(e)) => {
                error!(feed = self.name, error = %e, "Refresh failed, keeping previous snapshot");
                RefreshOutcome::Failed
            }
            Err(_) => {
                warn!(
                    feed = self.name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Refresh timed out, keeping previous snapshot"
                );
                RefreshOutcome::TimedOut
            }
        }
    }

    /// Refresh every interval, starting one interval from now.
    pub fn spawn<F, Fut, E>(self, fetch: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send,
        E: Display + Send,
    {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.interval).await;
                self.refresh_once(&fetch).await;
            }
        })
    }
}
