use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ConsoleConfig;

/// Configuration for periodic refresh behavior
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicRefreshConfig {
    pub interval: Duration,
    pub initial_delay: Option<Duration>,
}

impl Default for PeriodicRefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            initial_delay: None,
        }
    }
}

impl PeriodicRefreshConfig {
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.attendance_refresh_interval_secs),
            initial_delay: None,
        }
    }
}

/// Snapshot of a running refresh task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshStatus {
    pub is_running: bool,
    pub refresh_count: u64,
    /// Failures since the last successful refresh
    pub error_count: u32,
    pub last_refresh_time: Option<DateTime<Utc>>,
}

/// A scheduled refresh owned by whoever holds the view's lifetime.
///
/// The task runs immediately, then once per interval. Failures are logged
/// and counted; the next attempt simply waits for the next tick. Dropping
/// the handle cancels the task.
pub struct PeriodicRefresh {
    handle: JoinHandle<()>,
    paused: Arc<AtomicBool>,
    status: Arc<Mutex<RefreshStatus>>,
}

impl PeriodicRefresh {
    /// Start the refresh loop on the current tokio runtime
    pub fn spawn<F, Fut>(config: PeriodicRefreshConfig, refresh_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let paused = Arc::new(AtomicBool::new(false));
        let status = Arc::new(Mutex::new(RefreshStatus {
            is_running: true,
            ..RefreshStatus::default()
        }));

        let task_paused = paused.clone();
        let task_status = status.clone();
        let handle = tokio::spawn(async move {
            if let Some(delay) = config.initial_delay {
                tokio::time::sleep(delay).await;
            }

            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if task_paused.load(Ordering::SeqCst) {
                    debug!("Periodic refresh paused, skipping tick");
                    continue;
                }

                debug!("Executing periodic refresh");
                let result = refresh_fn().await;

                let mut status = match task_status.lock() {
                    Ok(status) => status,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match result {
                    Ok(()) => {
                        status.refresh_count += 1;
                        status.error_count = 0;
                        status.last_refresh_time = Some(Utc::now());
                    }
                    Err(e) => {
                        status.error_count += 1;
                        warn!(
                            "Periodic refresh failed ({} in a row): {:#}",
                            status.error_count, e
                        );
                    }
                }
            }
        });

        info!(
            "Periodic refresh started (every {}s)",
            config.interval.as_secs()
        );

        Self {
            handle,
            paused,
            status,
        }
    }

    /// Skip ticks until `resume` is called, e.g. while a commit is in flight
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> RefreshStatus {
        let mut status = match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        status.is_running = status.is_running && !self.handle.is_finished();
        status
    }

    /// Stop the loop. A refresh that is mid-flight is dropped with it.
    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            info!("Periodic refresh cancelled");
        }
        self.handle.abort();
        if let Ok(mut status) = self.status.lock() {
            status.is_running = false;
        }
    }
}

impl Drop for PeriodicRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
