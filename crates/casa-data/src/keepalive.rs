//! Background session keep-alive.
//!
//! While the host is active, a spawned task probes the backend every
//! interval. A probe that fails or is slower than the latency threshold
//! triggers a session refresh, so the next user-initiated query finds a
//! warm connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use casa_core::KeepAliveSettings;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::Backend;

/// Keep-alive timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Time between probes while active.
    pub interval: Duration,
    /// Probes slower than this count as unhealthy.
    pub latency_threshold: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(180),
            latency_threshold: Duration::from_secs(2),
        }
    }
}

impl KeepAliveConfig {
    /// Build from configuration.
    pub fn from_config(settings: &KeepAliveSettings) -> Self {
        Self {
            interval: Duration::from_secs(settings.interval_secs),
            latency_threshold: Duration::from_millis(settings.latency_threshold_ms),
        }
    }
}

#[derive(Debug, Default)]
struct KeepAliveMetrics {
    checks: AtomicU64,
    failures: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl KeepAliveMetrics {
    fn snapshot(&self) -> KeepAliveStats {
        KeepAliveStats {
            checks: self.checks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }
}

/// Keep-alive counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepAliveStats {
    /// Probes issued.
    pub checks: u64,
    /// Probes that failed or were too slow.
    pub failures: u64,
    /// Successful session refreshes.
    pub refreshes: u64,
    /// Failed session refreshes.
    pub refresh_failures: u64,
}

/// Spawner for the keep-alive task.
pub struct KeepAlive;

impl KeepAlive {
    /// Spawn the keep-alive task. The host starts out active.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn<B: Backend + 'static>(backend: Arc<B>, config: KeepAliveConfig) -> KeepAliveHandle {
        let (active_tx, active_rx) = watch::channel(true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());
        let metrics = Arc::new(KeepAliveMetrics::default());

        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = config.interval.as_secs(),
            latency_threshold_ms = config.latency_threshold.as_millis() as u64,
            "keep-alive started"
        );

        let task = tokio::spawn(keepalive_task(
            backend,
            config,
            ticker,
            active_rx,
            shutdown_rx,
            wake.clone(),
            metrics.clone(),
        ));

        KeepAliveHandle {
            active_tx,
            shutdown_tx,
            wake,
            metrics,
            task,
        }
    }

    /// Spawn only when enabled in `settings`.
    pub fn spawn_if_enabled<B: Backend + 'static>(
        backend: Arc<B>,
        settings: &KeepAliveSettings,
    ) -> Option<KeepAliveHandle> {
        settings
            .enabled
            .then(|| Self::spawn(backend, KeepAliveConfig::from_config(settings)))
    }
}

/// Control handle for a running keep-alive task.
///
/// Dropping the handle stops the task at its next wake-up.
#[derive(Debug)]
pub struct KeepAliveHandle {
    active_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    wake: Arc<Notify>,
    metrics: Arc<KeepAliveMetrics>,
    task: JoinHandle<()>,
}

impl KeepAliveHandle {
    /// Pause (`false`) or resume (`true`) periodic probes.
    ///
    /// Resuming probes immediately.
    pub fn set_active(&self, active: bool) {
        self.active_tx.send_replace(active);
    }

    /// Whether periodic probes are running.
    pub fn is_active(&self) -> bool {
        *self.active_tx.borrow()
    }

    /// The network came back; probe now if active.
    pub fn notify_online(&self) {
        self.wake.notify_one();
    }

    /// Current counters.
    pub fn stats(&self) -> KeepAliveStats {
        self.metrics.snapshot()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) -> KeepAliveStats {
        self.shutdown_tx.send_replace(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "keep-alive task ended abnormally");
        }
        self.metrics.snapshot()
    }
}

async fn keepalive_task<B: Backend>(
    backend: Arc<B>,
    config: KeepAliveConfig,
    mut ticker: Interval,
    mut active_rx: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
    wake: Arc<Notify>,
    metrics: Arc<KeepAliveMetrics>,
) {
    let mut active = *active_rx.borrow_and_update();

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            changed = active_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_active = *active_rx.borrow_and_update();
                let resumed = now_active && !active;
                active = now_active;
                debug!(active, "keep-alive activity changed");
                if resumed {
                    check(backend.as_ref(), &config, &metrics).await;
                    ticker.reset();
                }
            }

            _ = wake.notified() => {
                if active {
                    check(backend.as_ref(), &config, &metrics).await;
                    ticker.reset();
                }
            }

            _ = ticker.tick(), if active => {
                check(backend.as_ref(), &config, &metrics).await;
            }
        }
    }

    let stats = metrics.snapshot();
    info!(
        checks = stats.checks,
        failures = stats.failures,
        refreshes = stats.refreshes,
        "keep-alive stopped"
    );
}

async fn check<B: Backend + ?Sized>(backend: &B, config: &KeepAliveConfig, metrics: &KeepAliveMetrics) {
    metrics.checks.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let healthy = match tokio::time::timeout(config.latency_threshold, backend.health_check()).await {
        Ok(Ok(())) => {
            debug!(latency_ms = started.elapsed().as_millis() as u64, "session healthy");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "health check failed");
            false
        }
        Err(_) => {
            warn!(
                threshold_ms = config.latency_threshold.as_millis() as u64,
                "health check exceeded latency threshold"
            );
            false
        }
    };

    if healthy {
        return;
    }
    metrics.failures.fetch_add(1, Ordering::Relaxed);

    match backend.refresh_session().await {
        Ok(()) => {
            metrics.refreshes.fetch_add(1, Ordering::Relaxed);
            info!("session refreshed");
        }
        Err(e) => {
            metrics.refresh_failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "session refresh failed");
        }
    }
}
