//! Timer-driven scan loop.
//!
//! A single task owns the [`NotificationDeduper`] and runs one scan per
//! tick against the current working-set snapshot. Ticks never overlap:
//! ticks that come due while a scan is still dispatching are skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use fixwatch_core::config::ScannerConfig;
use fixwatch_notify::NotificationDispatcher;

use crate::dedup::NotificationDeduper;
use crate::scanner::{ScanReport, UpcomingEventScanner};
use crate::working_set::WorkingSet;

/// Source of "now" for each tick.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Totals over the lifetime of a runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub dispatched: u64,
    pub evicted: u64,
}

pub struct ScanRunner {
    scanner: UpcomingEventScanner,
    dispatcher: Arc<NotificationDispatcher>,
    working_set: WorkingSet,
    deduper: NotificationDeduper,
    tick: Duration,
    evict_expired: bool,
    clock: Clock,
    stats: RunStats,
}

impl ScanRunner {
    pub fn new(
        scanner: UpcomingEventScanner,
        dispatcher: Arc<NotificationDispatcher>,
        working_set: WorkingSet,
        tick: Duration,
    ) -> Self {
        Self {
            scanner,
            dispatcher,
            working_set,
            deduper: NotificationDeduper::new(),
            tick,
            evict_expired: true,
            clock: system_clock(),
            stats: RunStats::default(),
        }
    }

    pub fn from_config(
        config: &ScannerConfig,
        dispatcher: Arc<NotificationDispatcher>,
        working_set: WorkingSet,
    ) -> Self {
        Self::new(
            UpcomingEventScanner::new(config.lookahead()),
            dispatcher,
            working_set,
            config.tick_interval(),
        )
        .with_eviction(config.evict_expired)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_eviction(mut self, enabled: bool) -> Self {
        self.evict_expired = enabled;
        self
    }

    pub fn deduper(&self) -> &NotificationDeduper {
        &self.deduper
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Run a single scan now.
    pub async fn tick_once(&mut self) -> ScanReport {
        self.tick_until(|| false).await
    }

    async fn tick_until<F: Fn() -> bool>(&mut self, stopped: F) -> ScanReport {
        let now = (self.clock)();
        if self.evict_expired {
            let evicted = self.deduper.evict_expired(now);
            if evicted > 0 {
                debug!(evicted, "dropped alert records for ended events");
                self.stats.evicted += evicted as u64;
            }
        }

        let snapshot = self.working_set.snapshot();
        let report = self
            .scanner
            .scan_until(&snapshot, now, &mut self.deduper, &self.dispatcher, stopped)
            .await;

        self.stats.ticks += 1;
        self.stats.dispatched += report.dispatched.len() as u64;
        report
    }

    /// Start the loop on the runtime. The first scan runs immediately.
    pub fn spawn(mut self) -> ScanHandle {
        let (shutdown_tx, mut shutdown) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                tick_ms = self.tick.as_millis() as u64,
                lookahead_minutes = self.scanner.lookahead().num_minutes(),
                channels = ?self.dispatcher.channel_names(),
                "scan loop started"
            );

            let mut interval = tokio::time::interval(self.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let watcher = shutdown.clone();
                        let report = self.tick_until(|| *watcher.borrow()).await;
                        if report.due > 0 {
                            debug!(
                                due = report.due,
                                delivered = report.delivered(),
                                interrupted = report.interrupted,
                                "scan tick"
                            );
                        }
                    }
                }
            }

            info!(
                ticks = self.stats.ticks,
                dispatched = self.stats.dispatched,
                "scan loop stopped"
            );
            self.stats
        });

        ScanHandle { shutdown_tx, task }
    }
}

/// Control handle for a spawned [`ScanRunner`].
pub struct ScanHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<RunStats>,
}

impl ScanHandle {
    /// Receiver that flips to `true` when [`stop`](Self::stop) is called,
    /// for tasks that should stop alongside the scanner.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop the loop and wait for it to exit. An in-flight dispatch is
    /// allowed to finish; nothing is dispatched after this returns.
    pub async fn stop(self) -> RunStats {
        let _ = self.shutdown_tx.send(true);
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "scan loop task failed");
                RunStats::default()
            }
        }
    }
}
