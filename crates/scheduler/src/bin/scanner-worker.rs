//! scanner-worker: watches the maintenance schedule and alerts on events
//! starting within the lookahead window.
//!
//! Events come from the REST backend when `EVENT_SOURCE_URL` is set, or from
//! an optional JSON seed file otherwise.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use fixwatch_core::config::{
    load_dotenv, MAX_LOOKAHEAD_MINUTES, MAX_TICK_SECS, MIN_LOOKAHEAD_MINUTES, MIN_TICK_SECS,
};
use fixwatch_core::Config;
use fixwatch_notify::{channels_from_config, DispatchOptions, NotificationDispatcher};
use fixwatch_scheduler::{
    EventSource, EventStore, HttpEventSource, InMemoryEventSource, ScanRunner,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Maintenance scanner that alerts technicians about upcoming appointments.
#[derive(Parser, Debug)]
#[command(name = "scanner-worker", version, about)]
struct Cli {
    /// Seconds between scans (overrides SCAN_TICK_SECS).
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Lookahead window in minutes (overrides LOOKAHEAD_MINUTES).
    #[arg(long)]
    lookahead_minutes: Option<u64>,

    /// REST base URL (overrides EVENT_SOURCE_URL).
    #[arg(long)]
    source_url: Option<String>,

    /// JSON seed for the in-memory source, used when no URL is configured.
    #[arg(long, env = "EVENT_SEED_FILE")]
    seed: Option<String>,

    /// Run a single scan and exit.
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(tick) = self.tick_secs {
            config.scanner.tick_interval_secs = tick.clamp(MIN_TICK_SECS, MAX_TICK_SECS);
        }
        if let Some(minutes) = self.lookahead_minutes {
            config.scanner.lookahead_minutes =
                minutes.clamp(MIN_LOOKAHEAD_MINUTES, MAX_LOOKAHEAD_MINUTES);
        }
        if let Some(ref url) = self.source_url {
            config.source.base_url = Some(url.clone());
        }
    }
}

fn build_source(cli: &Cli, config: &Config) -> anyhow::Result<Arc<dyn EventSource>> {
    if let Some(ref url) = config.source.base_url {
        let source = HttpEventSource::new(url, config.source.request_timeout())
            .context("failed to build HTTP event source")?;
        return Ok(Arc::new(source));
    }

    match cli.seed {
        Some(ref path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read seed file {path}"))?;
            let source = InMemoryEventSource::from_json(&json)
                .with_context(|| format!("invalid seed file {path}"))?;
            Ok(Arc::new(source))
        }
        None => {
            warn!("no EVENT_SOURCE_URL or seed file; starting with an empty schedule");
            Ok(Arc::new(InMemoryEventSource::new()))
        }
    }
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                warn!("failed to register signal handlers, falling back to ctrl_c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);
    config.log_summary();

    let source = build_source(&cli, &config)?;
    let store = Arc::new(
        EventStore::new(source).with_history(config.history.aggregator()),
    );
    match store.refresh().await {
        Ok(count) => info!(source = store.source_name(), events = count, "initial load complete"),
        Err(e) => warn!(error = %e, "initial load failed, starting with an empty schedule"),
    }

    let channels = channels_from_config(&config.alerts).context("invalid alert channel settings")?;
    let options = DispatchOptions {
        zone: config.alerts.display_zone(),
        timeout: config.scanner.dispatch_timeout(),
        ..DispatchOptions::default()
    };
    let dispatcher = NotificationDispatcher::connect(channels, store.directory(), options)
        .await
        .context("failed to set up alert dispatch")?;

    let mut runner = ScanRunner::from_config(&config.scanner, Arc::new(dispatcher), store.working_set());

    if cli.once {
        let report = runner.tick_once().await;
        info!(
            due = report.due,
            delivered = report.delivered(),
            "single scan complete"
        );
        return Ok(());
    }

    let scan = runner.spawn();
    let refresh = Arc::clone(&store).spawn_refresh(config.source.refresh_interval(), scan.subscribe());

    info!("scanner-worker running");
    shutdown_signal().await;
    info!("shutdown signal received");

    let stats = scan.stop().await;
    if let Err(e) = refresh.await {
        warn!(error = %e, "refresh task failed");
    }

    info!(
        ticks = stats.ticks,
        dispatched = stats.dispatched,
        "scanner-worker exited cleanly"
    );
    Ok(())
}
