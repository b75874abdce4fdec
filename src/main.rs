//! track-engine - replays a recorded detection stream through the engine
//!
//! Module structure:
//! - `domain/` - Core types (Track, Event, detections)
//! - `services/` - Engine stages, orchestrator and frame scheduler
//! - `io/` - Output port, JSONL egress, recordings, report
//! - `infra/` - Infrastructure (Config, Metrics, errors, logging)

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use track_engine::infra::{logging, Config, Metrics};
use track_engine::io::{
    captured_frames, read_recording, EventBus, EventEgress, ReplayDetector, SharedReport,
};
use track_engine::services::{create_frame_channel, run_pipeline, Engine, Offer};
use tracing::{debug, info, warn};

/// Track-and-classify engine - recorded stream replay
#[derive(Parser, Debug)]
#[command(name = "track-engine", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Recorded detections (JSONL, one frame per line)
    #[arg(short, long)]
    input: String,

    /// Override the events file from config
    #[arg(long)]
    events: Option<String>,

    /// Override the report file from config
    #[arg(long)]
    report: Option<String>,

    /// Pace frames by their recorded timestamps and drop frames under backpressure
    #[arg(long)]
    realtime: bool,

    /// Simulated model latency per frame in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load_from_path(&Config::resolve_config_path(args.config.as_deref()));
    logging::init(config.log_json());
    info!(git_hash = %env!("GIT_HASH"), "track-engine starting");

    let events_file = args.events.clone().unwrap_or_else(|| config.events_file().to_string());
    let report_file = args.report.clone().unwrap_or_else(|| config.report_file().to_string());
    info!(
        config_file = %config.config_file(),
        input = %args.input,
        events_file = %events_file,
        report_file = %report_file,
        realtime = %args.realtime,
        min_score = %config.min_detection_score(),
        gate_px = %config.association_gate_distance(),
        track_timeout_ms = %config.track_timeout_ms(),
        "config_loaded"
    );

    let records = read_recording(&args.input)
        .with_context(|| format!("Failed to load recording {}", args.input))?;
    let frames = captured_frames(&records);
    let mut detector = ReplayDetector::new(&records);
    if args.latency_ms > 0 {
        detector = detector.with_latency(Duration::from_millis(args.latency_ms));
    }

    let metrics = Arc::new(Metrics::new());
    let mut engine = Engine::new(config.clone(), metrics.clone()).context("Invalid engine configuration")?;

    let bus = EventBus::new(config.event_buffer());
    let report = SharedReport::new(config.person_class());
    engine.add_sink(Box::new(EventEgress::new(&events_file)));
    engine.add_sink(Box::new(report.clone()));
    engine.add_sink(Box::new(bus.sink()));

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Event subscriber (stands in for notification consumers)
    let mut event_rx = bus.subscribe();
    let subscriber = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => debug!(
                    event_id = %event.id,
                    kind = %event.kind.as_str(),
                    severity = %event.severity.as_str(),
                    "event_received"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = %skipped, "event_subscriber_lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let tracks_rx = bus.watch_tracks();
    let metrics_interval = config.metrics_interval_secs().max(1);
    let reporter = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            let active = tracks_rx.borrow().tracks.len();
            metrics_clone.report(active).log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    let (frame_tx, frame_rx) = create_frame_channel(metrics.clone());
    let pipeline = tokio::spawn(run_pipeline(engine, detector, frame_rx, shutdown_rx));

    // Feed frames
    let started = Instant::now();
    let first_ts = frames.first().map(|f| f.timestamp_ms).unwrap_or(0);
    for frame in frames {
        if args.realtime {
            let due = started + Duration::from_millis(frame.timestamp_ms.saturating_sub(first_ts));
            tokio::time::sleep_until(due).await;
            if frame_tx.offer(frame) == Offer::Closed {
                break;
            }
        } else if !frame_tx.send(frame).await {
            break;
        }
    }
    drop(frame_tx);

    let engine = pipeline.await.context("Pipeline task failed")?;
    drop(engine);
    drop(bus);
    reporter.abort();
    let _ = subscriber.await;

    metrics.report(0).log();
    report
        .with(|r| r.write_to(&report_file))
        .with_context(|| format!("Failed to write report {}", report_file))?;

    let _ = shutdown_tx.send(true);
    info!("track-engine shutdown complete");
    Ok(())
}
