//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations so the frame source can count drops
//! without touching the engine. Reporting is the only operation that resets
//! anything (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use them for coordination or logic decisions.

use crate::domain::event::EventKind;
use crate::infra::error::InvalidDetection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// One counter per `EventKind`
const NUM_EVENT_KINDS: usize = 4;

#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

#[inline]
fn event_kind_index(kind: EventKind) -> usize {
    match kind {
        EventKind::ActivityChange => 0,
        EventKind::TheftSuspected => 1,
        EventKind::DensityLevelChanged => 2,
        EventKind::WeaponSighted => 3,
    }
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Frames fully processed by the engine (monotonic)
    frames_processed: AtomicU64,
    /// Frames since last report (reset on report)
    frames_since_report: AtomicU64,
    /// Frames dropped at the scheduler because inference was busy (monotonic)
    frames_dropped_backpressure: AtomicU64,
    /// Frames rejected for zero dimensions (monotonic)
    frames_invalid: AtomicU64,
    /// Frames rejected because their timestamp went backwards (monotonic)
    frames_stale: AtomicU64,
    /// Frames whose detection call failed (monotonic)
    inference_failures: AtomicU64,
    detections_accepted: AtomicU64,
    /// Rejections per `InvalidDetection` reason
    detections_rejected: [AtomicU64; 5],
    tracks_created: AtomicU64,
    tracks_expired: AtomicU64,
    /// Emitted events per `EventKind`
    events_emitted: [AtomicU64; NUM_EVENT_KINDS],
    /// Malformed tracks skipped by an event rule (monotonic)
    tracks_skipped: AtomicU64,
    /// Frame processing latency (reset on report)
    latency_sum_us: AtomicU64,
    latency_max_us: AtomicU64,
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            frames_since_report: AtomicU64::new(0),
            frames_dropped_backpressure: AtomicU64::new(0),
            frames_invalid: AtomicU64::new(0),
            frames_stale: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            detections_accepted: AtomicU64::new(0),
            detections_rejected: std::array::from_fn(|_| AtomicU64::new(0)),
            tracks_created: AtomicU64::new(0),
            tracks_expired: AtomicU64::new(0),
            events_emitted: std::array::from_fn(|_| AtomicU64::new(0)),
            tracks_skipped: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a processed frame with its pipeline latency
    #[inline]
    pub fn record_frame_processed(&self, latency_us: u64) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.frames_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_frame_dropped(&self) {
        self.frames_dropped_backpressure.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_invalid(&self) {
        self.frames_invalid.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_stale(&self) {
        self.frames_stale.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_detections_accepted(&self, count: u64) {
        self.detections_accepted.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_detection_rejected(&self, reason: InvalidDetection) {
        let idx = match reason {
            InvalidDetection::NonFinite => 0,
            InvalidDetection::Degenerate => 1,
            InvalidDetection::OutOfBounds => 2,
            InvalidDetection::ScoreOutOfRange => 3,
            InvalidDetection::LowScore => 4,
        };
        self.detections_rejected[idx].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_track_created(&self) {
        self.tracks_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_tracks_expired(&self, count: u64) {
        self.tracks_expired.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_event(&self, kind: EventKind) {
        self.events_emitted[event_kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_track_skipped(&self) {
        self.tracks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped_backpressure.load(Ordering::Relaxed)
    }

    pub fn frames_invalid(&self) -> u64 {
        self.frames_invalid.load(Ordering::Relaxed)
    }

    pub fn frames_stale(&self) -> u64 {
        self.frames_stale.load(Ordering::Relaxed)
    }

    pub fn inference_failures(&self) -> u64 {
        self.inference_failures.load(Ordering::Relaxed)
    }

    pub fn detections_accepted(&self) -> u64 {
        self.detections_accepted.load(Ordering::Relaxed)
    }

    pub fn detections_rejected(&self) -> u64 {
        self.detections_rejected.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn tracks_created(&self) -> u64 {
        self.tracks_created.load(Ordering::Relaxed)
    }

    pub fn tracks_expired(&self) -> u64 {
        self.tracks_expired.load(Ordering::Relaxed)
    }

    pub fn events_emitted(&self, kind: EventKind) -> u64 {
        self.events_emitted[event_kind_index(kind)].load(Ordering::Relaxed)
    }

    pub fn tracks_skipped(&self) -> u64 {
        self.tracks_skipped.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    pub fn report(&self, active_tracks: usize) -> MetricsSummary {
        let frames_count = self.frames_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let frames_per_sec = if elapsed.as_secs_f64() > 0.0 {
            frames_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency = if frames_count > 0 { latency_sum / frames_count } else { 0 };

        MetricsSummary {
            frames_total: self.frames_processed(),
            frames_per_sec,
            frames_dropped: self.frames_dropped(),
            frames_invalid: self.frames_invalid(),
            frames_stale: self.frames_stale(),
            inference_failures: self.inference_failures(),
            detections_accepted: self.detections_accepted(),
            detections_rejected: self.detections_rejected(),
            tracks_created: self.tracks_created(),
            tracks_expired: self.tracks_expired(),
            tracks_skipped: self.tracks_skipped(),
            events_activity: self.events_emitted(EventKind::ActivityChange),
            events_theft: self.events_emitted(EventKind::TheftSuspected),
            events_density: self.events_emitted(EventKind::DensityLevelChanged),
            events_weapon: self.events_emitted(EventKind::WeaponSighted),
            avg_frame_latency_us: avg_latency,
            max_frame_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
            active_tracks,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub frames_total: u64,
    pub frames_per_sec: f64,
    pub frames_dropped: u64,
    pub frames_invalid: u64,
    pub frames_stale: u64,
    pub inference_failures: u64,
    pub detections_accepted: u64,
    pub detections_rejected: u64,
    pub tracks_created: u64,
    pub tracks_expired: u64,
    pub tracks_skipped: u64,
    pub events_activity: u64,
    pub events_theft: u64,
    pub events_density: u64,
    pub events_weapon: u64,
    pub avg_frame_latency_us: u64,
    pub max_frame_latency_us: u64,
    pub lat_p50_us: u64,
    pub lat_p99_us: u64,
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub active_tracks: usize,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            frames_total = %self.frames_total,
            frames_per_sec = format!("{:.1}", self.frames_per_sec),
            frames_dropped = %self.frames_dropped,
            frames_invalid = %self.frames_invalid,
            frames_stale = %self.frames_stale,
            inference_failures = %self.inference_failures,
            detections_rejected = %self.detections_rejected,
            active_tracks = %self.active_tracks,
            tracks_created = %self.tracks_created,
            tracks_expired = %self.tracks_expired,
            events_activity = %self.events_activity,
            events_theft = %self.events_theft,
            events_density = %self.events_density,
            events_weapon = %self.events_weapon,
            avg_latency_us = %self.avg_frame_latency_us,
            p99_us = %self.lat_p99_us,
            "metrics"
        );
    }
}
