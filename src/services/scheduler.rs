//! Frame scheduling - bounded hand-off from the frame source to the engine
//!
//! The source offers frames without ever blocking. The pipeline task pulls
//! one frame, awaits the external detector, and feeds the result to the
//! engine before pulling the next, so frame N is fully processed before
//! frame N+1 is associated.
//!
//! Backpressure is a drop policy, not a queue: while inference is in flight
//! (or a frame is already waiting) newly offered frames are discarded.

use crate::domain::types::{FrameDetections, RawDetection};
use crate::infra::error::InferenceFailure;
use crate::infra::metrics::Metrics;
use crate::services::engine::Engine;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// A captured frame awaiting detection
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub seq: u64,
    /// Monotonic capture time in milliseconds
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    /// Encoded pixel payload, opaque to the engine
    pub pixels: Bytes,
}

/// The external object-detection model
#[async_trait]
pub trait Detector: Send {
    async fn detect(&mut self, frame: &CapturedFrame) -> anyhow::Result<Vec<RawDetection>>;

    fn name(&self) -> &'static str {
        "detector"
    }
}

/// Whether the pipeline currently holds a frame
type BusyFlag = Arc<AtomicBool>;

/// Producer side; cheap to clone
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<CapturedFrame>,
    busy: BusyFlag,
    metrics: Arc<Metrics>,
}

/// Consumer side, owned by the pipeline task
pub struct FrameReceiver {
    rx: mpsc::Receiver<CapturedFrame>,
    busy: BusyFlag,
}

/// Create the single-slot frame channel
pub fn create_frame_channel(metrics: Arc<Metrics>) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(1);
    let busy = Arc::new(AtomicBool::new(false));
    (FrameSender { tx, busy: busy.clone(), metrics }, FrameReceiver { rx, busy })
}

/// Outcome of offering a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    /// Inference in flight or a frame already waiting
    Dropped,
    /// Pipeline is gone
    Closed,
}

impl FrameSender {
    /// Offer a frame without blocking
    pub fn offer(&self, frame: CapturedFrame) -> Offer {
        if self.busy.load(Ordering::Acquire) {
            self.metrics.record_frame_dropped();
            debug!(seq = %frame.seq, reason = "inference_in_flight", "frame_dropped_backpressure");
            return Offer::Dropped;
        }
        match self.tx.try_send(frame) {
            Ok(()) => Offer::Accepted,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                self.metrics.record_frame_dropped();
                debug!(seq = %frame.seq, reason = "slot_full", "frame_dropped_backpressure");
                Offer::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Lossless hand-off for offline replay: waits for the slot instead of
    /// dropping. Returns false once the pipeline is gone.
    pub async fn send(&self, frame: CapturedFrame) -> bool {
        self.tx.send(frame).await.is_ok()
    }
}

impl FrameReceiver {
    /// Take the next frame and mark the pipeline busy
    pub async fn recv(&mut self) -> Option<CapturedFrame> {
        let frame = self.rx.recv().await?;
        self.busy.store(true, Ordering::Release);
        Some(frame)
    }

    /// Mark the current frame fully processed
    pub fn finish(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Resolve once shutdown is signalled; never resolves if the signal is dropped
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Single-task pull loop: frame -> detector -> engine
///
/// Runs until shutdown or until every `FrameSender` is dropped. A detection
/// still in flight at shutdown is abandoned. The engine is stopped before it
/// is handed back, so no event is emitted after this returns.
pub async fn run_pipeline<D: Detector>(
    mut engine: Engine,
    mut detector: D,
    mut frames: FrameReceiver,
    mut shutdown: watch::Receiver<bool>,
) -> Engine {
    info!(detector = %detector.name(), "pipeline_started");
    let mut processed: u64 = 0;

    loop {
        let frame = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                info!("pipeline_shutdown");
                break;
            }
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => {
                    info!("frame_source_closed");
                    break;
                }
            },
        };

        let result = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                info!(seq = %frame.seq, "pipeline_shutdown_inference_abandoned");
                break;
            }
            result = detector.detect(&frame) => result,
        };

        match result {
            Ok(detections) => {
                let batch = FrameDetections::new(frame.timestamp_ms, frame.width, frame.height, detections);
                engine.submit_frame(&batch);
            }
            Err(e) => {
                engine.submit_failure(&InferenceFailure {
                    seq: frame.seq,
                    timestamp_ms: frame.timestamp_ms,
                    reason: format!("{:#}", e),
                });
            }
        }
        frames.finish();
        processed += 1;
    }

    engine.stop();
    frames.finish();
    info!(frames = %processed, "pipeline_stopped");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> CapturedFrame {
        CapturedFrame { seq, timestamp_ms: seq * 33, width: 640, height: 480, pixels: Bytes::new() }
    }

    #[tokio::test]
    async fn test_second_offer_dropped_while_slot_full() {
        let metrics = Arc::new(Metrics::new());
        let (tx, mut rx) = create_frame_channel(metrics.clone());

        assert_eq!(tx.offer(frame(0)), Offer::Accepted);
        assert_eq!(tx.offer(frame(1)), Offer::Dropped);
        assert_eq!(rx.recv().await.map(|f| f.seq), Some(0));
        assert_eq!(metrics.frames_dropped(), 1);
    }

    #[tokio::test]
    async fn test_offer_dropped_while_busy() {
        let metrics = Arc::new(Metrics::new());
        let (tx, mut rx) = create_frame_channel(metrics.clone());

        tx.offer(frame(0));
        let _in_flight = rx.recv().await;
        assert_eq!(tx.offer(frame(1)), Offer::Dropped);

        rx.finish();
        assert_eq!(tx.offer(frame(2)), Offer::Accepted);
        assert_eq!(rx.recv().await.map(|f| f.seq), Some(2));
    }

    #[tokio::test]
    async fn test_offer_after_receiver_dropped() {
        let (tx, rx) = create_frame_channel(Arc::new(Metrics::new()));
        drop(rx);
        assert_eq!(tx.offer(frame(0)), Offer::Closed);
    }
}
