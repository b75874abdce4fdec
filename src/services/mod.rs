//! Services - the track-and-classify pipeline
//!
//! This module contains the per-frame stages and their orchestration:
//! - `ingest` - Detection validation and normalization
//! - `associator` / `registry` - Identity resolution and track lifecycle
//! - `motion` / `classifier` - Velocity smoothing and activity labels
//! - `activity_events` / `theft` / `density` / `weapon` - Event rules
//! - `engine` - Per-frame orchestrator owning all engine state
//! - `scheduler` - Frame channel with drop-on-backpressure and the async pipeline

pub mod activity_events;
pub mod associator;
pub mod classifier;
pub mod density;
pub mod engine;
pub mod ingest;
pub mod motion;
pub mod registry;
pub mod scheduler;
pub mod theft;
pub mod weapon;

// Re-export commonly used types
pub use associator::{Associator, GreedyAssociator};
pub use engine::Engine;
pub use registry::TrackRegistry;
pub use scheduler::{create_frame_channel, run_pipeline, CapturedFrame, Detector, FrameReceiver, FrameSender, Offer};
