//! Recorded detection streams
//!
//! A recording is JSONL, one frame per line:
//! `{"timestamp_ms":33,"width":640,"height":480,"detections":[{"class":"person","score":0.9,"box":{"x":..,"y":..,"w":..,"h":..}}]}`
//! A line may carry `"inference_error":"..."` instead of detections to
//! replay a failed model call. Blank lines and `#` comments are skipped.
//!
//! `ReplayDetector` plays the recorded model output back through the
//! `Detector` trait so a recording drives the same pipeline as a live model.

use crate::domain::types::{FrameDetections, RawDetection};
use crate::infra::error::EngineError;
use crate::services::scheduler::{CapturedFrame, Detector};
use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// One line of a recording
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    #[serde(flatten)]
    pub frame: FrameDetections,
    #[serde(default)]
    pub inference_error: Option<String>,
}

/// Parse a recording from text; `source` names it in errors
pub fn parse_recording(content: &str, source: &str) -> Result<Vec<FrameRecord>, EngineError> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(line).map_err(|e| {
            EngineError::Recording(format!("{}:{}: invalid frame record: {}", source, idx + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_recording<P: AsRef<Path>>(path: P) -> Result<Vec<FrameRecord>, EngineError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let records = parse_recording(&content, &path.display().to_string())?;
    info!(path = %path.display(), frames = %records.len(), "recording_loaded");
    Ok(records)
}

/// Turn records into captured frames, numbered in file order
pub fn captured_frames(records: &[FrameRecord]) -> Vec<CapturedFrame> {
    records
        .iter()
        .enumerate()
        .map(|(seq, r)| CapturedFrame {
            seq: seq as u64,
            timestamp_ms: r.frame.timestamp_ms,
            width: r.frame.width,
            height: r.frame.height,
            pixels: Bytes::new(),
        })
        .collect()
}

/// Detector answering from a recording, keyed by frame sequence number
pub struct ReplayDetector {
    outputs: FxHashMap<u64, Result<Vec<RawDetection>, String>>,
    latency: Option<Duration>,
}

impl ReplayDetector {
    pub fn new(records: &[FrameRecord]) -> Self {
        let outputs = records
            .iter()
            .enumerate()
            .map(|(seq, r)| {
                let output = match &r.inference_error {
                    Some(reason) => Err(reason.clone()),
                    None => Ok(r.frame.detections.clone()),
                };
                (seq as u64, output)
            })
            .collect();
        Self { outputs, latency: None }
    }

    /// Simulate model latency on every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl Detector for ReplayDetector {
    async fn detect(&mut self, frame: &CapturedFrame) -> anyhow::Result<Vec<RawDetection>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.outputs.get(&frame.seq) {
            Some(Ok(detections)) => Ok(detections.clone()),
            Some(Err(reason)) => Err(anyhow!("{}", reason)),
            None => Err(anyhow!("no recorded output for frame {}", frame.seq)),
        }
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDING: &str = r#"
# lobby camera, two frames
{"timestamp_ms":0,"width":640,"height":480,"detections":[{"class":"person","score":0.9,"box":{"x":100,"y":100,"w":50,"h":150}}]}

{"timestamp_ms":33,"width":640,"height":480,"inference_error":"model timeout"}
"#;

    #[test]
    fn test_parse_recording() {
        let records = parse_recording(RECORDING, "inline").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].frame.detections[0].class, "person");
        assert!(records[1].frame.detections.is_empty());
        assert_eq!(records[1].inference_error.as_deref(), Some("model timeout"));
    }

    #[test]
    fn test_parse_error_names_line() {
        let err = parse_recording("{\"timestamp_ms\":0}\nnot json", "rec.jsonl").unwrap_err();
        assert!(err.to_string().contains("rec.jsonl:1"));
    }

    #[tokio::test]
    async fn test_replay_detector() {
        let records = parse_recording(RECORDING, "inline").unwrap();
        let frames = captured_frames(&records);
        let mut detector = ReplayDetector::new(&records);

        assert_eq!(detector.detect(&frames[0]).await.unwrap().len(), 1);
        let err = detector.detect(&frames[1]).await.unwrap_err();
        assert_eq!(err.to_string(), "model timeout");
    }
}
