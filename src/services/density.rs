//! Crowd density with hysteresis
//!
//! Levels: count < low => Low, low <= count < high => Medium, count >= high => High.
//! Starts at Low without an event. A different level must hold for
//! `density_hold_frames` consecutive frames before `DensityLevelChanged`
//! is emitted; a frame back at the current level cancels the pending change.

use crate::domain::event::{Event, EventKind, Severity};
use crate::domain::types::DensityLevel;
use crate::infra::config::Config;
use tracing::info;

pub struct DensityMonitor {
    low: usize,
    high: usize,
    hold_frames: u32,
    level: DensityLevel,
    /// Candidate level and how many consecutive frames it has held
    pending: Option<(DensityLevel, u32)>,
}

impl DensityMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            low: config.low_density_count(),
            high: config.high_density_count(),
            hold_frames: config.density_hold_frames(),
            level: DensityLevel::Low,
            pending: None,
        }
    }

    pub fn level_for(&self, count: usize) -> DensityLevel {
        if count < self.low {
            DensityLevel::Low
        } else if count < self.high {
            DensityLevel::Medium
        } else {
            DensityLevel::High
        }
    }

    pub fn level(&self) -> DensityLevel {
        self.level
    }

    /// Feed this frame's person count
    pub fn observe(&mut self, count: usize, now_ms: u64) -> Option<Event> {
        let observed = self.level_for(count);
        if observed == self.level {
            self.pending = None;
            return None;
        }

        let held = match self.pending {
            Some((level, frames)) if level == observed => frames + 1,
            _ => 1,
        };
        if held < self.hold_frames {
            self.pending = Some((observed, held));
            return None;
        }

        let from = self.level;
        self.level = observed;
        self.pending = None;
        info!(from = %from, to = %observed, person_count = %count, "density_level_changed");

        let severity = match observed {
            DensityLevel::Low => Severity::Low,
            DensityLevel::Medium => Severity::Medium,
            DensityLevel::High => Severity::High,
        };
        Some(
            Event::new(EventKind::DensityLevelChanged, now_ms, severity)
                .with_detail("from", from.as_str())
                .with_detail("to", observed.as_str())
                .with_detail("person_count", count as u64),
        )
    }

    pub fn reset(&mut self) {
        self.level = DensityLevel::Low;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(monitor: &mut DensityMonitor, counts: &[usize]) -> Vec<Event> {
        counts
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| monitor.observe(c, i as u64 * 33))
            .collect()
    }

    #[test]
    fn test_levels() {
        let monitor = DensityMonitor::new(&Config::default());
        assert_eq!(monitor.level_for(9), DensityLevel::Low);
        assert_eq!(monitor.level_for(10), DensityLevel::Medium);
        assert_eq!(monitor.level_for(29), DensityLevel::Medium);
        assert_eq!(monitor.level_for(30), DensityLevel::High);
    }

    #[test]
    fn test_only_transitions_emit() {
        let mut monitor = DensityMonitor::new(&Config::default());
        let events = feed(&mut monitor, &[5, 5, 5, 12, 12, 5]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].detail_str("to"), Some("medium"));
        assert_eq!(events[1].detail_str("from"), Some("medium"));
        assert_eq!(events[1].detail_str("to"), Some("low"));
        assert_eq!(monitor.level(), DensityLevel::Low);
    }

    #[test]
    fn test_hold_frames_absorb_flapping() {
        let config = Config::default().with_density_hold_frames(3);
        let mut monitor = DensityMonitor::new(&config);
        assert!(feed(&mut monitor, &[12, 12, 5, 12, 12]).is_empty());

        let mut monitor = DensityMonitor::new(&config);
        let events = feed(&mut monitor, &[12, 12, 12]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp_ms, 66);
    }

    #[test]
    fn test_jump_straight_to_high() {
        let mut monitor = DensityMonitor::new(&Config::default());
        let events = feed(&mut monitor, &[40]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::High);
        assert_eq!(events[0].detail_str("from"), Some("low"));
    }
}
