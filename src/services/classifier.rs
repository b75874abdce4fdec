//! Activity classifier - priority-ordered motion thresholds
//!
//! First match wins:
//! 1. |vertical delta| > jump_delta        => Jumping
//! 2. avg speed >= run_speed               => Running
//! 3. avg speed >= walk_speed              => Walking
//! 4. |dx| > exit_delta_x and |dy| < exit_delta_y => QuickExit
//! 5. otherwise                            => Standing
//!
//! A track with no velocity sample yet stays `New`. No smoothing across
//! frames: labels may flicker, debouncing belongs to the event rules.

use crate::domain::types::Activity;
use crate::infra::config::Config;
use crate::services::motion::MotionEstimate;

#[derive(Debug, Clone)]
pub struct ActivityClassifier {
    jump_delta: f64,
    run_speed: f64,
    walk_speed: f64,
    exit_delta_x: f64,
    exit_delta_y: f64,
}

impl ActivityClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            jump_delta: config.jump_delta(),
            run_speed: config.run_speed(),
            walk_speed: config.walk_speed(),
            exit_delta_x: config.exit_delta_x(),
            exit_delta_y: config.exit_delta_y(),
        }
    }

    /// Classify one motion estimate; thresholds are multiplied by `scale`
    pub fn classify(&self, motion: &MotionEstimate, scale: f64) -> Activity {
        if motion.samples == 0 {
            return Activity::New;
        }

        let dy = motion.vertical_delta.abs();
        let dx = motion.horizontal_delta.abs();

        if dy > self.jump_delta * scale {
            Activity::Jumping
        } else if motion.avg_speed >= self.run_speed * scale {
            Activity::Running
        } else if motion.avg_speed >= self.walk_speed * scale {
            Activity::Walking
        } else if dx > self.exit_delta_x * scale && dy < self.exit_delta_y * scale {
            Activity::QuickExit
        } else {
            Activity::Standing
        }
    }
}
