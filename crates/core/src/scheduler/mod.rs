use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{LedGraphError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Frames advance whenever the target interval has elapsed.
    Continuous,
    /// Frames advance only on explicit request.
    SingleStep,
}

/// Decides when the next frame is due.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    mode: ScheduleMode,
    target_fps: f32,
    last_render: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(target_fps: f32) -> Result<Self> {
        let mut scheduler = Self {
            mode: ScheduleMode::SingleStep,
            target_fps: 30.0,
            last_render: None,
        };
        scheduler.set_target_fps(target_fps)?;
        Ok(scheduler)
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.mode == ScheduleMode::Continuous
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps
    }

    pub fn interval(&self) -> Duration {
        Duration::from_nanos((1e9 / self.target_fps as f64).round() as u64)
    }

    pub fn set_target_fps(&mut self, fps: f32) -> Result<()> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(LedGraphError::InvalidConfig(format!(
                "target frame rate must be a positive number, got {fps}"
            )));
        }
        self.target_fps = fps;
        Ok(())
    }

    /// Switches to continuous mode. The first poll afterwards is due at once.
    pub fn start(&mut self) {
        self.mode = ScheduleMode::Continuous;
        self.last_render = None;
    }

    pub fn stop(&mut self) {
        self.mode = ScheduleMode::SingleStep;
    }

    /// Returns true when a frame should be rendered at `now`.
    ///
    /// Polling faster than the target rate skips ticks. Polling slower never
    /// produces more than one frame per call, and the remainder of the
    /// elapsed time is carried so the cadence does not drift.
    pub fn due(&mut self, now: Instant) -> bool {
        if self.mode != ScheduleMode::Continuous {
            return false;
        }

        let Some(last) = self.last_render else {
            self.last_render = Some(now);
            return true;
        };

        let elapsed = now.saturating_duration_since(last);
        let interval = self.interval();
        if elapsed < interval {
            return false;
        }

        let carry = elapsed.as_nanos() % interval.as_nanos().max(1);
        let carry = Duration::from_nanos(carry as u64);
        self.last_render = Some(now.checked_sub(carry).unwrap_or(now));
        true
    }

    /// Time left until the next frame is due, if running.
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        if !self.is_running() {
            return None;
        }
        let last = match self.last_render {
            Some(last) => last,
            None => return Some(Duration::ZERO),
        };
        Some(
            self.interval()
                .saturating_sub(now.saturating_duration_since(last)),
        )
    }
}
