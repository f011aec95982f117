//! Adaptive quality governor
//!
//! Watches achieved frames-per-second over a rolling window and steps the
//! quality level down under load and back up when the pipeline has
//! headroom. Advisory only: consumers decide what a level change means
//! (model input resolution, effect pass budget). The governor performs no
//! rendering.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Discrete quality level for model input resolution and effect budget
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum QualityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityLevel {
    /// All levels, lowest first
    pub fn all() -> &'static [QualityLevel] {
        &[QualityLevel::Low, QualityLevel::Medium, QualityLevel::High]
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
        }
    }

    fn lower(self) -> QualityLevel {
        match self {
            QualityLevel::High => QualityLevel::Medium,
            _ => QualityLevel::Low,
        }
    }
}

/// Tuning constants for the governor
///
/// The thresholds are deliberately configuration, not invariants; the
/// defaults match typical webcam pipelines.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Drop one level when measured fps falls below this
    pub drop_below_fps: f64,
    /// Raise from low back to medium when fps climbs above this
    pub raise_above_fps: f64,
    /// Measurement window in seconds
    pub window_secs: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            drop_below_fps: 15.0,
            raise_above_fps: 25.0,
            window_secs: 1.0,
        }
    }
}

impl GovernorConfig {
    fn window(&self) -> Duration {
        Duration::from_secs_f64(self.window_secs.max(0.1))
    }
}

/// Rolling fps estimator driving [`QualityLevel`] transitions
///
/// Auto-transitions never reach `High`; only an explicit user override
/// does. A transition resets the measurement window so a single slow
/// second can drop at most one level.
pub struct QualityGovernor {
    config: GovernorConfig,
    level: QualityLevel,
    override_level: Option<QualityLevel>,
    frames: u32,
    window_start: Option<Instant>,
}

impl QualityGovernor {
    /// Create a governor starting at `Medium`
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            level: QualityLevel::Medium,
            override_level: None,
            frames: 0,
            window_start: None,
        }
    }

    /// Level consumers should run at right now
    pub fn effective_level(&self) -> QualityLevel {
        self.override_level.unwrap_or(self.level)
    }

    /// Governed level, ignoring any override
    pub fn governed_level(&self) -> QualityLevel {
        self.level
    }

    /// Pin the level to a user choice, or `None` to resume governing
    pub fn set_override(&mut self, level: Option<QualityLevel>) {
        self.override_level = level;
        self.frames = 0;
        self.window_start = None;
    }

    /// Whether a user override is active
    pub fn is_overridden(&self) -> bool {
        self.override_level.is_some()
    }

    /// Record one composited frame at `now`
    ///
    /// Returns the new level when a full window elapsed and triggered a
    /// transition.
    pub fn on_frame(&mut self, now: Instant) -> Option<QualityLevel> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        let elapsed = now.duration_since(start);
        if elapsed < self.config.window() {
            return None;
        }

        let fps = self.frames as f64 / elapsed.as_secs_f64().max(1e-6);
        self.frames = 0;
        self.window_start = Some(now);

        if self.override_level.is_some() {
            return None;
        }

        if fps < self.config.drop_below_fps && self.level != QualityLevel::Low {
            self.level = self.level.lower();
            tracing::info!(fps, level = self.level.name(), "quality stepped down");
            return Some(self.level);
        }

        if fps > self.config.raise_above_fps && self.level == QualityLevel::Low {
            self.level = QualityLevel::Medium;
            tracing::info!(fps, level = self.level.name(), "quality stepped up");
            return Some(self.level);
        }

        None
    }
}
