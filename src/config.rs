//! Pipeline configuration
//!
//! Serde-backed settings persisted as JSON: governor thresholds, the
//! per-quality model input resolutions and effect pass budgets, tick
//! rate, and background styling. Out-of-range values are clamped on
//! load rather than rejected.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::effects::adjust::StylePreset;
use crate::governor::{GovernorConfig, QualityLevel};

/// Per-quality tuning knobs
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Model input resolution at this level
    pub input_width: u32,
    pub input_height: u32,
    /// Maximum effect passes drawn per tick
    pub pass_budget: usize,
}

/// Background styling for the replace effect
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Flat fill color (RGB, 0.0-1.0) used when no image is set
    pub color: [f32; 3],
    /// Optional replacement image
    pub image_path: Option<PathBuf>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            color: [0.08, 0.1, 0.14],
            image_path: None,
        }
    }
}

/// Full pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Compositor tick rate (ticks per second, 1-240)
    pub tick_hz: u32,
    /// Quality governor tuning
    pub governor: GovernorConfig,
    pub low: QualityProfile,
    pub medium: QualityProfile,
    pub high: QualityProfile,
    /// Active style filter preset
    pub style_preset: StylePreset,
    /// Background replacement styling
    pub background: BackgroundConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_hz: 30,
            governor: GovernorConfig::default(),
            low: QualityProfile {
                input_width: 128,
                input_height: 128,
                pass_budget: 3,
            },
            medium: QualityProfile {
                input_width: 256,
                input_height: 256,
                pass_budget: 6,
            },
            high: QualityProfile {
                input_width: 512,
                input_height: 512,
                pass_budget: usize::MAX,
            },
            style_preset: StylePreset::None,
            background: BackgroundConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Profile for a quality level
    pub fn profile(&self, quality: QualityLevel) -> &QualityProfile {
        match quality {
            QualityLevel::Low => &self.low,
            QualityLevel::Medium => &self.medium,
            QualityLevel::High => &self.high,
        }
    }

    /// Model input resolution at a quality level
    pub fn input_size(&self, quality: QualityLevel) -> (u32, u32) {
        let p = self.profile(quality);
        (p.input_width, p.input_height)
    }

    /// Effect pass budget at a quality level
    pub fn pass_budget(&self, quality: QualityLevel) -> usize {
        self.profile(quality).pass_budget
    }

    /// Clamp values into their supported ranges
    pub fn clamp(&mut self) {
        self.tick_hz = self.tick_hz.clamp(1, 240);
        self.governor.window_secs = self.governor.window_secs.clamp(0.1, 30.0);
        if self.governor.raise_above_fps < self.governor.drop_below_fps {
            self.governor.raise_above_fps = self.governor.drop_below_fps;
        }
    }

    /// Load configuration from a JSON file, clamping on the way in
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let mut config: PipelineConfig = serde_json::from_str(&text)?;
        config.clamp();
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

/// Configuration load/save errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}
