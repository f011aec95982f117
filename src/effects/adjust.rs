//! Whole-frame adjustments via CSS-style filter strings
//!
//! Color adjustment runs first in the pass order; style filter presets
//! transform the final composited image and run last.

use serde::{Deserialize, Serialize};

use crate::surface::Surface;

/// Build the color-adjust filter string for a sensitivity setting
///
/// Sensitivity 0.5 is identity; below darkens and flattens, above
/// brightens and saturates.
pub fn color_adjust_filter(sensitivity: f32) -> String {
    let s = sensitivity.clamp(0.0, 1.0);
    let brightness = 0.7 + 0.6 * s;
    let contrast = 0.85 + 0.3 * s;
    let saturate = 0.8 + 0.4 * s;
    format!("brightness({brightness:.2}) contrast({contrast:.2}) saturate({saturate:.2})")
}

/// Apply the color adjustment to the surface
pub fn apply_color_adjust(sensitivity: f32, surface: &mut dyn Surface) {
    surface.set_filter(&color_adjust_filter(sensitivity));
}

/// Named style filter presets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StylePreset {
    #[default]
    None,
    Mono,
    Sepia,
    Vivid,
    Cool,
    Warm,
}

impl StylePreset {
    /// All presets in display order
    pub fn all() -> &'static [StylePreset] {
        &[
            StylePreset::None,
            StylePreset::Mono,
            StylePreset::Sepia,
            StylePreset::Vivid,
            StylePreset::Cool,
            StylePreset::Warm,
        ]
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            StylePreset::None => "None",
            StylePreset::Mono => "Mono",
            StylePreset::Sepia => "Sepia",
            StylePreset::Vivid => "Vivid",
            StylePreset::Cool => "Cool",
            StylePreset::Warm => "Warm",
        }
    }

    /// Filter string for the preset; sensitivity scales the strength
    pub fn filter_spec(&self, sensitivity: f32) -> Option<String> {
        let s = sensitivity.clamp(0.0, 1.0);
        match self {
            StylePreset::None => None,
            StylePreset::Mono => Some(format!("grayscale({s:.2})")),
            StylePreset::Sepia => Some(format!("sepia({s:.2})")),
            StylePreset::Vivid => Some(format!(
                "saturate({:.2}) contrast({:.2})",
                1.0 + s,
                1.0 + 0.2 * s
            )),
            StylePreset::Cool => Some(format!("saturate({:.2}) brightness({:.2})", 1.0 - 0.3 * s, 1.0 + 0.1 * s)),
            StylePreset::Warm => Some(format!("sepia({:.2}) saturate({:.2})", 0.4 * s, 1.0 + 0.3 * s)),
        }
    }
}

/// Apply the style preset to the composited frame
pub fn apply_style_filter(preset: StylePreset, sensitivity: f32, surface: &mut dyn Surface) {
    if let Some(spec) = preset.filter_spec(sensitivity) {
        surface.set_filter(&spec);
    }
}
