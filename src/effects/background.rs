//! Segmentation-driven background effects
//!
//! Blur or replace everything the person mask marks as background. These
//! passes redraw across the full canvas, which is why the compositor
//! schedules them before any overlay pass.

use std::path::Path;
use std::sync::Arc;

use crate::error::LoadError;
use crate::frame::Frame;
use crate::models::SegmentationMask;
use crate::surface::{BackgroundFill, Surface};

/// Blur radius range in pixels, scaled by sensitivity
const MIN_BLUR_RADIUS: u32 = 2;
const MAX_BLUR_RADIUS: u32 = 12;

/// Blur the background region of the frame
pub fn blur_background(mask: &SegmentationMask, sensitivity: f32, surface: &mut dyn Surface) {
    let span = (MAX_BLUR_RADIUS - MIN_BLUR_RADIUS) as f32;
    let radius = MIN_BLUR_RADIUS + (span * sensitivity.clamp(0.0, 1.0)) as u32;
    surface.blur_background(mask, radius);
}

/// Replace the background region with the configured fill
pub fn replace_background(
    mask: &SegmentationMask,
    fill: &BackgroundFill,
    surface: &mut dyn Surface,
) {
    surface.replace_background(mask, fill);
}

/// Load a replacement image from disk as an RGBA frame
pub fn load_background_image(path: &Path) -> Result<Arc<Frame>, LoadError> {
    let img = image::open(path)
        .map_err(|e| LoadError::NotFound(format!("{}: {e}", path.display())))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(Arc::new(Frame::new(img.into_raw(), width, height, 0)))
}
