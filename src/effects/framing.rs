//! Framing and stabilization indicator overlays
//!
//! Auto-framing proposes a crop that keeps detected faces centred;
//! stabilization estimates frame-to-frame drift from the picture itself.
//! Both smooth over time, so their runtimes own a little private state;
//! given the same detection stream they remain deterministic.

use crate::frame::Frame;
use crate::models::{BoundingBox, FaceDetection};
use crate::surface::{Color, Rect, Surface};

use super::confidence_gate;

/// Margin added around the face union box, as a fraction of its size
const FRAME_MARGIN: f32 = 0.35;

/// Proposes and draws a smoothed crop rectangle around detected faces
pub struct AutoFramer {
    smoothed: Option<BoundingBox>,
}

impl AutoFramer {
    pub fn new() -> Self {
        Self { smoothed: None }
    }

    /// Update the crop proposal from this tick's detections
    ///
    /// Higher sensitivity follows the subject more eagerly; lower
    /// sensitivity glides. No faces means the previous crop holds.
    pub fn update(&mut self, faces: &[FaceDetection], sensitivity: f32) -> Option<BoundingBox> {
        let gate = confidence_gate(sensitivity);
        let mut kept = faces.iter().filter(|f| f.confidence >= gate);

        let target = kept.next().map(|first| {
            let union = kept.fold(first.bounds, |acc, f| acc.union(&f.bounds));
            BoundingBox {
                x: (union.x - union.width * FRAME_MARGIN / 2.0).max(0.0),
                y: (union.y - union.height * FRAME_MARGIN / 2.0).max(0.0),
                width: (union.width * (1.0 + FRAME_MARGIN)).min(1.0),
                height: (union.height * (1.0 + FRAME_MARGIN)).min(1.0),
            }
        });

        if let Some(target) = target {
            let alpha = 0.2 + 0.6 * sensitivity.clamp(0.0, 1.0);
            let next = match self.smoothed {
                None => target,
                Some(prev) => BoundingBox {
                    x: prev.x + (target.x - prev.x) * alpha,
                    y: prev.y + (target.y - prev.y) * alpha,
                    width: prev.width + (target.width - prev.width) * alpha,
                    height: prev.height + (target.height - prev.height) * alpha,
                },
            };
            self.smoothed = Some(next);
        }
        self.smoothed
    }

    /// Draw the crop indicator for this tick
    pub fn draw(&mut self, faces: &[FaceDetection], sensitivity: f32, surface: &mut dyn Surface) {
        if let Some(crop) = self.update(faces, sensitivity) {
            surface.stroke_rect(
                Rect {
                    x: crop.x,
                    y: crop.y,
                    width: crop.width,
                    height: crop.height,
                },
                Color::WHITE.with_alpha(0.9),
                2.0,
            );
            surface.draw_label("auto-frame", crop.x, (crop.y - 0.03).max(0.0), Color::WHITE);
        }
    }

    /// Forget the smoothing history (feature re-enabled, source switched)
    pub fn reset(&mut self) {
        self.smoothed = None;
    }
}

impl Default for AutoFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Grid size for the brightness-centroid drift estimate
const PROBE_GRID: u32 = 16;

/// Estimates camera drift and draws a stabilization crosshair
///
/// Needs no perception model: drift is approximated by tracking the
/// brightness centroid of a coarse probe grid between frames.
pub struct Stabilizer {
    last_centroid: Option<(f32, f32)>,
    offset: (f32, f32),
}

impl Stabilizer {
    pub fn new() -> Self {
        Self {
            last_centroid: None,
            offset: (0.0, 0.0),
        }
    }

    fn centroid(frame: &Frame) -> (f32, f32) {
        let mut sum = 0.0f32;
        let mut sx = 0.0f32;
        let mut sy = 0.0f32;
        for gy in 0..PROBE_GRID {
            for gx in 0..PROBE_GRID {
                let nx = (gx as f32 + 0.5) / PROBE_GRID as f32;
                let ny = (gy as f32 + 0.5) / PROBE_GRID as f32;
                let px = frame.pixel(
                    (nx * frame.width as f32) as u32,
                    (ny * frame.height as f32) as u32,
                );
                let luma = 0.2126 * px[0] as f32 + 0.7152 * px[1] as f32 + 0.0722 * px[2] as f32;
                sum += luma;
                sx += nx * luma;
                sy += ny * luma;
            }
        }
        if sum < 1e-3 {
            (0.5, 0.5)
        } else {
            (sx / sum, sy / sum)
        }
    }

    /// Update the drift estimate from the current frame
    pub fn update(&mut self, frame: &Frame, sensitivity: f32) -> (f32, f32) {
        let centroid = Self::centroid(frame);
        if let Some(last) = self.last_centroid {
            let dx = centroid.0 - last.0;
            let dy = centroid.1 - last.1;
            // Smoothing strength follows sensitivity
            let alpha = 0.1 + 0.5 * sensitivity.clamp(0.0, 1.0);
            self.offset.0 += (dx - self.offset.0) * alpha;
            self.offset.1 += (dy - self.offset.1) * alpha;
        }
        self.last_centroid = Some(centroid);
        self.offset
    }

    /// Draw the stabilization crosshair and drift vector
    pub fn draw(&mut self, frame: &Frame, sensitivity: f32, surface: &mut dyn Surface) {
        let (dx, dy) = self.update(frame, sensitivity);
        let cx = 0.5 - dx;
        let cy = 0.5 - dy;
        surface.stroke_polyline(
            &[[cx - 0.03, cy], [cx + 0.03, cy]],
            Color::WHITE.with_alpha(0.8),
            1.0,
        );
        surface.stroke_polyline(
            &[[cx, cy - 0.03], [cx, cy + 0.03]],
            Color::WHITE.with_alpha(0.8),
            1.0,
        );
    }

    /// Forget the drift history
    pub fn reset(&mut self) {
        self.last_centroid = None;
        self.offset = (0.0, 0.0);
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new()
    }
}
