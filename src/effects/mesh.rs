//! Facial landmark mesh overlay
//!
//! Draws the dense landmark point cloud plus contour polylines for the
//! jaw, eyes, and lips. Contour indices follow the 468-point face mesh
//! convention; a sparser landmark set simply draws whatever points exist.

use crate::models::LandmarkSet;
use crate::surface::{Color, Surface};

/// Jawline contour indices (face mesh convention, abbreviated)
const JAW: [usize; 9] = [234, 93, 132, 58, 172, 136, 150, 152, 148];
/// Left eye outline
const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
/// Right eye outline
const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];
/// Outer lip outline
const LIPS: [usize; 8] = [61, 40, 37, 0, 267, 270, 291, 17];

/// Density cap keeps the point cloud readable at high sensitivity
fn point_stride(sensitivity: f32) -> usize {
    // sensitivity 1.0 draws every point, 0.0 roughly every eighth
    let stride = (8.0 - 7.0 * sensitivity.clamp(0.0, 1.0)).round() as usize;
    stride.max(1)
}

fn contour(set: &LandmarkSet, indices: &[usize]) -> Vec<[f32; 2]> {
    indices
        .iter()
        .filter_map(|&i| set.get(i))
        .map(|p| [p.x, p.y])
        .collect()
}

/// Draw the landmark mesh for each face
pub fn draw_landmark_mesh(sets: &[LandmarkSet], sensitivity: f32, surface: &mut dyn Surface) {
    let stride = point_stride(sensitivity);
    for set in sets {
        for point in set.points.iter().step_by(stride) {
            surface.fill_circle(point.x, point.y, 0.002, Color::CYAN.with_alpha(0.8));
        }

        for indices in [&JAW[..], &LEFT_EYE[..], &RIGHT_EYE[..], &LIPS[..]] {
            let line = contour(set, indices);
            // A sparse mesh may miss contour indices entirely
            if line.len() >= 2 {
                surface.stroke_polyline(&line, Color::WHITE.with_alpha(0.7), 1.0);
            }
        }
    }
}
