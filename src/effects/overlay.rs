//! Box and keypoint overlays
//!
//! Draws face bounding boxes and hand keypoint skeletons over the
//! composited frame.

use crate::models::{FaceDetection, HandDetection};
use crate::surface::{Color, Rect, Surface};

use super::confidence_gate;

/// Keypoint pairs forming the hand skeleton (MediaPipe landmark order)
const HAND_CONNECTIONS: [[usize; 2]; 20] = [
    [0, 1], [1, 2], [2, 3], [3, 4], // thumb
    [0, 5], [5, 6], [6, 7], [7, 8], // index
    [5, 9], [9, 10], [10, 11], [11, 12], // middle
    [9, 13], [13, 14], [14, 15], [15, 16], // ring
    [13, 17], [17, 18], [18, 19], [19, 20], // pinky
];

/// Draw a box and confidence tag per detected face
pub fn draw_face_boxes(faces: &[FaceDetection], sensitivity: f32, surface: &mut dyn Surface) {
    let gate = confidence_gate(sensitivity);
    for face in faces {
        if face.confidence < gate {
            continue;
        }
        let rect = Rect {
            x: face.bounds.x,
            y: face.bounds.y,
            width: face.bounds.width,
            height: face.bounds.height,
        };
        surface.stroke_rect(rect, Color::GREEN, 2.0);
        surface.draw_label(
            &format!("face {:.0}%", face.confidence * 100.0),
            face.bounds.x,
            (face.bounds.y - 0.03).max(0.0),
            Color::GREEN,
        );
    }
}

/// Draw the 21-point skeleton for each detected hand
pub fn draw_hand_keypoints(hands: &[HandDetection], sensitivity: f32, surface: &mut dyn Surface) {
    let gate = confidence_gate(sensitivity);
    for hand in hands {
        if hand.confidence < gate {
            continue;
        }
        let color = if hand.is_right {
            Color::CYAN
        } else {
            Color::MAGENTA
        };

        for pair in HAND_CONNECTIONS {
            let a = hand.landmarks[pair[0]];
            let b = hand.landmarks[pair[1]];
            surface.stroke_polyline(&[[a.x, a.y], [b.x, b.y]], color, 2.0);
        }
        for point in hand.landmarks {
            surface.fill_circle(point.x, point.y, 0.004, color);
        }
    }
}
