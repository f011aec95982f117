//! Heuristic classifiers over detected geometry
//!
//! Gesture-from-keypoints and expression-from-landmark-geometry are
//! expressed as ordered rule tables: a list of (predicate, label) pairs
//! evaluated first-match-wins with an explicit fallback label. The
//! decision order is data, inspectable and testable apart from any
//! rendering. All classification is deterministic for identical input
//! and never panics on degenerate geometry.

use crate::models::{Expression, ExpressionScores, HandDetection, LandmarkSet};
use crate::surface::{Color, Surface};

use super::confidence_gate;

/// Recognized hand gestures plus the explicit fallback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Gesture {
    OpenPalm,
    Fist,
    Pointing,
    Victory,
    ThumbsUp,
    #[default]
    Unknown,
}

impl Gesture {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::OpenPalm => "open palm",
            Gesture::Fist => "fist",
            Gesture::Pointing => "pointing",
            Gesture::Victory => "victory",
            Gesture::ThumbsUp => "thumbs up",
            Gesture::Unknown => "unknown",
        }
    }
}

/// Derived hand geometry consumed by the gesture rules
#[derive(Clone, Copy, Debug, Default)]
pub struct HandShape {
    /// Finger extension flags: thumb, index, middle, ring, pinky
    pub extended: [bool; 5],
}

impl HandShape {
    /// Compute finger extension from the 21-point landmark layout
    pub fn from_hand(hand: &HandDetection) -> Self {
        let lm = &hand.landmarks;
        let wrist = lm[0];
        let dist = |i: usize| {
            let dx = lm[i].x - wrist.x;
            let dy = lm[i].y - wrist.y;
            (dx * dx + dy * dy).sqrt()
        };

        // A finger counts as extended when its tip sits further from the
        // wrist than its middle joint. Thumb uses tip vs. knuckle.
        let mut extended = [false; 5];
        extended[0] = dist(4) > dist(2) * 1.15;
        for (slot, (tip, pip)) in [(8, 6), (12, 10), (16, 14), (20, 18)].iter().enumerate() {
            extended[slot + 1] = dist(*tip) > dist(*pip);
        }
        Self { extended }
    }

    fn fingers(&self) -> usize {
        self.extended[1..].iter().filter(|e| **e).count()
    }
}

/// One gesture rule: first match in table order wins
pub struct GestureRule {
    pub label: Gesture,
    pub matches: fn(&HandShape) -> bool,
}

/// Ordered gesture decision table
pub const GESTURE_RULES: [GestureRule; 5] = [
    GestureRule {
        label: Gesture::OpenPalm,
        matches: |s| s.fingers() == 4 && s.extended[0],
    },
    GestureRule {
        label: Gesture::Victory,
        matches: |s| s.extended[1] && s.extended[2] && !s.extended[3] && !s.extended[4],
    },
    GestureRule {
        label: Gesture::Pointing,
        matches: |s| s.extended[1] && !s.extended[2] && !s.extended[3] && !s.extended[4],
    },
    GestureRule {
        label: Gesture::ThumbsUp,
        matches: |s| s.extended[0] && s.fingers() == 0,
    },
    GestureRule {
        label: Gesture::Fist,
        matches: |s| !s.extended[0] && s.fingers() == 0,
    },
];

/// Classify one hand; falls back to `Unknown` when no rule matches
pub fn classify_gesture(hand: &HandDetection) -> Gesture {
    let shape = HandShape::from_hand(hand);
    GESTURE_RULES
        .iter()
        .find(|rule| (rule.matches)(&shape))
        .map(|rule| rule.label)
        .unwrap_or(Gesture::Unknown)
}

/// Derived face geometry consumed by the expression rules
#[derive(Clone, Copy, Debug, Default)]
pub struct FaceMetrics {
    /// Lip gap over mouth width
    pub mouth_open: f32,
    /// Mouth-corner lift relative to the lip midline, normalized by
    /// mouth width; positive means corners above the midline
    pub corner_lift: f32,
}

// Face mesh landmark indices used by the expression heuristics
const MOUTH_LEFT: usize = 61;
const MOUTH_RIGHT: usize = 291;
const LIP_TOP: usize = 13;
const LIP_BOTTOM: usize = 14;

impl FaceMetrics {
    /// Compute metrics; `None` when the mesh lacks the needed points
    pub fn from_landmarks(set: &LandmarkSet) -> Option<Self> {
        let left = set.get(MOUTH_LEFT)?;
        let right = set.get(MOUTH_RIGHT)?;
        let top = set.get(LIP_TOP)?;
        let bottom = set.get(LIP_BOTTOM)?;

        let width = ((right.x - left.x).powi(2) + (right.y - left.y).powi(2)).sqrt();
        if width < 1e-4 {
            return None;
        }
        let gap = (bottom.y - top.y).abs();
        let midline = (top.y + bottom.y) * 0.5;
        let corner_y = (left.y + right.y) * 0.5;

        Some(Self {
            mouth_open: gap / width,
            corner_lift: (midline - corner_y) / width,
        })
    }
}

/// One expression rule
pub struct ExpressionRule {
    pub label: Expression,
    pub matches: fn(&FaceMetrics) -> bool,
}

/// Ordered expression decision table (geometry fallback path)
pub const EXPRESSION_RULES: [ExpressionRule; 3] = [
    ExpressionRule {
        label: Expression::Surprised,
        matches: |m| m.mouth_open > 0.35,
    },
    ExpressionRule {
        label: Expression::Happy,
        matches: |m| m.corner_lift > 0.08,
    },
    ExpressionRule {
        label: Expression::Sad,
        matches: |m| m.corner_lift < -0.08,
    },
];

/// Classify a face from landmark geometry alone
///
/// Used while the expression model is still loading; falls back to
/// `Neutral` for degenerate or incomplete meshes.
pub fn classify_expression_from_landmarks(set: &LandmarkSet) -> Expression {
    let Some(metrics) = FaceMetrics::from_landmarks(set) else {
        return Expression::Neutral;
    };
    EXPRESSION_RULES
        .iter()
        .find(|rule| (rule.matches)(&metrics))
        .map(|rule| rule.label)
        .unwrap_or(Expression::Neutral)
}

/// Pick the model's top expression, gated by sensitivity
pub fn expression_from_scores(scores: &ExpressionScores, sensitivity: f32) -> Expression {
    let (label, score) = scores.top();
    if score >= confidence_gate(sensitivity) {
        label
    } else {
        Expression::Neutral
    }
}

/// Label each hand with its classified gesture
pub fn draw_gesture_labels(hands: &[HandDetection], sensitivity: f32, surface: &mut dyn Surface) {
    let gate = confidence_gate(sensitivity);
    for hand in hands {
        if hand.confidence < gate {
            continue;
        }
        let gesture = classify_gesture(hand);
        let wrist = hand.landmarks[0];
        surface.draw_label(
            gesture.name(),
            wrist.x,
            (wrist.y + 0.03).min(1.0),
            Color::YELLOW,
        );
    }
}

/// Label each face with its expression
///
/// Prefers model scores; falls back to landmark geometry for faces the
/// expression model has no answer for yet.
pub fn draw_expression_labels(
    scores: &[ExpressionScores],
    landmarks: &[LandmarkSet],
    sensitivity: f32,
    surface: &mut dyn Surface,
) {
    if !scores.is_empty() {
        for entry in scores {
            let label = expression_from_scores(entry, sensitivity);
            surface.draw_label(
                label.name(),
                entry.bounds.x,
                (entry.bounds.y + entry.bounds.height + 0.01).min(1.0),
                Color::YELLOW,
            );
        }
        return;
    }

    for set in landmarks {
        let label = classify_expression_from_landmarks(set);
        if let Some((x, y)) = set.centroid() {
            surface.draw_label(label.name(), x, (y + 0.05).min(1.0), Color::YELLOW);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, Landmark};
    use crate::surface::recording::{DrawOp, RecordingSurface};

    /// Hand with the given fingers extended (thumb, index, middle, ring, pinky)
    fn hand_with(extended: [bool; 5]) -> HandDetection {
        let mut hand = HandDetection {
            confidence: 0.9,
            ..Default::default()
        };
        // Wrist at bottom centre; finger chains run upward
        hand.landmarks[0] = Landmark { x: 0.5, y: 0.9, z: 0.0 };
        let chains = [
            (0, [1usize, 2, 3, 4]),
            (1, [5, 6, 7, 8]),
            (2, [9, 10, 11, 12]),
            (3, [13, 14, 15, 16]),
            (4, [17, 18, 19, 20]),
        ];
        for (finger, joints) in chains {
            let x = 0.3 + finger as f32 * 0.1;
            for (step, joint) in joints.into_iter().enumerate() {
                // A curled finger folds its tip back toward the wrist
                let reach = if extended[finger] {
                    0.1 + step as f32 * 0.1
                } else {
                    0.1 + (step as f32 * 0.1).min(0.2) - if step == 3 { 0.15 } else { 0.0 }
                };
                hand.landmarks[joint] = Landmark {
                    x,
                    y: 0.9 - reach,
                    z: 0.0,
                };
            }
        }
        hand
    }

    #[test]
    fn test_open_palm_and_fist() {
        assert_eq!(
            classify_gesture(&hand_with([true; 5])),
            Gesture::OpenPalm
        );
        assert_eq!(
            classify_gesture(&hand_with([false; 5])),
            Gesture::Fist
        );
    }

    #[test]
    fn test_pointing_and_victory() {
        assert_eq!(
            classify_gesture(&hand_with([false, true, false, false, false])),
            Gesture::Pointing
        );
        assert_eq!(
            classify_gesture(&hand_with([false, true, true, false, false])),
            Gesture::Victory
        );
    }

    #[test]
    fn test_unmatched_shape_falls_back_to_unknown() {
        // Ring+pinky only matches no rule
        assert_eq!(
            classify_gesture(&hand_with([false, false, false, true, true])),
            Gesture::Unknown
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let hand = hand_with([true, true, false, false, false]);
        let first = classify_gesture(&hand);
        for _ in 0..10 {
            assert_eq!(classify_gesture(&hand), first);
        }
    }

    #[test]
    fn test_degenerate_hand_does_not_panic() {
        // All landmarks collapsed onto one point
        let hand = HandDetection::default();
        assert_eq!(classify_gesture(&hand), Gesture::Fist);
    }

    fn mesh_with_mouth(gap: f32, corner_drop: f32) -> LandmarkSet {
        let mut points = vec![Landmark::default(); 468];
        points[MOUTH_LEFT] = Landmark { x: 0.4, y: 0.6 + corner_drop, z: 0.0 };
        points[MOUTH_RIGHT] = Landmark { x: 0.6, y: 0.6 + corner_drop, z: 0.0 };
        points[LIP_TOP] = Landmark { x: 0.5, y: 0.6 - gap / 2.0, z: 0.0 };
        points[LIP_BOTTOM] = Landmark { x: 0.5, y: 0.6 + gap / 2.0, z: 0.0 };
        LandmarkSet { points }
    }

    #[test]
    fn test_expression_geometry_rules() {
        // Wide-open mouth reads surprised
        assert_eq!(
            classify_expression_from_landmarks(&mesh_with_mouth(0.1, 0.0)),
            Expression::Surprised
        );
        // Raised corners (smaller y) read happy
        assert_eq!(
            classify_expression_from_landmarks(&mesh_with_mouth(0.0, -0.03)),
            Expression::Happy
        );
        // Dropped corners read sad
        assert_eq!(
            classify_expression_from_landmarks(&mesh_with_mouth(0.0, 0.03)),
            Expression::Sad
        );
        // Flat geometry reads neutral
        assert_eq!(
            classify_expression_from_landmarks(&mesh_with_mouth(0.0, 0.0)),
            Expression::Neutral
        );
    }

    #[test]
    fn test_empty_mesh_is_neutral() {
        assert_eq!(
            classify_expression_from_landmarks(&LandmarkSet::default()),
            Expression::Neutral
        );
    }

    #[test]
    fn test_scores_below_gate_read_neutral() {
        let mut scores = [0.0; 7];
        scores[4] = 0.3; // surprised, weakly
        let entry = ExpressionScores {
            bounds: BoundingBox::default(),
            scores,
        };
        assert_eq!(expression_from_scores(&entry, 0.0), Expression::Neutral);
        assert_eq!(expression_from_scores(&entry, 1.0), Expression::Surprised);
    }

    #[test]
    fn test_gesture_labels_drawn() {
        let mut surface = RecordingSurface::new();
        draw_gesture_labels(&[hand_with([true; 5])], 0.5, &mut surface);
        assert!(surface
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::Label(text) if text == "open palm")));
    }
}
