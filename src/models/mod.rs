//! Perception model contracts and detection result types
//!
//! Models are external collaborators: the pipeline only knows the
//! asynchronous `load` / `infer` contracts and the documented shape of
//! each model family's output. Concrete backends (ONNX sessions, remote
//! services, test stubs) live behind the [`ModelProvider`] and
//! [`PerceptionModel`] traits.

mod loader;
mod registry;

pub use loader::ModelLoader;
pub use registry::{ModelEntry, ModelRegistry};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{InferenceError, LoadError};
use crate::frame::Frame;
use crate::governor::QualityLevel;

/// Model families the pipeline knows how to schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelKind {
    /// Face bounding boxes with confidence
    FaceDetector,
    /// Dense facial landmark points
    FaceLandmarker,
    /// Per-face expression scores
    ExpressionNet,
    /// Hand keypoints with handedness
    HandLandmarker,
    /// Person/background segmentation mask
    BodySegmenter,
}

impl ModelKind {
    /// Stable string tag, used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::FaceDetector => "face_detector",
            ModelKind::FaceLandmarker => "face_landmarker",
            ModelKind::ExpressionNet => "expression_net",
            ModelKind::HandLandmarker => "hand_landmarker",
            ModelKind::BodySegmenter => "body_segmenter",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned box in normalized [0,1] frame coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Centre point of the box
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Smallest box containing both inputs
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        BoundingBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

/// A detected face
#[derive(Clone, Copy, Debug, Default)]
pub struct FaceDetection {
    pub bounds: BoundingBox,
    pub confidence: f32,
}

/// A single landmark point in normalized coordinates
#[derive(Clone, Copy, Debug, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Dense landmark set for one face
#[derive(Clone, Debug, Default)]
pub struct LandmarkSet {
    pub points: Vec<Landmark>,
}

impl LandmarkSet {
    /// Landmark at `index`, or `None` when the mesh is smaller than expected
    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    /// Mean position of all points
    pub fn centroid(&self) -> Option<(f32, f32)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f32;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some((sx / n, sy / n))
    }
}

/// Expression labels produced by the expression model family
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Expression {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
}

impl Expression {
    /// All labels, in score-array order
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Surprised,
        Expression::Fearful,
        Expression::Disgusted,
    ];

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Surprised => "surprised",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
        }
    }
}

/// Per-face expression scores, one entry per [`Expression::ALL`] label
#[derive(Clone, Debug)]
pub struct ExpressionScores {
    pub bounds: BoundingBox,
    pub scores: [f32; 7],
}

impl ExpressionScores {
    /// Highest-scoring label and its score
    pub fn top(&self) -> (Expression, f32) {
        let mut best = 0;
        for i in 1..self.scores.len() {
            if self.scores[i] > self.scores[best] {
                best = i;
            }
        }
        (Expression::ALL[best], self.scores[best])
    }
}

/// A detected hand: 21 landmarks plus handedness
#[derive(Clone, Debug)]
pub struct HandDetection {
    /// 21 keypoints in MediaPipe order (wrist first, then per-finger chains)
    pub landmarks: [Landmark; 21],
    pub confidence: f32,
    pub is_right: bool,
}

impl Default for HandDetection {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); 21],
            confidence: 0.0,
            is_right: false,
        }
    }
}

/// Person segmentation mask
///
/// Values are 0.0 = background, 1.0 = person; sampled in normalized
/// coordinates with clamping.
#[derive(Clone, Debug)]
pub struct SegmentationMask {
    pub mask: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl SegmentationMask {
    /// Mask value at normalized coordinates
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let px = (x.clamp(0.0, 1.0) * self.width as f32) as u32;
        let py = (y.clamp(0.0, 1.0) * self.height as f32) as u32;
        let idx = (py.min(self.height - 1) * self.width + px.min(self.width - 1)) as usize;
        self.mask.get(idx).copied().unwrap_or(0.0)
    }
}

/// Model-family-specific inference output
#[derive(Clone, Debug)]
pub enum Detections {
    Faces(Vec<FaceDetection>),
    FaceLandmarks(Vec<LandmarkSet>),
    Expressions(Vec<ExpressionScores>),
    Hands(Vec<HandDetection>),
    Segmentation(SegmentationMask),
}

/// Load-time options derived from the current quality level
#[derive(Clone, Copy, Debug)]
pub struct ModelLoadOptions {
    /// Model input resolution
    pub input_size: (u32, u32),
    /// Quality level the load was requested at
    pub quality: QualityLevel,
}

/// A loaded perception model
///
/// Handles are shared read-only across concurrent inference calls; once a
/// handle is stored in the registry it is never mutated.
#[async_trait]
pub trait PerceptionModel: Send + Sync {
    /// The family this model belongs to
    fn kind(&self) -> ModelKind;

    /// Run detection on one frame
    async fn infer(&self, frame: &Frame) -> Result<Detections, InferenceError>;
}

/// Factory for loading perception models
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Asynchronously initialize a model of the given kind
    async fn load(
        &self,
        kind: ModelKind,
        options: ModelLoadOptions,
    ) -> Result<Arc<dyn PerceptionModel>, LoadError>;
}
