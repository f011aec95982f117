//! Static feature catalog
//!
//! Declares every toggle-able feature: its hard dependencies on other
//! features, the model kinds it needs, which compositing stage its
//! renderer runs in, and any host capability it refuses to run without.
//! The catalog is data; the resolver and store consume it so the
//! dependency cascade never lives in scattered conditionals.

use crate::models::ModelKind;

/// Identity of a toggle-able visual feature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureKind {
    FaceDetection,
    FaceLandmarks,
    ExpressionDetection,
    HandTracking,
    GestureRecognition,
    BackgroundBlur,
    BackgroundReplace,
    ColorAdjust,
    StyleFilter,
    AutoFraming,
    Stabilization,
}

impl FeatureKind {
    /// All features in declared draw order (order within a stage)
    pub const ALL: [FeatureKind; 11] = [
        FeatureKind::ColorAdjust,
        FeatureKind::BackgroundBlur,
        FeatureKind::BackgroundReplace,
        FeatureKind::FaceDetection,
        FeatureKind::FaceLandmarks,
        FeatureKind::ExpressionDetection,
        FeatureKind::HandTracking,
        FeatureKind::GestureRecognition,
        FeatureKind::AutoFraming,
        FeatureKind::Stabilization,
        FeatureKind::StyleFilter,
    ];

    /// Stable string key
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::FaceDetection => "face_detection",
            FeatureKind::FaceLandmarks => "face_landmarks",
            FeatureKind::ExpressionDetection => "expression_detection",
            FeatureKind::HandTracking => "hand_tracking",
            FeatureKind::GestureRecognition => "gesture_recognition",
            FeatureKind::BackgroundBlur => "background_blur",
            FeatureKind::BackgroundReplace => "background_replace",
            FeatureKind::ColorAdjust => "color_adjust",
            FeatureKind::StyleFilter => "style_filter",
            FeatureKind::AutoFraming => "auto_framing",
            FeatureKind::Stabilization => "stabilization",
        }
    }

    /// Parse a string key back to a feature
    pub fn from_key(key: &str) -> Option<FeatureKind> {
        FeatureKind::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compositing stage, in fixed execution order
///
/// Background-replacing passes run before overlay passes so overlays are
/// not erased by a full-canvas redraw; style filters transform the final
/// composited image and therefore run last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassStage {
    /// Whole-frame color/lighting adjustments
    FrameAdjust,
    /// Segmentation-driven background effects
    Background,
    /// Face/hand geometry overlays
    Overlay,
    /// Framing and stabilization indicators
    Framing,
    /// Whole-frame style filters, applied last
    Style,
}

impl PassStage {
    /// Stages in execution order
    pub const ORDER: [PassStage; 5] = [
        PassStage::FrameAdjust,
        PassStage::Background,
        PassStage::Overlay,
        PassStage::Framing,
        PassStage::Style,
    ];
}

/// Capabilities of the host the pipeline runs on
#[derive(Clone, Copy, Debug)]
pub struct HostCapabilities {
    /// GPU-accelerated filtering available
    pub gpu_acceleration: bool,
    /// Usable worker threads
    pub cpu_threads: usize,
}

impl HostCapabilities {
    /// Probe the current host
    pub fn detect() -> Self {
        Self {
            gpu_acceleration: true,
            cpu_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Capabilities with everything available (tests, benchmarks)
    pub fn full() -> Self {
        Self {
            gpu_acceleration: true,
            cpu_threads: 8,
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::detect()
    }
}

/// Static declaration of one feature
#[derive(Clone, Copy, Debug)]
pub struct FeatureSpec {
    pub kind: FeatureKind,
    /// Display label
    pub label: &'static str,
    /// Hard dependencies, auto-enabled when this feature turns on
    pub requires: &'static [FeatureKind],
    /// Model kinds this feature's renderer consumes (may be empty)
    pub models: &'static [ModelKind],
    /// Compositing stage the renderer runs in
    pub stage: PassStage,
    /// Refuses to enable without GPU acceleration
    pub needs_gpu: bool,
}

const SPECS: [FeatureSpec; 11] = [
    FeatureSpec {
        kind: FeatureKind::ColorAdjust,
        label: "Color Adjust",
        requires: &[],
        models: &[],
        stage: PassStage::FrameAdjust,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::BackgroundBlur,
        label: "Background Blur",
        requires: &[],
        models: &[ModelKind::BodySegmenter],
        stage: PassStage::Background,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::BackgroundReplace,
        label: "Background Replace",
        requires: &[],
        models: &[ModelKind::BodySegmenter],
        stage: PassStage::Background,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::FaceDetection,
        label: "Face Detection",
        requires: &[],
        models: &[ModelKind::FaceDetector],
        stage: PassStage::Overlay,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::FaceLandmarks,
        label: "Face Landmarks",
        requires: &[FeatureKind::FaceDetection],
        models: &[ModelKind::FaceLandmarker],
        stage: PassStage::Overlay,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::ExpressionDetection,
        label: "Expression Detection",
        requires: &[FeatureKind::FaceLandmarks],
        models: &[ModelKind::ExpressionNet],
        stage: PassStage::Overlay,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::HandTracking,
        label: "Hand Tracking",
        requires: &[],
        models: &[ModelKind::HandLandmarker],
        stage: PassStage::Overlay,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::GestureRecognition,
        label: "Gesture Recognition",
        requires: &[FeatureKind::HandTracking],
        models: &[ModelKind::HandLandmarker],
        stage: PassStage::Overlay,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::AutoFraming,
        label: "Auto Framing",
        requires: &[FeatureKind::FaceDetection],
        models: &[ModelKind::FaceDetector],
        stage: PassStage::Framing,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::Stabilization,
        label: "Stabilization",
        requires: &[],
        models: &[],
        stage: PassStage::Framing,
        needs_gpu: false,
    },
    FeatureSpec {
        kind: FeatureKind::StyleFilter,
        label: "Style Filter",
        requires: &[],
        models: &[],
        stage: PassStage::Style,
        needs_gpu: true,
    },
];

/// The set of features this build knows about
pub struct FeatureCatalog {
    specs: &'static [FeatureSpec],
}

impl FeatureCatalog {
    /// Catalog with the built-in feature set
    pub fn builtin() -> Self {
        Self { specs: &SPECS }
    }

    /// Spec for one feature
    pub fn spec(&self, kind: FeatureKind) -> &FeatureSpec {
        self.specs
            .iter()
            .find(|s| s.kind == kind)
            .expect("every FeatureKind has a catalog entry")
    }

    /// All specs in declared draw order
    pub fn specs(&self) -> impl Iterator<Item = &FeatureSpec> {
        FeatureKind::ALL.iter().map(|k| self.spec(*k))
    }

    /// Features whose model set includes `kind`
    pub fn features_requiring_model(&self, kind: ModelKind) -> Vec<FeatureKind> {
        self.specs
            .iter()
            .filter(|s| s.models.contains(&kind))
            .map(|s| s.kind)
            .collect()
    }
}

impl Default for FeatureCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_spec() {
        let catalog = FeatureCatalog::builtin();
        for kind in FeatureKind::ALL {
            assert_eq!(catalog.spec(kind).kind, kind);
        }
    }

    #[test]
    fn test_dependency_depth_at_most_two() {
        let catalog = FeatureCatalog::builtin();
        for spec in catalog.specs() {
            for dep in spec.requires {
                for grand in catalog.spec(*dep).requires {
                    assert!(
                        catalog.spec(*grand).requires.is_empty(),
                        "{} exceeds dependency depth 2",
                        spec.kind
                    );
                }
            }
        }
    }

    #[test]
    fn test_key_round_trip() {
        for kind in FeatureKind::ALL {
            assert_eq!(FeatureKind::from_key(kind.as_str()), Some(kind));
        }
        assert_eq!(FeatureKind::from_key("bogus"), None);
    }

    #[test]
    fn test_model_reverse_lookup() {
        let catalog = FeatureCatalog::builtin();
        let users = catalog.features_requiring_model(ModelKind::HandLandmarker);
        assert!(users.contains(&FeatureKind::HandTracking));
        assert!(users.contains(&FeatureKind::GestureRecognition));
    }
}
