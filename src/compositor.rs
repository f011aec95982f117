//! Frame compositor
//!
//! The per-tick orchestrator. Each tick either passes through (nothing
//! enabled and loaded) or draws the base frame and runs the effect
//! passes in fixed stage order. Inference runs on spawned tasks with at
//! most one outstanding call per model kind, feeding a latest-result
//! cache that passes consume on the next tick; drawing stays serialized
//! on the single surface the compositor borrows for the tick.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::{FeatureCatalog, FeatureKind, PassStage};
use crate::config::PipelineConfig;
use crate::effects::{adjust, background, classify, framing, mesh, overlay};
use crate::error::InferenceError;
use crate::frame::Frame;
use crate::governor::QualityLevel;
use crate::models::{
    Detections, ExpressionScores, FaceDetection, HandDetection, LandmarkSet, ModelKind,
    ModelRegistry, PerceptionModel, SegmentationMask,
};
use crate::store::SharedStore;
use crate::surface::{BackgroundFill, Color, Surface};

/// Counters exposed through the pipeline handle
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositorStats {
    /// Ticks observed, including pass-through ticks
    pub ticks: u64,
    /// Ticks skipped because no feature was enabled and loaded
    pub idle_ticks: u64,
    /// Effect passes drawn
    pub passes_drawn: u64,
    /// Inference calls issued
    pub inference_issued: u64,
    /// Inference requests dropped because one was already outstanding
    pub inference_dropped: u64,
    /// Render passes that failed and were skipped
    pub renderer_faults: u64,
}

/// Latest-result inference scheduling with per-kind backpressure
///
/// A new request for a kind is dropped while a previous call is still in
/// flight, so overlapping inference never stacks. Results land in a
/// cache keyed by kind; consumers accept one tick of latency.
struct InferenceScheduler {
    in_flight: Arc<Mutex<BTreeSet<ModelKind>>>,
    results: Arc<Mutex<HashMap<ModelKind, Arc<Detections>>>>,
}

impl InferenceScheduler {
    fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(BTreeSet::new())),
            results: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Issue an inference call unless one is already outstanding
    ///
    /// Returns false when the request was dropped. A model failure is
    /// logged and leaves the previous cached result in place.
    fn request(&self, kind: ModelKind, model: Arc<dyn PerceptionModel>, frame: Arc<Frame>) -> bool {
        {
            let mut pending = self.in_flight.lock();
            if pending.contains(&kind) {
                return false;
            }
            pending.insert(kind);
        }

        let in_flight = self.in_flight.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            match model.infer(&frame).await {
                Ok(detections) => {
                    results.lock().insert(kind, Arc::new(detections));
                }
                Err(error) => {
                    tracing::warn!(
                        model = kind.as_str(),
                        frame = frame.frame_number,
                        %error,
                        "inference failed, skipping"
                    );
                }
            }
            in_flight.lock().remove(&kind);
        });
        true
    }

    /// Snapshot of the latest results
    fn snapshot(&self) -> HashMap<ModelKind, Arc<Detections>> {
        self.results.lock().clone()
    }
}

/// Per-tick orchestrator for base draw and effect passes
pub struct FrameCompositor {
    catalog: Arc<FeatureCatalog>,
    store: SharedStore,
    registry: Arc<ModelRegistry>,
    config: Arc<PipelineConfig>,
    scheduler: InferenceScheduler,
    framer: framing::AutoFramer,
    stabilizer: framing::Stabilizer,
    background_fill: BackgroundFill,
    stats: Arc<Mutex<CompositorStats>>,
}

impl FrameCompositor {
    /// Build a compositor over shared pipeline state
    pub fn new(
        catalog: Arc<FeatureCatalog>,
        store: SharedStore,
        registry: Arc<ModelRegistry>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        let background_fill = Self::background_fill(&config);
        Self {
            catalog,
            store,
            registry,
            config,
            scheduler: InferenceScheduler::new(),
            framer: framing::AutoFramer::new(),
            stabilizer: framing::Stabilizer::new(),
            background_fill,
            stats: Arc::new(Mutex::new(CompositorStats::default())),
        }
    }

    fn background_fill(config: &PipelineConfig) -> BackgroundFill {
        let [r, g, b] = config.background.color;
        let fallback = BackgroundFill::Color(Color::rgb(r, g, b));
        match &config.background.image_path {
            None => fallback,
            Some(path) => match background::load_background_image(path) {
                Ok(image) => BackgroundFill::Image(image),
                Err(error) => {
                    tracing::warn!(%error, "background image unavailable, using flat color");
                    fallback
                }
            },
        }
    }

    /// Shared stats handle for the control surface
    pub fn stats_handle(&self) -> Arc<Mutex<CompositorStats>> {
        self.stats.clone()
    }

    /// Run one tick against the given surface
    ///
    /// Must be called from within a tokio runtime: inference is spawned
    /// onto background tasks and never blocks the tick.
    pub fn tick(&mut self, frame: &Arc<Frame>, quality: QualityLevel, surface: &mut dyn Surface) {
        let active: Vec<(FeatureKind, f32)> = {
            let store = self.store.read();
            FeatureKind::ALL
                .into_iter()
                .filter(|kind| store.is_active(*kind))
                .map(|kind| (kind, store.state(kind).sensitivity))
                .collect()
        };

        let mut stats = *self.stats.lock();
        stats.ticks += 1;

        // Pass-through: the unmodified source is already visible, so an
        // idle tick draws nothing at all.
        if active.is_empty() {
            stats.idle_ticks += 1;
            *self.stats.lock() = stats;
            return;
        }

        // Kick off detection for every model the active features need.
        // Independent kinds run concurrently; same-kind calls never stack.
        let required: BTreeSet<ModelKind> = active
            .iter()
            .flat_map(|(kind, _)| self.catalog.spec(*kind).models.iter().copied())
            .collect();
        for kind in required {
            if let Some(entry) = self.registry.get(kind) {
                if self.scheduler.request(kind, entry.model, frame.clone()) {
                    stats.inference_issued += 1;
                } else {
                    stats.inference_dropped += 1;
                }
            }
        }

        let results = self.scheduler.snapshot();
        surface.draw_frame(frame);

        let budget = self.config.pass_budget(quality);
        let mut drawn = 0usize;
        'stages: for stage in PassStage::ORDER {
            for (kind, sensitivity) in &active {
                if self.catalog.spec(*kind).stage != stage {
                    continue;
                }
                if drawn >= budget {
                    tracing::debug!(budget, "effect pass budget exhausted");
                    break 'stages;
                }
                // A feature disabled after its inference was issued must
                // not draw from the stale result.
                if !self.store.read().state(*kind).enabled {
                    continue;
                }
                match self.render_pass(*kind, *sensitivity, &results, frame, surface) {
                    Ok(true) => drawn += 1,
                    Ok(false) => {}
                    Err(error) => {
                        stats.renderer_faults += 1;
                        tracing::warn!(feature = kind.as_str(), %error, "effect pass failed");
                    }
                }
            }
        }

        stats.passes_drawn += drawn as u64;
        *self.stats.lock() = stats;
    }

    /// Run one effect pass; `Ok(false)` means no data to draw yet
    fn render_pass(
        &mut self,
        kind: FeatureKind,
        sensitivity: f32,
        results: &HashMap<ModelKind, Arc<Detections>>,
        frame: &Arc<Frame>,
        surface: &mut dyn Surface,
    ) -> Result<bool, InferenceError> {
        match kind {
            FeatureKind::ColorAdjust => {
                adjust::apply_color_adjust(sensitivity, surface);
                Ok(true)
            }
            FeatureKind::BackgroundBlur => match segmentation(results)? {
                Some(mask) => {
                    background::blur_background(mask, sensitivity, surface);
                    Ok(true)
                }
                None => Ok(false),
            },
            FeatureKind::BackgroundReplace => match segmentation(results)? {
                Some(mask) => {
                    background::replace_background(mask, &self.background_fill, surface);
                    Ok(true)
                }
                None => Ok(false),
            },
            FeatureKind::FaceDetection => match faces(results)? {
                Some(list) => {
                    overlay::draw_face_boxes(list, sensitivity, surface);
                    Ok(true)
                }
                None => Ok(false),
            },
            FeatureKind::FaceLandmarks => match landmarks(results)? {
                Some(sets) => {
                    mesh::draw_landmark_mesh(sets, sensitivity, surface);
                    Ok(true)
                }
                None => Ok(false),
            },
            FeatureKind::ExpressionDetection => {
                let scores = expressions(results)?.unwrap_or(&[]);
                let sets = landmarks(results)?.unwrap_or(&[]);
                if scores.is_empty() && sets.is_empty() {
                    return Ok(false);
                }
                classify::draw_expression_labels(scores, sets, sensitivity, surface);
                Ok(true)
            }
            FeatureKind::HandTracking => match hands(results)? {
                Some(list) => {
                    overlay::draw_hand_keypoints(list, sensitivity, surface);
                    Ok(true)
                }
                None => Ok(false),
            },
            FeatureKind::GestureRecognition => match hands(results)? {
                Some(list) => {
                    classify::draw_gesture_labels(list, sensitivity, surface);
                    Ok(true)
                }
                None => Ok(false),
            },
            FeatureKind::AutoFraming => match faces(results)? {
                Some(list) => {
                    self.framer.draw(list, sensitivity, surface);
                    Ok(true)
                }
                None => Ok(false),
            },
            FeatureKind::Stabilization => {
                self.stabilizer.draw(frame, sensitivity, surface);
                Ok(true)
            }
            FeatureKind::StyleFilter => {
                adjust::apply_style_filter(self.config.style_preset, sensitivity, surface);
                Ok(true)
            }
        }
    }
}

fn wrong_shape(kind: ModelKind) -> InferenceError {
    InferenceError(format!("unexpected result shape from {kind}"))
}

fn faces(
    results: &HashMap<ModelKind, Arc<Detections>>,
) -> Result<Option<&[FaceDetection]>, InferenceError> {
    match results.get(&ModelKind::FaceDetector).map(Arc::as_ref) {
        None => Ok(None),
        Some(Detections::Faces(list)) => Ok(Some(list)),
        Some(_) => Err(wrong_shape(ModelKind::FaceDetector)),
    }
}

fn landmarks(
    results: &HashMap<ModelKind, Arc<Detections>>,
) -> Result<Option<&[LandmarkSet]>, InferenceError> {
    match results.get(&ModelKind::FaceLandmarker).map(Arc::as_ref) {
        None => Ok(None),
        Some(Detections::FaceLandmarks(sets)) => Ok(Some(sets)),
        Some(_) => Err(wrong_shape(ModelKind::FaceLandmarker)),
    }
}

fn expressions(
    results: &HashMap<ModelKind, Arc<Detections>>,
) -> Result<Option<&[ExpressionScores]>, InferenceError> {
    match results.get(&ModelKind::ExpressionNet).map(Arc::as_ref) {
        None => Ok(None),
        Some(Detections::Expressions(scores)) => Ok(Some(scores)),
        Some(_) => Err(wrong_shape(ModelKind::ExpressionNet)),
    }
}

fn hands(
    results: &HashMap<ModelKind, Arc<Detections>>,
) -> Result<Option<&[HandDetection]>, InferenceError> {
    match results.get(&ModelKind::HandLandmarker).map(Arc::as_ref) {
        None => Ok(None),
        Some(Detections::Hands(list)) => Ok(Some(list)),
        Some(_) => Err(wrong_shape(ModelKind::HandLandmarker)),
    }
}

fn segmentation(
    results: &HashMap<ModelKind, Arc<Detections>>,
) -> Result<Option<&SegmentationMask>, InferenceError> {
    match results.get(&ModelKind::BodySegmenter).map(Arc::as_ref) {
        None => Ok(None),
        Some(Detections::Segmentation(mask)) => Ok(Some(mask)),
        Some(_) => Err(wrong_shape(ModelKind::BodySegmenter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HostCapabilities;
    use crate::models::{BoundingBox, ModelEntry};
    use crate::store::{self, LoadStatus};
    use crate::surface::recording::{DrawOp, RecordingSurface};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Model returning a fixed detection, optionally gated or failing
    struct FixedModel {
        kind: ModelKind,
        output: Option<Detections>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl FixedModel {
        fn new(kind: ModelKind, output: Detections) -> Arc<Self> {
            Arc::new(Self {
                kind,
                output: Some(output),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn failing(kind: ModelKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                output: None,
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn gated(kind: ModelKind, output: Detections, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                output: Some(output),
                calls: AtomicUsize::new(0),
                gate: Some(gate),
            })
        }
    }

    #[async_trait]
    impl PerceptionModel for FixedModel {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        async fn infer(&self, _frame: &Frame) -> Result<Detections, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.output
                .clone()
                .ok_or_else(|| InferenceError("injected failure".into()))
        }
    }

    fn sample_faces() -> Detections {
        Detections::Faces(vec![FaceDetection {
            bounds: BoundingBox {
                x: 0.3,
                y: 0.3,
                width: 0.2,
                height: 0.2,
            },
            confidence: 0.95,
        }])
    }

    fn sample_mask() -> Detections {
        Detections::Segmentation(SegmentationMask {
            mask: vec![1.0, 0.0, 1.0, 0.0],
            width: 2,
            height: 2,
        })
    }

    struct Rig {
        compositor: FrameCompositor,
        store: SharedStore,
        registry: Arc<ModelRegistry>,
        frame: Arc<Frame>,
    }

    fn rig() -> Rig {
        rig_with_config(PipelineConfig::default())
    }

    fn rig_with_config(config: PipelineConfig) -> Rig {
        let catalog = Arc::new(FeatureCatalog::builtin());
        let store = store::shared_store(catalog.clone(), HostCapabilities::full());
        let registry = Arc::new(ModelRegistry::new());
        let compositor = FrameCompositor::new(
            catalog,
            store.clone(),
            registry.clone(),
            Arc::new(config),
        );
        Rig {
            compositor,
            store,
            registry,
            frame: Arc::new(Frame::blank(64, 48)),
        }
    }

    impl Rig {
        fn install(&self, model: Arc<FixedModel>) {
            self.registry.insert(
                model.kind,
                ModelEntry {
                    model: model.clone(),
                    quality: QualityLevel::Medium,
                },
            );
        }

        fn activate(&self, kind: FeatureKind) {
            let mut store = self.store.write();
            store.toggle(kind).unwrap();
            for dep in crate::resolver::dependency_closure(
                &FeatureCatalog::builtin(),
                kind,
            ) {
                store.set_load_status(dep, LoadStatus::Loaded, None);
            }
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_idle_tick_is_pass_through() {
        let mut rig = rig();
        let mut surface = RecordingSurface::new();
        let frame = rig.frame.clone();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);

        assert!(surface.ops.is_empty());
        let stats = *rig.compositor.stats_handle().lock();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.idle_ticks, 1);
    }

    #[tokio::test]
    async fn test_enabled_but_unloaded_feature_stays_idle() {
        let mut rig = rig();
        rig.store.write().toggle(FeatureKind::FaceDetection).unwrap();

        let mut surface = RecordingSurface::new();
        let frame = rig.frame.clone();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);
        assert!(surface.ops.is_empty());
    }

    #[tokio::test]
    async fn test_background_pass_precedes_overlay_pass() {
        let mut rig = rig();
        rig.install(FixedModel::new(ModelKind::BodySegmenter, sample_mask()));
        rig.install(FixedModel::new(ModelKind::FaceDetector, sample_faces()));
        rig.activate(FeatureKind::BackgroundBlur);
        rig.activate(FeatureKind::FaceDetection);

        let frame = rig.frame.clone();
        // First tick issues inference; results land for the second
        let mut warmup = RecordingSurface::new();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut warmup);
        settle().await;

        let mut surface = RecordingSurface::new();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);

        let base = surface.op_index(|op| matches!(op, DrawOp::Frame(_))).unwrap();
        let blur = surface
            .op_index(|op| matches!(op, DrawOp::BlurBackground(_)))
            .expect("background pass should draw");
        let box_overlay = surface
            .op_index(|op| matches!(op, DrawOp::StrokeRect))
            .expect("face overlay should draw");
        assert!(base < blur);
        assert!(blur < box_overlay);
    }

    #[tokio::test]
    async fn test_no_duplicate_outstanding_inference() {
        let mut rig = rig();
        let gate = Arc::new(Notify::new());
        let model = FixedModel::gated(ModelKind::FaceDetector, sample_faces(), gate.clone());
        rig.install(model.clone());
        rig.activate(FeatureKind::FaceDetection);

        let frame = rig.frame.clone();
        let mut surface = RecordingSurface::new();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);
        settle().await;
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);
        settle().await;

        // Second tick's request was dropped, not stacked
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let stats = *rig.compositor.stats_handle().lock();
        assert_eq!(stats.inference_issued, 1);
        assert_eq!(stats.inference_dropped, 1);

        gate.notify_waiters();
        settle().await;
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);
        settle().await;
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inference_fault_does_not_block_other_passes() {
        let mut rig = rig();
        let failing = FixedModel::failing(ModelKind::FaceDetector);
        rig.install(failing.clone());
        rig.install(FixedModel::new(ModelKind::BodySegmenter, sample_mask()));
        rig.activate(FeatureKind::FaceDetection);
        rig.activate(FeatureKind::BackgroundBlur);

        let frame = rig.frame.clone();
        let mut surface = RecordingSurface::new();
        for _ in 0..3 {
            rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);
            settle().await;
        }

        // The healthy feature rendered; the failing one was retried,
        // never cached a result, and never aborted the loop
        assert!(surface
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::BlurBackground(_))));
        assert!(!surface.ops.iter().any(|op| matches!(op, DrawOp::StrokeRect)));
        assert!(failing.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_disabled_feature_stops_drawing_despite_cached_result() {
        let mut rig = rig();
        rig.install(FixedModel::new(ModelKind::FaceDetector, sample_faces()));
        rig.activate(FeatureKind::FaceDetection);

        let frame = rig.frame.clone();
        let mut surface = RecordingSurface::new();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);
        settle().await;

        // Result is cached now; disabling must stop the overlay anyway
        rig.store.write().toggle(FeatureKind::FaceDetection).unwrap();
        let mut after = RecordingSurface::new();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut after);
        assert!(!after.ops.iter().any(|op| matches!(op, DrawOp::StrokeRect)));
    }

    #[tokio::test]
    async fn test_pass_budget_bounds_effect_count() {
        let mut config = PipelineConfig::default();
        config.low.pass_budget = 1;
        let mut rig = rig_with_config(config);
        rig.activate(FeatureKind::ColorAdjust);
        rig.activate(FeatureKind::Stabilization);

        let frame = rig.frame.clone();
        let mut surface = RecordingSurface::new();
        rig.compositor.tick(&frame, QualityLevel::Low, &mut surface);

        let stats = *rig.compositor.stats_handle().lock();
        assert_eq!(stats.passes_drawn, 1);
    }

    #[tokio::test]
    async fn test_wrong_result_shape_is_isolated_fault() {
        let mut rig = rig();
        // Face detector misbehaves and returns a segmentation mask
        rig.install(FixedModel::new(ModelKind::FaceDetector, sample_mask()));
        rig.activate(FeatureKind::FaceDetection);
        rig.activate(FeatureKind::Stabilization);

        let frame = rig.frame.clone();
        let mut surface = RecordingSurface::new();
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);
        settle().await;
        rig.compositor.tick(&frame, QualityLevel::Medium, &mut surface);

        let stats = *rig.compositor.stats_handle().lock();
        assert_eq!(stats.renderer_faults, 1);
        // The stabilization pass still ran this tick
        assert!(surface
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::Polyline(_))));
    }
}
