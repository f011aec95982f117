//! Vision Effects - demo entry point
//!
//! Runs the full pipeline against the synthetic test pattern source with
//! stub perception models, so the whole loop (lazy loading, inference
//! scheduling, compositing, quality governing) can be exercised without
//! a camera or model files. Ctrl-C shuts the pipeline down cleanly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use rand::Rng;

use vision_effects::catalog::HostCapabilities;
use vision_effects::error::{InferenceError, LoadError};
use vision_effects::frame::{Frame, TestPatternSource};
use vision_effects::models::{
    BoundingBox, Detections, ExpressionScores, FaceDetection, Landmark, LandmarkSet, ModelKind,
    ModelLoadOptions, ModelProvider, PerceptionModel, SegmentationMask,
};
use vision_effects::pipeline::Pipeline;
use vision_effects::surface::PixelSurface;
use vision_effects::{telemetry, FeatureKind, PipelineConfig};

const SURFACE_WIDTH: u32 = 640;
const SURFACE_HEIGHT: u32 = 480;
const BRIGHT_LUMA: f32 = 170.0;

/// Stub models that track the bright disc in the test pattern
struct DemoModel {
    kind: ModelKind,
    input_size: (u32, u32),
}

impl DemoModel {
    /// Bounding box of bright pixels in the downscaled frame
    fn bright_bounds(&self, frame: &Frame) -> Option<BoundingBox> {
        let probe = frame.downscale(self.input_size.0, self.input_size.1);
        let (w, h) = (probe.width, probe.height);
        let mut min = (u32::MAX, u32::MAX);
        let mut max = (0u32, 0u32);
        for y in 0..h {
            for x in 0..w {
                let px = probe.pixel(x, y);
                let luma =
                    0.2126 * px[0] as f32 + 0.7152 * px[1] as f32 + 0.0722 * px[2] as f32;
                if luma > BRIGHT_LUMA {
                    min = (min.0.min(x), min.1.min(y));
                    max = (max.0.max(x), max.1.max(y));
                }
            }
        }
        if min.0 == u32::MAX {
            return None;
        }
        Some(BoundingBox {
            x: min.0 as f32 / w as f32,
            y: min.1 as f32 / h as f32,
            width: (max.0 - min.0 + 1) as f32 / w as f32,
            height: (max.1 - min.1 + 1) as f32 / h as f32,
        })
    }

    fn landmarks_for(bounds: &BoundingBox) -> LandmarkSet {
        let (cx, cy) = bounds.center();
        let r = bounds.width.min(bounds.height) * 0.4;
        let points = (0..468)
            .map(|i| {
                let angle = i as f32 * 0.0134 * std::f32::consts::TAU;
                let reach = r * (0.4 + 0.6 * ((i % 7) as f32 / 7.0));
                Landmark {
                    x: (cx + angle.cos() * reach).clamp(0.0, 1.0),
                    y: (cy + angle.sin() * reach).clamp(0.0, 1.0),
                    z: 0.0,
                }
            })
            .collect();
        LandmarkSet { points }
    }
}

#[async_trait]
impl PerceptionModel for DemoModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    async fn infer(&self, frame: &Frame) -> Result<Detections, InferenceError> {
        let bounds = self.bright_bounds(frame);
        let confidence = rand::rng().random_range(0.85..0.99);

        Ok(match self.kind {
            ModelKind::FaceDetector => Detections::Faces(
                bounds
                    .map(|bounds| FaceDetection { bounds, confidence })
                    .into_iter()
                    .collect(),
            ),
            ModelKind::FaceLandmarker => Detections::FaceLandmarks(
                bounds.map(|b| Self::landmarks_for(&b)).into_iter().collect(),
            ),
            ModelKind::ExpressionNet => Detections::Expressions(
                bounds
                    .map(|bounds| {
                        let mut scores = [0.0f32; 7];
                        // The disc drifts through moods as it orbits
                        let slot = (frame.frame_number / 90 % 3) as usize;
                        scores[[1, 0, 4][slot]] = confidence;
                        ExpressionScores { bounds, scores }
                    })
                    .into_iter()
                    .collect(),
            ),
            ModelKind::HandLandmarker => Detections::Hands(Vec::new()),
            ModelKind::BodySegmenter => {
                let probe = frame.downscale(self.input_size.0, self.input_size.1);
                let (w, h) = (probe.width, probe.height);
                let mut mask = vec![0.0f32; (w * h) as usize];
                for y in 0..h {
                    for x in 0..w {
                        let px = probe.pixel(x, y);
                        let luma = 0.2126 * px[0] as f32
                            + 0.7152 * px[1] as f32
                            + 0.0722 * px[2] as f32;
                        if luma > BRIGHT_LUMA {
                            mask[(y * w + x) as usize] = 1.0;
                        }
                    }
                }
                Detections::Segmentation(SegmentationMask {
                    mask,
                    width: w,
                    height: h,
                })
            }
        })
    }
}

/// Provider that builds demo models after a short simulated init
struct DemoProvider;

#[async_trait]
impl ModelProvider for DemoProvider {
    async fn load(
        &self,
        kind: ModelKind,
        options: ModelLoadOptions,
    ) -> Result<Arc<dyn PerceptionModel>, LoadError> {
        // Simulated initialization latency
        tokio::time::sleep(Duration::from_millis(150)).await;
        Ok(Arc::new(DemoModel {
            kind,
            input_size: options.input_size,
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = telemetry::init_default().map_err(|e| anyhow!("{e}"))?;
    tracing::info!("Vision Effects demo starting");

    let source = Arc::new(TestPatternSource::new(SURFACE_WIDTH, SURFACE_HEIGHT));
    let pipeline = Pipeline::new(
        source,
        Arc::new(DemoProvider),
        PipelineConfig::default(),
        HostCapabilities::detect(),
    );

    for feature in [
        FeatureKind::ExpressionDetection,
        FeatureKind::BackgroundBlur,
        FeatureKind::Stabilization,
    ] {
        if let Err(error) = pipeline.toggle(feature) {
            tracing::warn!(%error, "feature unavailable");
        }
    }

    let handle = pipeline.run(PixelSurface::new(SURFACE_WIDTH, SURFACE_HEIGHT));
    tracing::info!("pipeline running, Ctrl-C to stop");

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let stats = handle.stats();
                tracing::info!(
                    ticks = stats.ticks,
                    passes = stats.passes_drawn,
                    inference = stats.inference_issued,
                    dropped = stats.inference_dropped,
                    faults = stats.renderer_faults,
                    quality = handle.quality().name(),
                    "pipeline stats"
                );
            }
        }
    }

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
