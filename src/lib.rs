//! Vision Effects - real-time AI camera effects pipeline
//!
//! Overlays perception-model-driven visual effects (face and hand
//! detection, background segmentation, style filters, framing) onto a
//! live video feed. The per-frame loop lazily loads the models the
//! enabled features need, runs inference without ever blocking a tick,
//! composites effect passes in a fixed stage order, and adapts its
//! workload to the achieved frame rate.

pub mod catalog;
pub mod compositor;
pub mod config;
pub mod effects;
pub mod error;
pub mod frame;
pub mod governor;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod store;
pub mod surface;
pub mod telemetry;

pub use catalog::{FeatureCatalog, FeatureKind, HostCapabilities, PassStage};
pub use config::PipelineConfig;
pub use error::{InferenceError, LoadError, PipelineError};
pub use frame::{Frame, FrameSource};
pub use governor::{GovernorConfig, QualityGovernor, QualityLevel};
pub use models::{Detections, ModelKind, ModelProvider, PerceptionModel};
pub use pipeline::{Pipeline, PipelineHandle};
pub use store::{FeatureSettings, FeatureState, FeatureStore, LoadStatus};
pub use surface::{Color, PixelSurface, Rect, Surface};
