//! Pipeline assembly and the tick scheduler
//!
//! Wires the store, loader, governor, and compositor together and drives
//! them from an explicit, cancellable repeating task. The loop itself
//! never blocks: model loads and inference calls are the suspension
//! points, running on their own tasks, and the loop re-schedules every
//! tick regardless of whether prior work finished.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::catalog::{FeatureCatalog, FeatureKind, HostCapabilities};
use crate::compositor::{CompositorStats, FrameCompositor};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::frame::FrameSource;
use crate::governor::{QualityGovernor, QualityLevel};
use crate::models::{ModelKind, ModelLoader, ModelProvider, ModelRegistry};
use crate::store::{self, FeatureSettings, FeatureState, SharedStore};
use crate::surface::Surface;

/// A fully wired effects pipeline for one frame source
pub struct Pipeline {
    store: SharedStore,
    registry: Arc<ModelRegistry>,
    loader: ModelLoader,
    governor: Arc<Mutex<QualityGovernor>>,
    config: Arc<PipelineConfig>,
    compositor: FrameCompositor,
    source: Arc<dyn FrameSource>,
}

impl Pipeline {
    /// Assemble a pipeline over a frame source and model provider
    pub fn new(
        source: Arc<dyn FrameSource>,
        provider: Arc<dyn ModelProvider>,
        config: PipelineConfig,
        caps: HostCapabilities,
    ) -> Self {
        let catalog = Arc::new(FeatureCatalog::builtin());
        let config = Arc::new(config);
        let store = store::shared_store(catalog.clone(), caps);
        let registry = Arc::new(ModelRegistry::new());
        let loader = ModelLoader::new(
            provider,
            registry.clone(),
            catalog.clone(),
            store.clone(),
            config.clone(),
        );
        let governor = Arc::new(Mutex::new(QualityGovernor::new(config.governor)));
        let compositor =
            FrameCompositor::new(catalog, store.clone(), registry.clone(), config.clone());

        Self {
            store,
            registry,
            loader,
            governor,
            config,
            compositor,
            source,
        }
    }

    /// Shared feature store (control surfaces, tests)
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Toggle a feature
    pub fn toggle(&self, kind: FeatureKind) -> Result<bool, PipelineError> {
        self.store.write().toggle(kind)
    }

    /// Adjust a feature's sensitivity
    pub fn set_sensitivity(&self, kind: FeatureKind, sensitivity: f32) {
        self.store.write().update_settings(
            kind,
            FeatureSettings {
                sensitivity: Some(sensitivity),
            },
        );
    }

    /// Pin or release the quality level
    pub fn set_quality_override(&self, level: Option<QualityLevel>) {
        self.governor.lock().set_override(level);
    }

    /// Snapshot of the compositor counters
    pub fn stats(&self) -> CompositorStats {
        *self.compositor.stats_handle().lock()
    }

    /// Run one tick: reconcile models, compose one frame, sample timing
    ///
    /// Must be called from within a tokio runtime.
    pub fn tick_once(&mut self, surface: &mut dyn Surface) {
        let enabled = self.store.read().enabled_kinds();
        let quality = self.governor.lock().effective_level();
        self.loader.ensure_loaded(&enabled, quality);

        if let Some(frame) = self.source.latest_frame() {
            self.compositor.tick(&frame, quality, surface);
            self.governor.lock().on_frame(Instant::now());
        }
    }

    /// Spawn the repeating tick loop, consuming the pipeline
    ///
    /// The returned handle controls the running pipeline and shuts it
    /// down; teardown cancels the loop and releases all model handles.
    pub fn run<S>(mut self, mut surface: S) -> PipelineHandle
    where
        S: Surface + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = PipelineHandle {
            store: self.store.clone(),
            governor: self.governor.clone(),
            registry: self.registry.clone(),
            loader: self.loader.clone(),
            stats: self.compositor.stats_handle(),
            shutdown: shutdown_tx,
            task: None,
        };

        let period = Duration::from_secs_f64(1.0 / self.config.tick_hz.max(1) as f64);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(tick_hz = self.config.tick_hz, "pipeline started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => self.tick_once(&mut surface),
                }
            }

            self.registry.clear();
            tracing::info!("pipeline stopped, model handles released");
        });

        PipelineHandle {
            task: Some(task),
            ..handle
        }
    }
}

/// Control surface for a running pipeline
pub struct PipelineHandle {
    store: SharedStore,
    governor: Arc<Mutex<QualityGovernor>>,
    registry: Arc<ModelRegistry>,
    loader: ModelLoader,
    stats: Arc<Mutex<CompositorStats>>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Toggle a feature by kind
    pub fn toggle(&self, kind: FeatureKind) -> Result<bool, PipelineError> {
        self.store.write().toggle(kind)
    }

    /// Toggle a feature by its string key
    pub fn toggle_by_key(&self, key: &str) -> Result<bool, PipelineError> {
        self.store.write().toggle_by_key(key)
    }

    /// Adjust a feature's sensitivity in [0,1]
    pub fn set_sensitivity(&self, kind: FeatureKind, sensitivity: f32) {
        self.store.write().update_settings(
            kind,
            FeatureSettings {
                sensitivity: Some(sensitivity),
            },
        );
    }

    /// Pin the quality level, or `None` to resume automatic governing
    pub fn set_quality_override(&self, level: Option<QualityLevel>) {
        self.governor.lock().set_override(level);
    }

    /// Quality level currently in effect
    pub fn quality(&self) -> QualityLevel {
        self.governor.lock().effective_level()
    }

    /// Current state of one feature
    pub fn feature_state(&self, kind: FeatureKind) -> FeatureState {
        self.store.read().state(kind).clone()
    }

    /// Snapshot of the compositor counters
    pub fn stats(&self) -> CompositorStats {
        *self.stats.lock()
    }

    /// Model kinds with live handles
    pub fn loaded_models(&self) -> Vec<ModelKind> {
        self.registry.loaded_kinds()
    }

    /// Retry model loads that previously failed
    pub fn retry_failed_loads(&self) {
        self.loader.reset_failures();
    }

    /// Stop the tick loop and wait for teardown
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}
