//! Feature state store
//!
//! Holds the per-feature enabled flag, sensitivity, and load status. The
//! store is an explicit object handed to the loader and compositor by
//! reference, so multiple pipelines can coexist in one process and tests
//! can build as many stores as they need.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{FeatureCatalog, FeatureKind, HostCapabilities};
use crate::error::PipelineError;
use crate::resolver;

/// Load lifecycle of a feature's model requirements
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Error,
}

/// Mutable state for one feature
#[derive(Clone, Debug)]
pub struct FeatureState {
    /// User-facing toggle
    pub enabled: bool,
    /// Effect strength / detection threshold control, 0.0-1.0
    pub sensitivity: f32,
    /// Load status, mutated only by the model loader
    pub load: LoadStatus,
    /// Failure detail when `load == Error`
    pub error: Option<String>,
}

impl Default for FeatureState {
    fn default() -> Self {
        Self {
            enabled: false,
            sensitivity: 0.5,
            load: LoadStatus::Unloaded,
            error: None,
        }
    }
}

/// Partial settings update, merged field by field
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureSettings {
    pub sensitivity: Option<f32>,
}

/// Per-feature state for one pipeline instance
pub struct FeatureStore {
    catalog: Arc<FeatureCatalog>,
    caps: HostCapabilities,
    states: HashMap<FeatureKind, FeatureState>,
}

impl FeatureStore {
    /// Create a store with every catalog feature disabled
    pub fn new(catalog: Arc<FeatureCatalog>, caps: HostCapabilities) -> Self {
        let states = FeatureKind::ALL
            .into_iter()
            .map(|kind| (kind, FeatureState::default()))
            .collect();
        Self {
            catalog,
            caps,
            states,
        }
    }

    /// Current state of a feature
    pub fn state(&self, kind: FeatureKind) -> &FeatureState {
        &self.states[&kind]
    }

    /// Whether the feature should render this tick
    pub fn is_active(&self, kind: FeatureKind) -> bool {
        let state = &self.states[&kind];
        state.enabled && state.load == LoadStatus::Loaded
    }

    /// All enabled features, in declared draw order
    pub fn enabled_kinds(&self) -> Vec<FeatureKind> {
        FeatureKind::ALL
            .into_iter()
            .filter(|kind| self.states[kind].enabled)
            .collect()
    }

    /// Flip a feature's enabled flag
    ///
    /// Turning a feature on also enables its unmet hard dependencies in
    /// the same mutation. Turning it off leaves dependencies alone: a
    /// dependency another feature still needs must not be re-disabled.
    /// Returns the new enabled value.
    pub fn toggle(&mut self, kind: FeatureKind) -> Result<bool, PipelineError> {
        let currently = self.states[&kind].enabled;
        if currently {
            self.states.get_mut(&kind).expect("known kind").enabled = false;
            return Ok(false);
        }

        let spec = self.catalog.spec(kind);
        if spec.needs_gpu && !self.caps.gpu_acceleration {
            let message = "GPU acceleration unavailable".to_string();
            let state = self.states.get_mut(&kind).expect("known kind");
            state.load = LoadStatus::Error;
            state.error = Some(message.clone());
            tracing::warn!(feature = kind.as_str(), "refusing to enable feature");
            return Err(PipelineError::UnsupportedEnvironment {
                feature: kind.as_str(),
                message,
            });
        }

        for dep in resolver::dependency_closure(&self.catalog, kind) {
            self.states.get_mut(&dep).expect("known kind").enabled = true;
        }
        Ok(true)
    }

    /// Toggle by string key; unknown keys are a no-op in production
    pub fn toggle_by_key(&mut self, key: &str) -> Result<bool, PipelineError> {
        match FeatureKind::from_key(key) {
            Some(kind) => self.toggle(kind),
            None => {
                debug_assert!(false, "unknown feature key: {key}");
                tracing::warn!(key, "ignoring toggle for unknown feature");
                Err(PipelineError::UnknownFeature(key.to_string()))
            }
        }
    }

    /// Merge partial settings without touching the enabled flag
    pub fn update_settings(&mut self, kind: FeatureKind, settings: FeatureSettings) {
        let state = self.states.get_mut(&kind).expect("known kind");
        if let Some(sensitivity) = settings.sensitivity {
            state.sensitivity = sensitivity.clamp(0.0, 1.0);
        }
    }

    /// Record a load-status transition (loader only)
    pub(crate) fn set_load_status(
        &mut self,
        kind: FeatureKind,
        status: LoadStatus,
        error: Option<String>,
    ) {
        let state = self.states.get_mut(&kind).expect("known kind");
        state.load = status;
        state.error = error;
    }
}

/// Store shared between the control surface, loader, and compositor
pub type SharedStore = Arc<RwLock<FeatureStore>>;

/// Build a shared store over the given catalog
pub fn shared_store(catalog: Arc<FeatureCatalog>, caps: HostCapabilities) -> SharedStore {
    Arc::new(RwLock::new(FeatureStore::new(catalog, caps)))
}
