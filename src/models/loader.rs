//! Lazy model loader
//!
//! Compares the model kinds required by the enabled features against the
//! registry and starts asynchronous loads for whatever is missing. Loads
//! for different kinds are independent failure domains on their own
//! tasks; concurrent requests for the same kind are de-duplicated while
//! one is in flight. An already-loaded kind is never reloaded unless the
//! quality level changed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ModelEntry, ModelKind, ModelLoadOptions, ModelProvider, ModelRegistry};
use crate::catalog::{FeatureCatalog, FeatureKind};
use crate::config::PipelineConfig;
use crate::governor::QualityLevel;
use crate::resolver;
use crate::store::{LoadStatus, SharedStore};

/// Drives model acquisition for one pipeline instance
pub struct ModelLoader {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ModelRegistry>,
    catalog: Arc<FeatureCatalog>,
    store: SharedStore,
    config: Arc<PipelineConfig>,
    in_flight: Arc<Mutex<BTreeSet<ModelKind>>>,
    failed: Arc<Mutex<HashMap<ModelKind, QualityLevel>>>,
}

impl Clone for ModelLoader {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            registry: self.registry.clone(),
            catalog: self.catalog.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            in_flight: self.in_flight.clone(),
            failed: self.failed.clone(),
        }
    }
}

impl ModelLoader {
    /// Create a loader over shared pipeline state
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ModelRegistry>,
        catalog: Arc<FeatureCatalog>,
        store: SharedStore,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            provider,
            registry,
            catalog,
            store,
            config,
            in_flight: Arc::new(Mutex::new(BTreeSet::new())),
            failed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget recorded load failures so the next reconcile retries them
    pub fn reset_failures(&self) {
        self.failed.lock().clear();
    }

    /// Whether every model a feature needs has a live handle
    fn feature_ready(&self, kind: FeatureKind) -> bool {
        self.catalog
            .spec(kind)
            .models
            .iter()
            .all(|m| self.registry.get(*m).is_some())
    }

    /// Bring model state in line with the enabled feature set
    ///
    /// Must be called from within a tokio runtime; loads are spawned as
    /// independent tasks and this call never blocks on them.
    pub fn ensure_loaded(&self, enabled: &[FeatureKind], quality: QualityLevel) {
        // Features with no model requirements are ready the moment they
        // are observed enabled.
        {
            let mut store = self.store.write();
            for kind in enabled {
                let spec = self.catalog.spec(*kind);
                if spec.models.is_empty() && store.state(*kind).load != LoadStatus::Loaded {
                    store.set_load_status(*kind, LoadStatus::Loaded, None);
                }
            }
        }

        let required = resolver::required_model_kinds(&self.catalog, enabled.iter().copied());

        for kind in required {
            if self.registry.contains_at(kind, quality) {
                self.mark_ready_features(kind);
                continue;
            }
            // A kind that failed at this quality stays inert instead of
            // retrying every tick; a quality change or an explicit reset
            // tries again.
            if self.failed.lock().get(&kind) == Some(&quality) {
                continue;
            }
            {
                let mut pending = self.in_flight.lock();
                if pending.contains(&kind) {
                    continue;
                }
                pending.insert(kind);
            }

            // A handle at another quality keeps serving until the reload
            // lands; only a cold start shows as Loading.
            if self.registry.get(kind).is_none() {
                let mut store = self.store.write();
                for feature in self.catalog.features_requiring_model(kind) {
                    store.set_load_status(feature, LoadStatus::Loading, None);
                }
            }

            self.spawn_load(kind, quality);
        }
    }

    /// Mark enabled features for `kind` loaded when their model set is complete
    fn mark_ready_features(&self, kind: ModelKind) {
        let mut store = self.store.write();
        for feature in self.catalog.features_requiring_model(kind) {
            if store.state(feature).load != LoadStatus::Loaded && self.feature_ready(feature) {
                store.set_load_status(feature, LoadStatus::Loaded, None);
            }
        }
    }

    fn spawn_load(&self, kind: ModelKind, quality: QualityLevel) {
        let loader = self.clone();
        let (input_width, input_height) = self.config.input_size(quality);
        tokio::spawn(async move {
            let options = ModelLoadOptions {
                input_size: (input_width, input_height),
                quality,
            };
            tracing::info!(
                model = kind.as_str(),
                quality = quality.name(),
                "loading model"
            );

            match loader.provider.load(kind, options).await {
                Ok(model) => {
                    loader.registry.insert(kind, ModelEntry { model, quality });
                    loader.failed.lock().remove(&kind);
                    tracing::info!(model = kind.as_str(), "model ready");
                    loader.mark_ready_features(kind);
                }
                Err(error) => {
                    tracing::error!(model = kind.as_str(), %error, "model load failed");
                    loader.failed.lock().insert(kind, quality);
                    if loader.registry.get(kind).is_some() {
                        // Failed reload at a new quality; the previous
                        // handle keeps serving.
                        tracing::warn!(model = kind.as_str(), "keeping previous model handle");
                    } else {
                        let mut store = loader.store.write();
                        for feature in loader.catalog.features_requiring_model(kind) {
                            store.set_load_status(
                                feature,
                                LoadStatus::Error,
                                Some(error.to_string()),
                            );
                        }
                    }
                }
            }

            loader.in_flight.lock().remove(&kind);
        });
    }
}
