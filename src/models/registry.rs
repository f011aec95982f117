//! Model registry
//!
//! Owns the loaded perception models, keyed by kind. At most one live
//! handle exists per kind; storing a handle loaded at a new quality level
//! retires the previous one. Handles are never mutated after insertion,
//! so readers only need the brief lock around the map itself.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{ModelKind, PerceptionModel};
use crate::governor::QualityLevel;

/// A stored model handle and the quality level it was loaded at
#[derive(Clone)]
pub struct ModelEntry {
    pub model: Arc<dyn PerceptionModel>,
    pub quality: QualityLevel,
}

/// Shared registry of loaded models
#[derive(Default)]
pub struct ModelRegistry {
    entries: RwLock<HashMap<ModelKind, ModelEntry>>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for a kind, if loaded at any quality
    pub fn get(&self, kind: ModelKind) -> Option<ModelEntry> {
        self.entries.read().get(&kind).cloned()
    }

    /// Whether a handle exists for the kind at exactly this quality
    pub fn contains_at(&self, kind: ModelKind, quality: QualityLevel) -> bool {
        self.entries
            .read()
            .get(&kind)
            .is_some_and(|e| e.quality == quality)
    }

    /// Store a handle, retiring any previous one for the kind
    pub fn insert(&self, kind: ModelKind, entry: ModelEntry) {
        let old = self.entries.write().insert(kind, entry);
        if old.is_some() {
            tracing::debug!(model = kind.as_str(), "retired previous model handle");
        }
    }

    /// Kinds currently loaded
    pub fn loaded_kinds(&self) -> Vec<ModelKind> {
        self.entries.read().keys().copied().collect()
    }

    /// Number of loaded models
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no models are loaded
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every handle (pipeline teardown)
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::frame::Frame;
    use crate::models::Detections;
    use async_trait::async_trait;

    struct NullModel(ModelKind);

    #[async_trait]
    impl PerceptionModel for NullModel {
        fn kind(&self) -> ModelKind {
            self.0
        }

        async fn infer(&self, _frame: &Frame) -> Result<Detections, InferenceError> {
            Ok(Detections::Faces(vec![]))
        }
    }

    fn entry(kind: ModelKind, quality: QualityLevel) -> ModelEntry {
        ModelEntry {
            model: Arc::new(NullModel(kind)),
            quality,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = ModelRegistry::new();
        assert!(registry.is_empty());

        registry.insert(
            ModelKind::FaceDetector,
            entry(ModelKind::FaceDetector, QualityLevel::Medium),
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_at(ModelKind::FaceDetector, QualityLevel::Medium));
        assert!(!registry.contains_at(ModelKind::FaceDetector, QualityLevel::Low));
        assert!(registry.get(ModelKind::BodySegmenter).is_none());
    }

    #[test]
    fn test_new_quality_retires_old_handle() {
        let registry = ModelRegistry::new();
        registry.insert(
            ModelKind::FaceDetector,
            entry(ModelKind::FaceDetector, QualityLevel::Medium),
        );
        registry.insert(
            ModelKind::FaceDetector,
            entry(ModelKind::FaceDetector, QualityLevel::Low),
        );

        // One live handle per kind
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(ModelKind::FaceDetector).unwrap().quality,
            QualityLevel::Low
        );
    }

    #[test]
    fn test_clear_releases_handles() {
        let registry = ModelRegistry::new();
        registry.insert(
            ModelKind::FaceDetector,
            entry(ModelKind::FaceDetector, QualityLevel::Medium),
        );
        registry.clear();
        assert!(registry.is_empty());
    }
}
