//! Dependency resolution over the feature catalog
//!
//! Pure functions: the same enabled set always yields the same answer,
//! independent of iteration order.

use std::collections::BTreeSet;

use crate::catalog::{FeatureCatalog, FeatureKind};
use crate::models::ModelKind;

/// The feature plus every ancestor in its dependency chain
///
/// The catalog keeps chains at depth <= 2, but the walk is written as a
/// worklist so a deeper catalog would still resolve.
pub fn dependency_closure(catalog: &FeatureCatalog, kind: FeatureKind) -> BTreeSet<FeatureKind> {
    let mut closure = BTreeSet::new();
    let mut pending = vec![kind];
    while let Some(next) = pending.pop() {
        if closure.insert(next) {
            pending.extend(catalog.spec(next).requires.iter().copied());
        }
    }
    closure
}

/// Union of model kinds required by the enabled features
pub fn required_model_kinds(
    catalog: &FeatureCatalog,
    enabled: impl IntoIterator<Item = FeatureKind>,
) -> BTreeSet<ModelKind> {
    enabled
        .into_iter()
        .flat_map(|kind| catalog.spec(kind).models.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_includes_all_ancestors() {
        let catalog = FeatureCatalog::builtin();
        let closure = dependency_closure(&catalog, FeatureKind::ExpressionDetection);
        assert!(closure.contains(&FeatureKind::ExpressionDetection));
        assert!(closure.contains(&FeatureKind::FaceLandmarks));
        assert!(closure.contains(&FeatureKind::FaceDetection));
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn test_closure_of_root_is_itself() {
        let catalog = FeatureCatalog::builtin();
        let closure = dependency_closure(&catalog, FeatureKind::FaceDetection);
        assert_eq!(closure.len(), 1);
    }

    #[test]
    fn test_required_models_deduplicate() {
        let catalog = FeatureCatalog::builtin();
        // Both hand features map onto the same model kind
        let required = required_model_kinds(
            &catalog,
            [FeatureKind::HandTracking, FeatureKind::GestureRecognition],
        );
        assert_eq!(required.len(), 1);
        assert!(required.contains(&ModelKind::HandLandmarker));
    }

    #[test]
    fn test_required_models_order_independent() {
        let catalog = FeatureCatalog::builtin();
        let forward = required_model_kinds(
            &catalog,
            [
                FeatureKind::FaceDetection,
                FeatureKind::BackgroundBlur,
                FeatureKind::HandTracking,
            ],
        );
        let reverse = required_model_kinds(
            &catalog,
            [
                FeatureKind::HandTracking,
                FeatureKind::BackgroundBlur,
                FeatureKind::FaceDetection,
            ],
        );
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_modelless_features_need_nothing() {
        let catalog = FeatureCatalog::builtin();
        let required = required_model_kinds(
            &catalog,
            [FeatureKind::ColorAdjust, FeatureKind::Stabilization],
        );
        assert!(required.is_empty());
    }
}
