//! Error types for the effects pipeline
//!
//! Errors are local to one feature or model kind. Nothing here is fatal to
//! the pipeline: the worst outcome of any of these is a feature that stays
//! enabled but does not render.

use thiserror::Error;

/// A perception model failed to initialize.
///
/// The affected features keep their enabled flag but are inert until a
/// later load succeeds; the message is surfaced per feature.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Model artifact could not be located
    #[error("model artifact not found: {0}")]
    NotFound(String),
    /// Backend failed while building the inference session
    #[error("model initialization failed: {0}")]
    Init(String),
    /// The host lacks a capability the model needs
    #[error("unsupported environment: {0}")]
    Unsupported(String),
}

/// A single detection call failed.
///
/// Logged and the pass skipped for that tick; no state change.
#[derive(Debug, Clone, Error)]
#[error("inference failed: {0}")]
pub struct InferenceError(pub String);

/// Errors surfaced through the pipeline control surface
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A string feature key did not match any catalog entry
    #[error("unknown feature key: {0}")]
    UnknownFeature(String),
    /// The feature refuses to enable on this host
    #[error("feature '{feature}' cannot run here: {message}")]
    UnsupportedEnvironment {
        feature: &'static str,
        message: String,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
