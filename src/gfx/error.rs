//! Error types for the rendering core
//!
//! Asset and GPU-setup failures are fatal: they are returned to the caller
//! and abort startup rather than being retried or papered over.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Asset not found: {}", path.display())]
    MissingAsset { path: PathBuf },

    #[error("Model source file {} does not exist.", path.display())]
    MissingModel { path: PathBuf },

    #[error("Failed to decode image '{}': {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model '{}': {source}", path.display())]
    ModelParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid asset '{name}': {reason}")]
    InvalidAsset { name: String, reason: String },

    #[error("Shader compilation failed for '{label}': {message}")]
    ShaderCompilation { label: String, message: String },

    #[error("Framebuffer incomplete: {0}")]
    IncompleteFramebuffer(String),

    #[error("Viewport height must be non-zero (got {width}x{height})")]
    DegenerateViewport { width: u32, height: u32 },

    #[error("Too many point lights: {count} exceeds the maximum of {max}")]
    TooManyPointLights { count: usize, max: usize },

    #[error("Invalid render pass state: {0}")]
    InvalidPassState(&'static str),

    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),

    #[error("No suitable GPU adapter found: {0}")]
    AdapterNotFound(String),

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Surface error: {0}")]
    Surface(String),
}

impl RenderError {
    pub(crate) fn invalid_asset(name: impl Into<String>, reason: impl Into<String>) -> Self {
        RenderError::InvalidAsset {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by a file that is absent on disk
    pub fn is_missing_asset(&self) -> bool {
        matches!(
            self,
            RenderError::MissingAsset { .. } | RenderError::MissingModel { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_message() {
        let err = RenderError::MissingModel {
            path: PathBuf::from("resources/models/cube.json"),
        };
        assert_eq!(
            err.to_string(),
            "Model source file resources/models/cube.json does not exist."
        );
        assert!(err.is_missing_asset());
    }

    #[test]
    fn test_invalid_asset_is_not_missing() {
        let err = RenderError::invalid_asset("cube", "face index out of range");
        assert!(!err.is_missing_asset());
        assert!(err.to_string().contains("face index out of range"));
    }
}
