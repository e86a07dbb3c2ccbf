use thiserror::Error;

/// Layercheck error types
#[derive(Error, Debug)]
pub enum CheckError {
    /// An archive entry name resolves outside the destination root
    #[error("Path escapes destination root: {path} (layer {layer})")]
    PathEscape { path: String, layer: usize },

    /// A layer stream could not be opened or decoded
    #[error("Layer {layer} read failed: {message}")]
    LayerRead { layer: usize, message: String },

    /// The operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Package database could not be opened or parsed
    #[error("Package database error: {0}")]
    PackageDb(String),

    /// OCI image layout error
    #[error("OCI image error: {0}")]
    OciImage(String),

    /// Invalid filter pattern
    #[error("Invalid pattern: {0}")]
    Pattern(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CheckError {
    /// Wrap a decoder error for the layer at `layer`.
    pub fn layer_read(layer: usize, err: impl std::fmt::Display) -> Self {
        CheckError::LayerRead {
            layer,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(err: serde_json::Error) -> Self {
        CheckError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for CheckError {
    fn from(err: serde_yaml::Error) -> Self {
        CheckError::Serialization(err.to_string())
    }
}

/// Result type alias for layercheck operations
pub type Result<T> = std::result::Result<T, CheckError>;
