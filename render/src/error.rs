//! Render error types.
//!
//! The RHI contract reports recoverable failures as `None`. This type covers
//! the fallible setup paths around it: backend creation, settings, shader
//! cache decoding and the render thread.

use std::fmt;

/// Errors that can occur in the render core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Failed to initialize a backend or the render thread.
    InitializationFailed(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// A requested feature or backend is not compiled in or not supported.
    FeatureNotSupported(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// Render settings could not be read or parsed.
    Config(String),
    /// A binary record could not be encoded or decoded.
    Serialization(String),
    /// The GPU device was lost.
    DeviceLost,
    /// An internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::Config(msg) => write!(f, "render settings error: {msg}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<bincode::Error> for RenderError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
