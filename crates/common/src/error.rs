//! Error types shared across ReelForge crates.

use std::path::PathBuf;

/// Top-level error type for ReelForge operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Timeline error: {message}")]
    Timeline { message: String },

    #[error("Invalid descriptor for {name}: {message}")]
    InvalidDescriptor { name: String, message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported media kind: {kind}")]
    UnsupportedMediaKind { kind: String },

    #[error("No video segments provided")]
    EmptySegments,

    #[error("{tool} failed ({status}): {stderr}")]
    Subprocess {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Required tool not found: {tool}")]
    ToolMissing { tool: String },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::Timeline {
            message: msg.into(),
        }
    }

    pub fn invalid_descriptor(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedMediaKind { kind: kind.into() }
    }

    pub fn subprocess(
        tool: impl Into<String>,
        status: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Subprocess {
            tool: tool.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    /// Whether this error aborts a whole render rather than a single entry.
    ///
    /// The entry loader skips entries failing with anything else.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(self, Self::UnsupportedMediaKind { .. })
    }
}
