use std::time::Duration;

use crate::segment::model::ModelId;

/// Convenience result type used across the pipeline.
pub type SpriteResult<T> = Result<T, SpriteError>;

/// Top-level error taxonomy used by pipeline APIs.
///
/// Structural variants (`Decode`, `InvalidGrid`, `DimensionMismatch`, `UnsupportedFormat`,
/// `EmptySource`) are fatal to the stage that raised them. `ModelInvocation` and `Timeout`
/// describe a single (frame, model) call and are normally folded into a failed
/// [`ModelResult`](crate::ModelResult) by the dispatcher.
#[derive(thiserror::Error, Debug)]
pub enum SpriteError {
    /// Source bytes are not a supported or readable raster image.
    #[error("decode error: {0}")]
    Decode(String),

    /// Grid hints are inconsistent with the image dimensions or the requested frame count.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// A frame does not match the declared frame size during assembly.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Video container or codec that no available decoder understands.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The source decoded but yielded no frames.
    #[error("empty source: {0}")]
    EmptySource(String),

    /// A segmentation call failed.
    #[error("model invocation error ({model}): {message}")]
    ModelInvocation {
        /// Model that was invoked.
        model: ModelId,
        /// Backend-provided failure description.
        message: String,
    },

    /// A segmentation call exceeded its per-call time budget.
    #[error("timeout ({model}): no result after {after:?}")]
    Timeout {
        /// Model that was invoked.
        model: ModelId,
        /// Budget that elapsed.
        after: Duration,
    },

    /// Strict failure policy: at least one frame could not be processed.
    #[error("frames failed ({model}): {failed} of {total} frames could not be processed")]
    FramesFailed {
        /// Model the frames were dispatched to.
        model: ModelId,
        /// Number of failed frames.
        failed: usize,
        /// Number of frames dispatched.
        total: usize,
    },

    /// Invalid configuration value.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpriteError {
    /// Build a [`SpriteError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`SpriteError::InvalidGrid`] value.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Build a [`SpriteError::DimensionMismatch`] value.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Build a [`SpriteError::UnsupportedFormat`] value.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`SpriteError::EmptySource`] value.
    pub fn empty_source(msg: impl Into<String>) -> Self {
        Self::EmptySource(msg.into())
    }

    /// Build a [`SpriteError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Short machine-readable label for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::InvalidGrid(_) => "invalid_grid",
            Self::DimensionMismatch(_) => "dimension_mismatch",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::EmptySource(_) => "empty_source",
            Self::ModelInvocation { .. } => "model_invocation",
            Self::Timeout { .. } => "timeout",
            Self::FramesFailed { .. } => "frames_failed",
            Self::Validation(_) => "validation",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
