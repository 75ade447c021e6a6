// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the compositing pipeline
//!
//! Errors fall into three groups:
//!
//! - **Configuration** errors (shader contract mismatch, wiring mistakes such as
//!   drawing the display stage offscreen). These are fatal and always returned.
//! - **Framebuffer** errors, raised when an offscreen target cannot be allocated.
//!   Also fatal; retrying with the same size cannot succeed.
//! - **Stale resource** draws (a stage drawn after it was destroyed). These are
//!   not errors at all from the caller's point of view: the stage logs a warning
//!   and passes its input through unchanged.

use thiserror::Error;

/// Result type for individual render stages
pub type StageResult<T> = Result<T, StageError>;

/// Result type for the frame pipeline
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised by a single render stage
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// Shader source does not match the stage contract (missing attribute,
    /// varying, binding or entry point, or a WGSL compile error)
    #[error("shader contract mismatch in stage '{stage}': {message}")]
    ShaderContract { stage: String, message: String },

    /// The offscreen target was rejected by the device
    #[error("incomplete framebuffer for stage '{stage}' ({width}x{height}): {message}")]
    IncompleteFramebuffer {
        stage: String,
        width: u32,
        height: u32,
        message: String,
    },

    /// A draw was requested before any target size was configured
    #[error("stage '{0}' has no target size")]
    SizeNotSet(String),

    /// The terminal display stage cannot render offscreen
    #[error("stage '{0}' is terminal and cannot draw offscreen")]
    TerminalStage(String),

    /// The stage does not implement the requested draw path
    #[error("stage '{stage}' does not support {operation}")]
    Unsupported {
        stage: String,
        operation: &'static str,
    },

    /// External texture format differs from the one the stage was built for
    #[error("stage '{stage}' expects {expected} input, got {actual}")]
    FormatMismatch {
        stage: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Uploaded plane data does not fit the external texture
    #[error("invalid frame data: {0}")]
    InvalidFrame(String),

    /// The stage was released and has no input it could pass through
    #[error("stage '{0}' was released and cannot produce output")]
    Released(String),

    /// A composite was asked to contain itself
    #[error("composite '{0}' cannot be added to itself")]
    SelfInsertion(String),
}

impl StageError {
    /// Whether the error indicates a wiring or contract defect rather than a
    /// device-side failure
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, StageError::IncompleteFramebuffer { .. })
    }
}

/// Errors raised by the frame pipeline orchestrator
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A stage failed while recording the frame
    #[error(transparent)]
    Stage(#[from] StageError),

    /// `render_frame` called after `release`
    #[error("pipeline has been released and must be rebuilt")]
    Released,

    /// Neither the pipeline nor the active effect carries a target size
    #[error("no target size configured for the active effect")]
    SizeNotConfigured,
}

/// Errors raised while creating a GPU context or reading results back
#[derive(Debug, Clone, Error)]
pub enum GpuError {
    /// No adapter could be found, not even a software fallback
    #[error("no suitable GPU adapter found: {0}")]
    NoAdapter(String),

    /// The adapter refused to create a device
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),

    /// Mapping a readback buffer failed
    #[error("failed to map readback buffer: {0}")]
    BufferMap(String),
}

/// Errors raised while loading or saving a pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_wraps_into_pipeline_error() {
        let err: PipelineError = StageError::TerminalStage("display".into()).into();
        assert!(matches!(err, PipelineError::Stage(StageError::TerminalStage(_))));
        assert_eq!(
            err.to_string(),
            "stage 'display' is terminal and cannot draw offscreen"
        );
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(StageError::SizeNotSet("fill_light".into()).is_configuration_error());
        let framebuffer = StageError::IncompleteFramebuffer {
            stage: "mono".into(),
            width: 0,
            height: 0,
            message: "zero-sized target".into(),
        };
        assert!(!framebuffer.is_configuration_error());
    }
}
