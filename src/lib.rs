// SPDX-License-Identifier: GPL-3.0-only

//! Camera Compositor - real-time GPU frame compositing for camera previews
//!
//! Every captured frame runs through a fixed chain of render stages:
//!
//! ```text
//! ExternalTexture -> InputConversionStage -> effect -> DisplayStage -> surface
//! ```
//!
//! The effect slot holds any [`stages::RenderStage`]: a single effect, or a
//! [`stages::CompositeStage`] chaining several, and can be swapped from any
//! thread while frames keep flowing.
//!
//! # Architecture
//!
//! - [`gpu`]: device setup, frame encoder, texture handles and readback
//! - [`stages`]: the render-stage contract and the built-in stages
//! - [`effects`]: built-in effects
//! - [`pipeline`]: the per-frame orchestrator and effect hot-swap
//! - [`config`]: JSON pipeline configuration
//! - [`media`]: CPU-side NV12 frames
//! - [`shaders`]: WGSL sources

pub mod config;
pub mod constants;
pub mod effects;
pub mod errors;
pub mod gpu;
pub mod media;
pub mod pipeline;
pub mod shaders;
pub mod stages;

// Re-export commonly used types
pub use config::{EffectSpec, PipelineConfig};
pub use effects::EffectKind;
pub use errors::{ConfigError, GpuError, PipelineError, StageError};
pub use gpu::{Dimensions, ExternalFormat, ExternalFrame, FrameTexture, GpuContext, SurfaceTarget};
pub use pipeline::{EffectSwitch, FramePipeline, PipelineState};
pub use stages::{CompositeStage, Effect, EffectStage, RenderStage, StageHandle};
