// SPDX-License-Identifier: GPL-3.0-only

//! Frame pipeline orchestrator
//!
//! Owns the fixed chain of a camera preview:
//!
//! ```text
//! ExternalTexture -> InputConversionStage -> effect -> DisplayStage -> surface
//! ```
//!
//! The effect slot is hot-swappable. New effects are posted through an
//! [`EffectSwitch`] from any thread and adopted at the start of the next
//! frame; the outgoing effect is destroyed at that point.
//!
//! # Lifecycle
//!
//! `Uninitialized` until the first [`FramePipeline::render_frame`], which
//! creates the stage programs. `Active` afterwards. [`FramePipeline::release`]
//! destroys everything and is terminal: a released pipeline refuses to render
//! and must be rebuilt.

mod mailbox;

pub use mailbox::EffectSwitch;

use crate::constants::IDENTITY_MATRIX;
use crate::errors::{PipelineError, PipelineResult, StageResult};
use crate::gpu::{
    Dimensions, ExternalFormat, ExternalTexture, FrameTexture, GpuContext, SurfaceTarget,
};
use crate::stages::{
    DisplayStage, InputConversionStage, RenderStage, StageHandle, TransformMatrix,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Active,
    Released,
}

pub struct FramePipeline {
    conversion: InputConversionStage,
    effect: StageHandle,
    display: DisplayStage,
    pending: EffectSwitch,
    target_size: Option<Dimensions>,
    state: PipelineState,
    frame_count: u64,
}

impl FramePipeline {
    /// Pipeline converting `format` camera frames and drawing them through
    /// `effect`
    pub fn new(effect: StageHandle, format: ExternalFormat) -> Self {
        Self {
            conversion: InputConversionStage::new(format),
            effect,
            display: DisplayStage::new(),
            pending: EffectSwitch::new(),
            target_size: None,
            state: PipelineState::Uninitialized,
            frame_count: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn external_format(&self) -> ExternalFormat {
        self.conversion.format()
    }

    /// Currently active effect. A pending request is not visible here until
    /// the next frame adopts it.
    pub fn effect(&self) -> StageHandle {
        self.effect.clone()
    }

    pub fn conversion(&self) -> &InputConversionStage {
        &self.conversion
    }

    pub fn display(&self) -> &DisplayStage {
        &self.display
    }

    pub fn target_size(&self) -> Option<Dimensions> {
        self.target_size
    }

    /// Size applied to the active effect, and through it to the conversion
    /// and display stages, at the start of every frame
    pub fn set_target_size(&mut self, size: Dimensions) {
        self.target_size = Some(size);
    }

    /// Replace the effect starting with the next frame
    pub fn request_effect(&self, stage: StageHandle) {
        self.pending.request(stage);
    }

    /// Handle for posting effects from other threads
    pub fn effect_switch(&self) -> EffectSwitch {
        self.pending.clone()
    }

    /// Allocate the camera-facing texture in this pipeline's external format.
    ///
    /// The texture keeps its identity for its whole life; upload new frames
    /// into it with [`ExternalTexture::upload`]. Sizes the device cannot hold
    /// fail with [`crate::errors::StageError::IncompleteFramebuffer`].
    pub fn create_external_texture(
        &self,
        gpu: &GpuContext,
        size: Dimensions,
    ) -> StageResult<ExternalTexture> {
        debug!(
            format = self.external_format().name(),
            width = size.width,
            height = size.height,
            "Creating external texture"
        );
        ExternalTexture::new(gpu, self.external_format(), size)
    }

    /// Render one captured frame onto `surface`.
    ///
    /// Returns the effect output (the image before display), which stays
    /// valid until the effect draws again.
    pub fn render_frame(
        &mut self,
        gpu: &GpuContext,
        input: &ExternalTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
        surface: &SurfaceTarget<'_>,
    ) -> PipelineResult<FrameTexture> {
        if self.state == PipelineState::Released {
            return Err(PipelineError::Released);
        }

        let switched = self.adopt_pending_effect();

        let mut effect = self.effect.lock();
        if switched && self.state == PipelineState::Active {
            // The incoming effect may have been destroyed by an earlier swap
            effect.create(gpu)?;
        }
        if let Some(size) = self.target_size
            && effect.size() != Some(size)
        {
            effect.set_size(size);
        }
        let size = effect.size().ok_or(PipelineError::SizeNotConfigured)?;
        if self.conversion.size() != Some(size) {
            self.conversion.set_size(size);
        }
        if self.display.size() != Some(size) {
            self.display.set_size(size);
        }

        if self.state == PipelineState::Uninitialized {
            self.conversion.create(gpu)?;
            effect.create(gpu)?;
            self.state = PipelineState::Active;
            info!(
                width = size.width,
                height = size.height,
                effect = effect.name(),
                "Frame pipeline initialized"
            );
        }

        let mut frame = gpu.begin_frame("frame_pipeline");
        let converted = self
            .conversion
            .draw_external(&mut frame, input, timestamp_us, transform)?;
        // The capture transform is consumed by the conversion stage
        let output =
            effect.draw_offscreen(&mut frame, &converted, timestamp_us, &IDENTITY_MATRIX)?;
        self.display
            .draw_onscreen(&mut frame, &output, timestamp_us, &IDENTITY_MATRIX, surface)?;
        frame.submit();

        self.frame_count += 1;
        debug!(frame = self.frame_count, timestamp_us, "Rendered frame");
        Ok(output)
    }

    /// Destroy all stages. Idempotent; the pipeline cannot render afterwards.
    pub fn release(&mut self) {
        if self.state == PipelineState::Released {
            return;
        }
        if let Some(pending) = self.pending.take() {
            pending.lock().destroy();
        }
        self.conversion.destroy();
        self.effect.lock().destroy();
        self.display.destroy();
        self.state = PipelineState::Released;
        info!(frames = self.frame_count, "Frame pipeline released");
    }

    /// Swap in the pending effect, if any. Returns whether the effect changed.
    fn adopt_pending_effect(&mut self) -> bool {
        let Some(next) = self.pending.take() else {
            return false;
        };
        if next.ptr_eq(&self.effect) {
            debug!("Requested effect is already active");
            return false;
        }

        let outgoing = std::mem::replace(&mut self.effect, next);
        let mut previous = outgoing.lock();
        previous.destroy();

        let mut current = self.effect.lock();
        if current.size().is_none()
            && let Some(size) = previous.size()
        {
            current.set_size(size);
        }
        info!(
            previous = previous.name(),
            current = current.name(),
            frame = self.frame_count + 1,
            "Switched effect"
        );
        true
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("state", &self.state)
            .field("external_format", &self.external_format())
            .field("effect", &self.effect)
            .field("target_size", &self.target_size)
            .field("frame_count", &self.frame_count)
            .finish()
    }
}
