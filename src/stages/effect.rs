// SPDX-License-Identifier: GPL-3.0-only

//! Effect authoring contract
//!
//! An [`Effect`] is a fragment shader plus up to two scalar controls.
//! [`EffectStage`] turns it into a [`RenderStage`] backed by the shared
//! single-pass draw.

use super::pass::{SamplerKind, ShaderNames, ShaderPass, StageUniforms, default_vertex_shader};
use super::{Capabilities, ParameterSlot, RenderStage, StageHandle, TransformMatrix};
use crate::constants::OFFSCREEN_FORMAT;
use crate::errors::StageResult;
use crate::gpu::{Dimensions, FrameEncoder, FrameTexture, GpuContext, SurfaceTarget, wgpu};
use std::borrow::Cow;

/// A single-pass visual effect
pub trait Effect: Clone + Send + 'static {
    fn name(&self) -> &'static str;

    /// WGSL fragment stage defining `fs_main(in: VertexOutput)`
    fn fragment_shader(&self) -> Cow<'static, str>;

    /// Names shared by the vertex and fragment stages
    fn shader_names(&self) -> ShaderNames {
        ShaderNames::default()
    }

    /// WGSL vertex stage defining `vs_main` and `VertexOutput`
    fn vertex_shader(&self) -> Cow<'static, str> {
        Cow::Owned(default_vertex_shader(&self.shader_names()))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn parameter(&self, _slot: ParameterSlot) -> Option<f32> {
        None
    }

    fn set_parameter(&mut self, _slot: ParameterSlot, _value: f32) {}

    /// Values uploaded to `stage.parameters.xy`
    fn shader_parameters(&self) -> [f32; 2] {
        [0.0, 0.0]
    }
}

/// Render stage drawing one [`Effect`]
pub struct EffectStage<E: Effect> {
    effect: E,
    pass: ShaderPass,
}

impl<E: Effect> EffectStage<E> {
    pub fn new(effect: E) -> Self {
        let pass = ShaderPass::new(
            effect.name(),
            effect.vertex_shader(),
            effect.fragment_shader(),
            effect.shader_names(),
            1,
            SamplerKind::Linear,
        );
        Self { effect, pass }
    }

    pub fn with_size(effect: E, size: Dimensions) -> Self {
        let mut stage = Self::new(effect);
        stage.pass.set_size(size);
        stage
    }

    pub fn effect(&self) -> &E {
        &self.effect
    }

    pub fn effect_mut(&mut self) -> &mut E {
        &mut self.effect
    }

    /// Number of offscreen framebuffers allocated so far
    pub fn framebuffer_allocations(&self) -> u64 {
        self.pass.framebuffer_allocations()
    }

    /// Number of times the shader program has been compiled and linked
    pub fn program_builds(&self) -> u64 {
        self.pass.program_builds()
    }

    /// Output of the most recent offscreen draw
    pub fn output(&self) -> Option<FrameTexture> {
        self.pass.framebuffer().cloned()
    }

    fn uniforms(&self, timestamp_us: i64, transform: &TransformMatrix) -> StageUniforms {
        StageUniforms::new(transform, self.effect.shader_parameters(), timestamp_us)
    }
}

impl<E: Effect> RenderStage for EffectStage<E> {
    fn name(&self) -> &str {
        self.pass.label()
    }

    fn create(&mut self, gpu: &GpuContext) -> StageResult<()> {
        self.pass.create(gpu, OFFSCREEN_FORMAT)
    }

    fn destroy(&mut self) {
        self.pass.destroy();
    }

    fn size(&self) -> Option<Dimensions> {
        self.pass.size()
    }

    fn set_size(&mut self, size: Dimensions) {
        self.pass.set_size(size);
    }

    fn draw_offscreen(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input: &FrameTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
    ) -> StageResult<FrameTexture> {
        let uniforms = self.uniforms(timestamp_us, transform);
        let output = self
            .pass
            .draw_offscreen(frame, input.id(), &[input.view()], &uniforms)?;
        Ok(output.unwrap_or_else(|| input.clone()))
    }

    fn draw_onscreen(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input: &FrameTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
        target: &SurfaceTarget<'_>,
    ) -> StageResult<()> {
        let uniforms = self.uniforms(timestamp_us, transform);
        self.pass.draw_to_surface(
            frame,
            input.id(),
            &[input.view()],
            &uniforms,
            target,
            wgpu::Color::TRANSPARENT,
        )?;
        Ok(())
    }

    fn copy(&self) -> StageHandle {
        StageHandle::new(Self {
            effect: self.effect.clone(),
            pass: self.pass.fresh(),
        })
        .into_dyn()
    }

    fn capabilities(&self) -> Capabilities {
        self.effect.capabilities()
    }

    fn parameter(&self, slot: ParameterSlot) -> Option<f32> {
        if !self.effect.capabilities().supports(slot) {
            return None;
        }
        self.effect.parameter(slot)
    }

    fn set_parameter(&mut self, slot: ParameterSlot, value: f32) {
        if self.effect.capabilities().supports(slot) {
            self.effect.set_parameter(slot, value);
        }
    }
}
