// SPDX-License-Identifier: GPL-3.0-only

//! Terminal stage presenting the effect output on the caller's surface

use super::pass::{SamplerKind, ShaderNames, ShaderPass, StageUniforms, default_vertex_shader};
use super::{RenderStage, StageHandle, TransformMatrix};
use crate::constants::{DISPLAY_CLEAR_COLOR, OFFSCREEN_FORMAT};
use crate::errors::{StageError, StageResult};
use crate::gpu::{Dimensions, FrameEncoder, FrameTexture, GpuContext, SurfaceTarget, wgpu};
use crate::shaders::PASSTHROUGH_FRAGMENT;

/// Draws its input onto a presentable surface, cleared to opaque black first.
///
/// The program targets the format of the last surface drawn to and is
/// rebuilt when a surface of another format comes along.
pub struct DisplayStage {
    pass: ShaderPass,
    surface_format: wgpu::TextureFormat,
}

impl Default for DisplayStage {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayStage {
    pub fn new() -> Self {
        let names = ShaderNames::default();
        Self {
            pass: ShaderPass::new(
                "display",
                default_vertex_shader(&names),
                PASSTHROUGH_FRAGMENT,
                names,
                1,
                SamplerKind::Linear,
            ),
            surface_format: OFFSCREEN_FORMAT,
        }
    }

    /// Format the program was last built for
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }
}

impl RenderStage for DisplayStage {
    fn name(&self) -> &str {
        self.pass.label()
    }

    fn create(&mut self, gpu: &GpuContext) -> StageResult<()> {
        self.pass.create(gpu, self.surface_format)
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
        _frame: &mut FrameEncoder<'_>,
        _input: &FrameTexture,
        _timestamp_us: i64,
        _transform: &TransformMatrix,
    ) -> StageResult<FrameTexture> {
        Err(StageError::TerminalStage(self.name().to_string()))
    }

    fn draw_onscreen(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input: &FrameTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
        target: &SurfaceTarget<'_>,
    ) -> StageResult<()> {
        let uniforms = StageUniforms::new(transform, [0.0, 0.0], timestamp_us);
        let drawn = self.pass.draw_to_surface(
            frame,
            input.id(),
            &[input.view()],
            &uniforms,
            target,
            DISPLAY_CLEAR_COLOR,
        )?;
        if drawn {
            self.surface_format = target.format;
        }
        Ok(())
    }

    fn copy(&self) -> StageHandle {
        StageHandle::new(Self {
            pass: self.pass.fresh(),
            surface_format: self.surface_format,
        })
        .into_dyn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_defaults() {
        let stage = DisplayStage::new();
        assert_eq!(stage.name(), "display");
        assert_eq!(stage.size(), None);
        assert_eq!(stage.surface_format(), OFFSCREEN_FORMAT);
        assert_eq!(stage.capabilities(), crate::stages::Capabilities::NONE);
    }

    #[test]
    fn test_copy_keeps_size() {
        let mut stage = DisplayStage::new();
        stage.set_size(Dimensions::new(640, 480));
        let copy = stage.copy();
        assert_eq!(copy.lock().size(), Some(Dimensions::new(640, 480)));
    }
}
