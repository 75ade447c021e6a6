// SPDX-License-Identifier: GPL-3.0-only

//! Conversion of camera frames into the standard texture format
//!
//! This is the only stage allowed to sample an [`ExternalTexture`]. It
//! converts NV12 planes to RGB (full-range BT.601) or copies RGBA frames, and
//! applies the capture transform to the texture coordinates.

use super::pass::{SamplerKind, ShaderNames, ShaderPass, StageUniforms, default_vertex_shader};
use super::{RenderStage, StageHandle, TransformMatrix};
use crate::constants::OFFSCREEN_FORMAT;
use crate::errors::{StageError, StageResult};
use crate::gpu::{
    Dimensions, ExternalFormat, ExternalTexture, FrameEncoder, FrameTexture, GpuContext,
};
use crate::shaders::{NV12_CONVERSION_FRAGMENT, PASSTHROUGH_FRAGMENT};

pub struct InputConversionStage {
    format: ExternalFormat,
    pass: ShaderPass,
}

impl InputConversionStage {
    pub fn new(format: ExternalFormat) -> Self {
        let names = ShaderNames::default();
        let fragment = match format {
            ExternalFormat::Nv12 => NV12_CONVERSION_FRAGMENT,
            ExternalFormat::Rgba => PASSTHROUGH_FRAGMENT,
        };
        Self {
            format,
            pass: ShaderPass::new(
                "input_conversion",
                default_vertex_shader(&names),
                fragment,
                names,
                format.plane_count(),
                SamplerKind::Camera,
            ),
        }
    }

    /// External format this stage samples
    pub fn format(&self) -> ExternalFormat {
        self.format
    }

    /// Number of offscreen framebuffers allocated so far
    pub fn framebuffer_allocations(&self) -> u64 {
        self.pass.framebuffer_allocations()
    }

    /// Convert the current contents of `input` into the offscreen target.
    ///
    /// The bind group is reused for as long as the same external texture is
    /// drawn.
    pub fn draw_external(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input: &ExternalTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
    ) -> StageResult<FrameTexture> {
        if input.format() != self.format {
            return Err(self.format_mismatch(input.format()));
        }

        let views: Vec<_> = input.plane_views().collect();
        let uniforms = StageUniforms::new(transform, [0.0, 0.0], timestamp_us);
        self.pass
            .draw_offscreen(frame, input.id(), &views, &uniforms)?
            .ok_or_else(|| StageError::Released(self.name().to_string()))
    }

    fn format_mismatch(&self, actual: ExternalFormat) -> StageError {
        StageError::FormatMismatch {
            stage: self.name().to_string(),
            expected: self.format.name(),
            actual: actual.name(),
        }
    }
}

impl RenderStage for InputConversionStage {
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

    /// Standard textures are RGBA, so only an RGBA conversion stage accepts them
    fn draw_offscreen(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input: &FrameTexture,
        timestamp_us: i64,
        transform: &TransformMatrix,
    ) -> StageResult<FrameTexture> {
        if self.format != ExternalFormat::Rgba {
            return Err(self.format_mismatch(ExternalFormat::Rgba));
        }

        let uniforms = StageUniforms::new(transform, [0.0, 0.0], timestamp_us);
        let output = self
            .pass
            .draw_offscreen(frame, input.id(), &[input.view()], &uniforms)?;
        Ok(output.unwrap_or_else(|| input.clone()))
    }

    fn copy(&self) -> StageHandle {
        StageHandle::new(Self {
            format: self.format,
            pass: self.pass.fresh(),
        })
        .into_dyn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_format() {
        let stage = InputConversionStage::new(ExternalFormat::Nv12);
        assert_eq!(stage.format(), ExternalFormat::Nv12);
        assert_eq!(stage.name(), "input_conversion");
    }

    #[test]
    fn test_format_mismatch_error() {
        let stage = InputConversionStage::new(ExternalFormat::Nv12);
        let err = stage.format_mismatch(ExternalFormat::Rgba);
        assert!(err.is_configuration_error());
        assert_eq!(
            err.to_string(),
            "stage 'input_conversion' expects NV12 input, got RGBA"
        );
    }
}
