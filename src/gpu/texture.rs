// SPDX-License-Identifier: GPL-3.0-only

//! Texture handles passed between stages
//!
//! - [`FrameTexture`]: standard-format RGBA texture produced by an offscreen
//!   stage and readable by any stage.
//! - [`ExternalTexture`]: the camera's native plane layout. Its views are
//!   crate-private so that only the input conversion stage can sample it.

use super::{GpuContext, wgpu};
use crate::constants::OFFSCREEN_FORMAT;
use crate::errors::{StageError, StageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

fn next_texture_id() -> u64 {
    NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Width and height of a stage target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of the 2:1 subsampled chroma plane of a 4:2:0 frame
    pub fn chroma(&self) -> Self {
        Self::new(self.width.div_ceil(2), self.height.div_ceil(2))
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Reject sizes the device cannot allocate before they reach wgpu, whose
/// validation error would otherwise go to the uncaptured-error handler
pub(crate) fn check_texture_size(
    gpu: &GpuContext,
    size: Dimensions,
    stage: &str,
) -> StageResult<()> {
    let max = gpu.max_texture_dimension();
    if size.is_empty() || size.width > max || size.height > max {
        return Err(StageError::IncompleteFramebuffer {
            stage: stage.to_string(),
            width: size.width,
            height: size.height,
            message: format!("dimensions must be between 1 and {}", max),
        });
    }
    Ok(())
}

struct TextureInner {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Standard-format texture handle.
///
/// Cloning is cheap and keeps the identity: two clones compare equal through
/// [`FrameTexture::id`].
#[derive(Clone)]
pub struct FrameTexture {
    id: u64,
    size: Dimensions,
    inner: Arc<TextureInner>,
}

impl fmt::Debug for FrameTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTexture")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

impl PartialEq for FrameTexture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FrameTexture {}

impl FrameTexture {
    /// Wrap an existing 2D texture. The texture must be sampleable.
    pub fn from_texture(texture: wgpu::Texture) -> Self {
        let size = Dimensions::new(texture.width(), texture.height());
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id: next_texture_id(),
            size,
            inner: Arc::new(TextureInner { texture, view }),
        }
    }

    /// Allocate a texture usable as render target, sampling source and copy source
    pub(crate) fn render_target(gpu: &GpuContext, size: Dimensions, label: &str) -> Self {
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: size.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self::from_texture(texture)
    }

    /// Upload tightly packed RGBA rows into a new sampleable texture
    pub fn from_rgba(gpu: &GpuContext, size: Dimensions, rgba: &[u8]) -> StageResult<Self> {
        check_texture_size(gpu, size, "uploaded_rgba_texture")?;
        let expected = size.pixel_count() * 4;
        if rgba.len() != expected {
            return Err(StageError::InvalidFrame(format!(
                "expected {} bytes of RGBA for {}, got {}",
                expected,
                size,
                rgba.len()
            )));
        }
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("uploaded_rgba_texture"),
            size: size.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        write_plane(gpu, &texture, rgba, size.width * 4, size);
        Ok(Self::from_texture(texture))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.inner.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.inner.view
    }
}

/// Plane layout of the camera texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalFormat {
    /// Full-resolution luma plane plus interleaved half-resolution chroma
    #[default]
    Nv12,
    /// Already decoded RGBA
    Rgba,
}

impl ExternalFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ExternalFormat::Nv12 => "NV12",
            ExternalFormat::Rgba => "RGBA",
        }
    }

    /// Number of sampled planes
    pub fn plane_count(&self) -> usize {
        match self {
            ExternalFormat::Nv12 => 2,
            ExternalFormat::Rgba => 1,
        }
    }
}

/// One captured frame, borrowed from the capture collaborator
#[derive(Debug, Clone, Copy)]
pub enum ExternalFrame<'a> {
    Nv12 {
        y: &'a [u8],
        y_stride: u32,
        uv: &'a [u8],
        uv_stride: u32,
    },
    Rgba {
        data: &'a [u8],
        stride: u32,
    },
}

impl ExternalFrame<'_> {
    pub fn format(&self) -> ExternalFormat {
        match self {
            ExternalFrame::Nv12 { .. } => ExternalFormat::Nv12,
            ExternalFrame::Rgba { .. } => ExternalFormat::Rgba,
        }
    }
}

struct Plane {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Dimensions,
    bytes_per_pixel: u32,
}

/// Camera-facing texture with a stable identity.
///
/// Created once by the frame pipeline and updated in place for every frame.
pub struct ExternalTexture {
    id: u64,
    format: ExternalFormat,
    size: Dimensions,
    planes: Vec<Plane>,
}

impl fmt::Debug for ExternalTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTexture")
            .field("id", &self.id)
            .field("format", &self.format)
            .field("size", &self.size)
            .finish()
    }
}

impl ExternalTexture {
    pub(crate) fn new(
        gpu: &GpuContext,
        format: ExternalFormat,
        size: Dimensions,
    ) -> StageResult<Self> {
        check_texture_size(gpu, size, "external_texture")?;

        let plane_specs: Vec<(&str, wgpu::TextureFormat, Dimensions, u32)> = match format {
            ExternalFormat::Nv12 => vec![
                ("external_y_plane", wgpu::TextureFormat::R8Unorm, size, 1),
                (
                    "external_uv_plane",
                    wgpu::TextureFormat::Rg8Unorm,
                    size.chroma(),
                    2,
                ),
            ],
            ExternalFormat::Rgba => vec![("external_rgba_plane", OFFSCREEN_FORMAT, size, 4)],
        };

        let planes = plane_specs
            .into_iter()
            .map(|(label, texture_format, plane_size, bytes_per_pixel)| {
                let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: plane_size.extent(),
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: texture_format,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                Plane {
                    texture,
                    view,
                    size: plane_size,
                    bytes_per_pixel,
                }
            })
            .collect();

        Ok(Self {
            id: next_texture_id(),
            format,
            size,
            planes,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn format(&self) -> ExternalFormat {
        self.format
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    /// Replace the texture contents with a new frame
    pub fn upload(&self, gpu: &GpuContext, frame: ExternalFrame<'_>) -> StageResult<()> {
        if frame.format() != self.format {
            return Err(StageError::FormatMismatch {
                stage: "external_texture".to_string(),
                expected: self.format.name(),
                actual: frame.format().name(),
            });
        }

        let sources: Vec<(&[u8], u32)> = match frame {
            ExternalFrame::Nv12 {
                y,
                y_stride,
                uv,
                uv_stride,
            } => vec![(y, y_stride), (uv, uv_stride)],
            ExternalFrame::Rgba { data, stride } => vec![(data, stride)],
        };

        for (plane, &(data, stride)) in self.planes.iter().zip(&sources) {
            let row_bytes = plane.size.width * plane.bytes_per_pixel;
            if stride < row_bytes {
                return Err(StageError::InvalidFrame(format!(
                    "stride {} shorter than a {} byte row",
                    stride, row_bytes
                )));
            }
            let required = stride as usize * (plane.size.height as usize).saturating_sub(1)
                + row_bytes as usize;
            if data.len() < required {
                return Err(StageError::InvalidFrame(format!(
                    "plane of {} needs {} bytes, got {}",
                    plane.size,
                    required,
                    data.len()
                )));
            }
        }

        for (plane, (data, stride)) in self.planes.iter().zip(sources) {
            write_plane(gpu, &plane.texture, data, stride, plane.size);
        }
        Ok(())
    }

    pub(crate) fn plane_views(&self) -> impl Iterator<Item = &wgpu::TextureView> {
        self.planes.iter().map(|plane| &plane.view)
    }
}

fn write_plane(
    gpu: &GpuContext,
    texture: &wgpu::Texture,
    data: &[u8],
    stride: u32,
    size: Dimensions,
) {
    gpu.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(stride),
            rows_per_image: Some(size.height),
        },
        size.extent(),
    );
}
