// SPDX-License-Identifier: GPL-3.0-only

//! GPU device setup, per-frame command recording and texture readback.
//!
//! Every stage records into the single [`FrameEncoder`] of the frame being
//! rendered; the encoder is submitted once after the display stage.

mod texture;

use crate::errors::GpuError;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) use texture::check_texture_size;
pub use texture::{Dimensions, ExternalFormat, ExternalFrame, ExternalTexture, FrameTexture};
pub use wgpu;

/// Information about the adapter backing a [`GpuContext`]
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    /// Whether the adapter is a software rasterizer
    pub software: bool,
}

/// Device and queue shared by every stage of a pipeline
#[derive(Clone)]
pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: Arc<GpuDeviceInfo>,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext").field("info", &self.info).finish()
    }
}

impl GpuContext {
    /// Create a device for the render thread, blocking until it is ready.
    ///
    /// Prefers a hardware adapter and falls back to a software one so the
    /// pipeline keeps working on machines without a GPU.
    pub fn new(label: &str) -> Result<Self, GpuError> {
        pollster::block_on(Self::create(label))
    }

    /// Async variant of [`GpuContext::new`]
    pub async fn create(label: &str) -> Result<Self, GpuError> {
        info!(label = label, "Creating GPU device for frame compositing");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(e) => {
                debug!(error = %e, "No hardware adapter, trying software fallback");
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::LowPower,
                        compatible_surface: None,
                        force_fallback_adapter: true,
                    })
                    .await
                    .map_err(|e| GpuError::NoAdapter(e.to_string()))?
            }
        };

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "GPU adapter selected"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        let info = GpuDeviceInfo {
            adapter_name: adapter_info.name.clone(),
            backend: adapter_info.backend,
            software: adapter_info.device_type == wgpu::DeviceType::Cpu,
        };

        Ok(Self::from_parts(Arc::new(device), Arc::new(queue), info))
    }

    /// Wrap a device and queue owned by the embedding application
    pub fn from_parts(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        info: GpuDeviceInfo,
    ) -> Self {
        Self {
            device,
            queue,
            info: Arc::new(info),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    /// Largest width or height an offscreen target may have on this device
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Start recording the commands of one frame
    pub fn begin_frame(&self, label: &str) -> FrameEncoder<'_> {
        FrameEncoder::new(self, label)
    }
}

/// Command encoder for one frame, shared by every stage drawn in it
pub struct FrameEncoder<'a> {
    gpu: &'a GpuContext,
    encoder: wgpu::CommandEncoder,
}

impl<'a> FrameEncoder<'a> {
    pub fn new(gpu: &'a GpuContext, label: &str) -> Self {
        let encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        Self { gpu, encoder }
    }

    pub fn gpu(&self) -> &'a GpuContext {
        self.gpu
    }

    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }

    /// Submit everything recorded so far
    pub fn submit(self) -> wgpu::SubmissionIndex {
        self.gpu.queue().submit(std::iter::once(self.encoder.finish()))
    }
}

/// Presentable target the display stage draws into.
///
/// Owned by the surface collaborator; the pipeline only borrows it per frame.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub size: Dimensions,
}

/// Read a frame texture back to CPU memory as tightly packed RGBA rows.
///
/// Blocks until the GPU has finished every submitted command.
pub fn read_texture_rgba(gpu: &GpuContext, texture: &FrameTexture) -> Result<Vec<u8>, GpuError> {
    let size = texture.size();
    let unpadded_row = size.width * 4;
    let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let staging = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_staging_buffer"),
        size: (padded_row * size.height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut frame = gpu.begin_frame("readback_encoder");
    frame.encoder().copy_texture_to_buffer(
        texture.texture().as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(size.height),
            },
        },
        size.extent(),
    );
    frame.submit();

    let padded = pollster::block_on(read_buffer_async(gpu.device(), &staging))?;

    let mut rgba = Vec::with_capacity((unpadded_row * size.height) as usize);
    for row in padded.chunks_exact(padded_row as usize) {
        rgba.extend_from_slice(&row[..unpadded_row as usize]);
    }
    Ok(rgba)
}

/// Map a MAP_READ buffer and copy its contents out (map, poll, read, unmap)
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, GpuError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    receiver
        .await
        .map_err(|_| GpuError::BufferMap("mapping callback dropped".to_string()))?
        .map_err(|e| GpuError::BufferMap(e.to_string()))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}
