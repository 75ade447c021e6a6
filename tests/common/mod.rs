// SPDX-License-Identifier: GPL-3.0-only

//! Shared helpers for GPU integration tests

#![allow(dead_code)]

use camera_compositor::constants::OFFSCREEN_FORMAT;
use camera_compositor::gpu::{read_texture_rgba, wgpu};
use camera_compositor::{Dimensions, FrameTexture, GpuContext, SurfaceTarget};

/// GPU context for a test, or `None` (with a note on stdout) when the
/// machine has no adapter at all
pub fn gpu() -> Option<GpuContext> {
    match GpuContext::new("integration_test") {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            println!("Skipping test (no GPU): {}", e);
            None
        }
    }
}

/// Offscreen texture standing in for a window surface
pub fn surface(gpu: &GpuContext, size: Dimensions) -> FrameTexture {
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("test_surface"),
        size: size.extent(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    FrameTexture::from_texture(texture)
}

pub fn surface_target(surface: &FrameTexture) -> SurfaceTarget<'_> {
    SurfaceTarget {
        view: surface.view(),
        format: OFFSCREEN_FORMAT,
        size: surface.size(),
    }
}

/// Column-major texture transform that flips frames horizontally (u -> 1 - u)
pub const MIRROR_MATRIX: [f32; 16] = [
    -1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    1.0, 0.0, 0.0, 1.0,
];

/// Reverse the pixel order of every row of an RGBA buffer
pub fn mirror(size: Dimensions, rgba: &[u8]) -> Vec<u8> {
    let row_bytes = size.width as usize * 4;
    rgba.chunks_exact(row_bytes)
        .flat_map(|row| row.chunks_exact(4).rev().flatten().copied())
        .collect()
}

/// Single-colour RGBA frame
pub fn solid(size: Dimensions, color: [u8; 4]) -> Vec<u8> {
    color.repeat(size.pixel_count())
}

/// Deterministic RGBA gradient with opaque alpha
pub fn gradient(size: Dimensions) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(size.pixel_count() * 4);
    for y in 0..size.height {
        for x in 0..size.width {
            rgba.extend_from_slice(&[
                (x * 255 / (size.width - 1).max(1)) as u8,
                (y * 255 / (size.height - 1).max(1)) as u8,
                ((x + y) * 7 % 256) as u8,
                255,
            ]);
        }
    }
    rgba
}

pub fn read(gpu: &GpuContext, texture: &FrameTexture) -> Vec<u8> {
    read_texture_rgba(gpu, texture).expect("readback failed")
}

/// Largest per-channel difference between two RGBA buffers
pub fn max_difference(a: &[u8], b: &[u8]) -> u8 {
    assert_eq!(a.len(), b.len(), "buffers differ in size");
    a.iter()
        .zip(b)
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}
