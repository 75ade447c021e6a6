// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

use crate::gpu::wgpu;

/// Texture format of every offscreen framebuffer in the stage chain
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Background the display stage clears the surface to before drawing
pub const DISPLAY_CLEAR_COLOR: wgpu::Color = wgpu::Color::BLACK;

/// Default target size when a configuration does not specify one
pub const DEFAULT_TARGET_WIDTH: u32 = 1280;
pub const DEFAULT_TARGET_HEIGHT: u32 = 720;

/// Column-major 4x4 identity matrix
pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, //
];

/// Full-viewport quad drawn as a 4-vertex triangle strip.
///
/// Texture coordinates follow the wgpu convention (`v = 0` is the top row),
/// so a pass with identity matrices reproduces its input without flipping.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    // bottom left
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coord: [0.0, 1.0],
    },
    // bottom right
    QuadVertex {
        position: [1.0, -1.0],
        tex_coord: [1.0, 1.0],
    },
    // top left
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coord: [0.0, 0.0],
    },
    // top right
    QuadVertex {
        position: [1.0, 1.0],
        tex_coord: [1.0, 0.0],
    },
];

/// Vertex of the shared full-viewport quad
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    /// Vertex buffer layout: position at location 0, texture coordinate at location 1
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Default name of the vertex position attribute
pub const DEFAULT_POSITION_NAME: &str = "a_position";
/// Default name of the vertex texture-coordinate attribute
pub const DEFAULT_TEX_COORD_NAME: &str = "a_tex_coord";
/// Default name of the interpolated texture coordinate read by fragment code
pub const DEFAULT_VARYING_NAME: &str = "v_tex_coord";

/// Vertex entry point every stage program exposes
pub const VERTEX_ENTRY_POINT: &str = "vs_main";
/// Fragment entry point every stage program exposes
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        assert_eq!(bytemuck::cast_slice::<QuadVertex, u8>(&QUAD_VERTICES).len(), 64);
    }
}
