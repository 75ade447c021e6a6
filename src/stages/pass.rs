// SPDX-License-Identifier: GPL-3.0-only

//! Single-pass draw shared by every stage
//!
//! [`ShaderPass`] owns the two lazily allocated resources of a stage, its
//! program and its offscreen framebuffer, and records one full-viewport quad
//! draw per call. Each resource moves through
//! `Unallocated -> Allocated -> Released`; a released program turns further
//! draws into logged no-ops.

use super::TransformMatrix;
use crate::constants::{
    DEFAULT_POSITION_NAME, DEFAULT_TEX_COORD_NAME, DEFAULT_VARYING_NAME, FRAGMENT_ENTRY_POINT,
    IDENTITY_MATRIX, OFFSCREEN_FORMAT, QUAD_VERTICES, QuadVertex, VERTEX_ENTRY_POINT,
};
use crate::errors::{StageError, StageResult};
use crate::gpu::{
    Dimensions, FrameEncoder, FrameTexture, GpuContext, SurfaceTarget, check_texture_size, wgpu,
};
use crate::shaders;
use std::borrow::Cow;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

/// Names the generated vertex stage uses for its inputs and output.
///
/// Fragment code reads the interpolated texture coordinate as
/// `in.<varying>`, so a fragment source written against custom names must
/// ship matching `ShaderNames`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderNames {
    pub position: Cow<'static, str>,
    pub tex_coord: Cow<'static, str>,
    pub varying: Cow<'static, str>,
}

impl Default for ShaderNames {
    fn default() -> Self {
        Self::new(
            DEFAULT_POSITION_NAME,
            DEFAULT_TEX_COORD_NAME,
            DEFAULT_VARYING_NAME,
        )
    }
}

impl ShaderNames {
    pub fn new(
        position: impl Into<Cow<'static, str>>,
        tex_coord: impl Into<Cow<'static, str>>,
        varying: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            position: position.into(),
            tex_coord: tex_coord.into(),
            varying: varying.into(),
        }
    }

    /// Check that both sources reference every contract name
    pub(crate) fn verify(&self, vertex: &str, fragment: &str) -> Result<(), String> {
        let required = [
            ("vertex", vertex, self.position.as_ref(), "position attribute"),
            ("vertex", vertex, self.tex_coord.as_ref(), "texture coordinate attribute"),
            ("vertex", vertex, self.varying.as_ref(), "varying"),
            ("vertex", vertex, VERTEX_ENTRY_POINT, "entry point"),
            ("fragment", fragment, self.varying.as_ref(), "varying"),
            ("fragment", fragment, FRAGMENT_ENTRY_POINT, "entry point"),
        ];

        for (shader, source, name, role) in required {
            if !contains_identifier(source, name) {
                return Err(format!("{} shader does not declare {} '{}'", shader, role, name));
            }
        }
        Ok(())
    }
}

/// Whether `ident` occurs in `source` as a whole identifier
fn contains_identifier(source: &str, ident: &str) -> bool {
    if ident.is_empty() {
        return false;
    }
    let is_ident_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    source.match_indices(ident).any(|(start, _)| {
        let before = source[..start].chars().next_back();
        let after = source[start + ident.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

/// Vertex stage used by every stage that does not bring its own.
///
/// Positions go through `stage.mvp`, texture coordinates through
/// `stage.transform`.
pub fn default_vertex_shader(names: &ShaderNames) -> String {
    format!(
        r#"
struct VertexInput {{
    @location(0) {position}: vec2<f32>,
    @location(1) {tex_coord}: vec2<f32>,
}}

struct VertexOutput {{
    @builtin(position) clip_position: vec4<f32>,
    @location(0) {varying}: vec2<f32>,
}}

@vertex
fn {entry}(in: VertexInput) -> VertexOutput {{
    var out: VertexOutput;
    out.clip_position = stage.mvp * vec4<f32>(in.{position}, 0.0, 1.0);
    out.{varying} = (stage.transform * vec4<f32>(in.{tex_coord}, 0.0, 1.0)).xy;
    return out;
}}
"#,
        position = names.position,
        tex_coord = names.tex_coord,
        varying = names.varying,
        entry = VERTEX_ENTRY_POINT,
    )
}

/// Uniform block bound at `@binding(2)` of every stage program
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StageUniforms {
    pub mvp: [f32; 16],
    pub transform: [f32; 16],
    /// (parameter 1, parameter 2, timestamp in seconds, 0)
    pub parameters: [f32; 4],
}

impl StageUniforms {
    pub fn new(transform: &TransformMatrix, parameters: [f32; 2], timestamp_us: i64) -> Self {
        Self {
            mvp: IDENTITY_MATRIX,
            transform: *transform,
            parameters: [
                parameters[0],
                parameters[1],
                (timestamp_us as f64 / 1_000_000.0) as f32,
                0.0,
            ],
        }
    }
}

/// Lifecycle of a lazily allocated GPU resource
#[derive(Debug)]
pub(crate) enum Resource<T> {
    Unallocated,
    Allocated(T),
    Released,
}

impl<T> Resource<T> {
    pub(crate) fn get(&self) -> Option<&T> {
        match self {
            Resource::Allocated(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        matches!(self, Resource::Released)
    }

    fn insert(&mut self, value: T) -> &mut T {
        *self = Resource::Allocated(value);
        match self {
            Resource::Allocated(value) => value,
            _ => unreachable!("resource was just allocated"),
        }
    }
}

/// Texture filtering of a stage's input sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SamplerKind {
    /// Linear filtering, used between offscreen stages
    Linear,
    /// Nearest minification and linear magnification, used on camera frames
    Camera,
}

impl SamplerKind {
    fn create(self, device: &wgpu::Device) -> wgpu::Sampler {
        let (min_filter, mag_filter) = match self {
            SamplerKind::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
            SamplerKind::Camera => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Linear),
        };
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("stage_input_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter,
            min_filter,
            ..Default::default()
        })
    }
}

/// Input bound to a program, keyed by texture identity
struct BoundInput {
    id: u64,
    bind_group: wgpu::BindGroup,
}

/// Compiled pipeline plus everything it binds
struct ShaderProgram {
    label: String,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    target_format: wgpu::TextureFormat,
    plane_count: usize,
    bound_input: Option<BoundInput>,
}

impl ShaderProgram {
    /// Record one quad draw of `views` into `target`
    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input_id: u64,
        views: &[&wgpu::TextureView],
        uniforms: &StageUniforms,
        target: &wgpu::TextureView,
        clear: wgpu::Color,
    ) -> StageResult<()> {
        if views.len() != self.plane_count {
            return Err(StageError::InvalidFrame(format!(
                "stage '{}' samples {} plane(s), got {}",
                self.label,
                self.plane_count,
                views.len()
            )));
        }

        let gpu = frame.gpu();

        if self.bound_input.as_ref().is_some_and(|bound| bound.id != input_id) {
            debug!(stage = %self.label, input = input_id, "Rebinding stage input");
            self.bound_input = None;
        }
        let bound = self.bound_input.get_or_insert_with(|| BoundInput {
            id: input_id,
            bind_group: create_bind_group(
                gpu.device(),
                &self.label,
                &self.bind_group_layout,
                &self.sampler,
                &self.uniform_buffer,
                views,
            ),
        });

        gpu.queue()
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let mut render_pass = frame
            .encoder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&self.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bound.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);

        Ok(())
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    uniform_buffer: &wgpu::Buffer,
    views: &[&wgpu::TextureView],
) -> wgpu::BindGroup {
    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(views[0]),
        },
        wgpu::BindGroupEntry {
            binding: 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        },
        wgpu::BindGroupEntry {
            binding: 2,
            resource: uniform_buffer.as_entire_binding(),
        },
    ];
    // Additional planes follow the uniform block
    for (index, view) in views.iter().enumerate().skip(1) {
        entries.push(wgpu::BindGroupEntry {
            binding: 2 + index as u32,
            resource: wgpu::BindingResource::TextureView(*view),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

fn texture_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Program, framebuffer and size of one stage
pub(crate) struct ShaderPass {
    label: String,
    vertex: String,
    fragment: String,
    names: ShaderNames,
    plane_count: usize,
    sampler: SamplerKind,
    program: Resource<ShaderProgram>,
    framebuffer: Resource<FrameTexture>,
    size: Option<Dimensions>,
    framebuffer_allocations: u64,
    program_builds: u64,
}

impl ShaderPass {
    pub(crate) fn new(
        label: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
        names: ShaderNames,
        plane_count: usize,
        sampler: SamplerKind,
    ) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            names,
            plane_count: plane_count.max(1),
            sampler,
            program: Resource::Unallocated,
            framebuffer: Resource::Unallocated,
            size: None,
            framebuffer_allocations: 0,
            program_builds: 0,
        }
    }

    /// Same sources and size, no GPU resources
    pub(crate) fn fresh(&self) -> Self {
        let mut pass = Self::new(
            self.label.clone(),
            self.vertex.clone(),
            self.fragment.clone(),
            self.names.clone(),
            self.plane_count,
            self.sampler,
        );
        pass.size = self.size;
        pass
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn size(&self) -> Option<Dimensions> {
        self.size
    }

    /// Record a new size. The framebuffer is reallocated on the next draw.
    pub(crate) fn set_size(&mut self, size: Dimensions) {
        if self.size == Some(size) {
            return;
        }
        debug!(
            stage = %self.label,
            width = size.width,
            height = size.height,
            "Stage size changed"
        );
        self.size = Some(size);
    }

    /// Number of framebuffers allocated over the lifetime of the stage
    pub(crate) fn framebuffer_allocations(&self) -> u64 {
        self.framebuffer_allocations
    }

    pub(crate) fn program_builds(&self) -> u64 {
        self.program_builds
    }

    pub(crate) fn is_released(&self) -> bool {
        self.program.is_released()
    }

    #[cfg(test)]
    pub(crate) fn has_program(&self) -> bool {
        self.program.get().is_some()
    }

    /// Current offscreen framebuffer, if allocated
    pub(crate) fn framebuffer(&self) -> Option<&FrameTexture> {
        self.framebuffer.get()
    }

    /// Compile the program for `format`. Also revives a released pass.
    pub(crate) fn create(
        &mut self,
        gpu: &GpuContext,
        format: wgpu::TextureFormat,
    ) -> StageResult<()> {
        if self.framebuffer.is_released() {
            self.framebuffer = Resource::Unallocated;
        }
        self.ensure_program(gpu, format).map(|_| ())
    }

    /// Release program and framebuffer. Idempotent.
    pub(crate) fn destroy(&mut self) {
        if self.program.is_released() {
            return;
        }
        debug!(stage = %self.label, "Releasing stage resources");
        self.program = Resource::Released;
        self.framebuffer = Resource::Released;
    }

    /// Draw into the offscreen framebuffer.
    ///
    /// Returns `None` if the pass was released; callers pass their input
    /// through in that case.
    pub(crate) fn draw_offscreen(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input_id: u64,
        views: &[&wgpu::TextureView],
        uniforms: &StageUniforms,
    ) -> StageResult<Option<FrameTexture>> {
        if self.is_released() {
            warn!(stage = %self.label, "Draw on released stage ignored, passing input through");
            return Ok(None);
        }

        let gpu = frame.gpu();
        let size = self
            .size
            .ok_or_else(|| StageError::SizeNotSet(self.label.clone()))?;

        let target = self.ensure_framebuffer(gpu, size)?;
        let program = self.ensure_program(gpu, OFFSCREEN_FORMAT)?;
        program.record(
            frame,
            input_id,
            views,
            uniforms,
            target.view(),
            wgpu::Color::TRANSPARENT,
        )?;

        Ok(Some(target))
    }

    /// Draw into a caller-owned surface after clearing it to `clear`.
    ///
    /// Returns `false` if the pass was released.
    pub(crate) fn draw_to_surface(
        &mut self,
        frame: &mut FrameEncoder<'_>,
        input_id: u64,
        views: &[&wgpu::TextureView],
        uniforms: &StageUniforms,
        target: &SurfaceTarget<'_>,
        clear: wgpu::Color,
    ) -> StageResult<bool> {
        if self.is_released() {
            warn!(stage = %self.label, "Draw on released stage ignored");
            return Ok(false);
        }

        let program = self.ensure_program(frame.gpu(), target.format)?;
        program.record(frame, input_id, views, uniforms, target.view, clear)?;
        Ok(true)
    }

    fn ensure_program(
        &mut self,
        gpu: &GpuContext,
        format: wgpu::TextureFormat,
    ) -> StageResult<&mut ShaderProgram> {
        let program = match std::mem::replace(&mut self.program, Resource::Unallocated) {
            Resource::Allocated(program) if program.target_format == format => program,
            previous => {
                if let Resource::Allocated(old) = &previous {
                    debug!(
                        stage = %self.label,
                        old_format = ?old.target_format,
                        new_format = ?format,
                        "Target format changed, rebuilding program"
                    );
                }
                drop(previous);
                let program = self.build_program(gpu, format)?;
                self.program_builds += 1;
                program
            }
        };
        Ok(self.program.insert(program))
    }

    fn ensure_framebuffer(
        &mut self,
        gpu: &GpuContext,
        size: Dimensions,
    ) -> StageResult<FrameTexture> {
        if let Some(framebuffer) = self.framebuffer.get()
            && framebuffer.size() == size
        {
            return Ok(framebuffer.clone());
        }

        check_texture_size(gpu, size, &self.label)?;
        let incomplete = |message: String| StageError::IncompleteFramebuffer {
            stage: self.label.clone(),
            width: size.width,
            height: size.height,
            message,
        };

        let device = gpu.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = FrameTexture::render_target(gpu, size, &self.label);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(incomplete(error.to_string()));
        }

        self.framebuffer_allocations += 1;
        debug!(
            stage = %self.label,
            width = size.width,
            height = size.height,
            allocations = self.framebuffer_allocations,
            "Allocated offscreen framebuffer"
        );
        self.framebuffer = Resource::Allocated(texture.clone());
        Ok(texture)
    }

    fn build_program(
        &self,
        gpu: &GpuContext,
        format: wgpu::TextureFormat,
    ) -> StageResult<ShaderProgram> {
        let contract = |message: String| StageError::ShaderContract {
            stage: self.label.clone(),
            message,
        };

        self.names.verify(&self.vertex, &self.fragment).map_err(contract)?;

        let device = gpu.device();
        let label = Some(self.label.as_str());

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label,
            source: wgpu::ShaderSource::Wgsl(
                shaders::stage_module_source(&self.vertex, &self.fragment).into(),
            ),
        });

        let mut layout_entries = vec![
            texture_layout_entry(0),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ];
        for plane in 1..self.plane_count {
            layout_entries.push(texture_layout_entry(2 + plane as u32));
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label,
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label,
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label,
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(VERTEX_ENTRY_POINT),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(FRAGMENT_ENTRY_POINT),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(contract(error.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stage_uniform_buffer"),
            size: std::mem::size_of::<StageUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stage_quad_vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        debug!(stage = %self.label, format = ?format, "Compiled stage program");

        Ok(ShaderProgram {
            label: self.label.clone(),
            pipeline,
            bind_group_layout,
            uniform_buffer,
            vertex_buffer,
            sampler: self.sampler.create(device),
            target_format: format,
            plane_count: self.plane_count,
            bound_input: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::PASSTHROUGH_FRAGMENT;

    fn passthrough_pass() -> ShaderPass {
        ShaderPass::new(
            "passthrough",
            default_vertex_shader(&ShaderNames::default()),
            PASSTHROUGH_FRAGMENT,
            ShaderNames::default(),
            1,
            SamplerKind::Linear,
        )
    }

    #[test]
    fn test_contains_identifier_respects_boundaries() {
        assert!(contains_identifier("out.v_tex_coord = x;", "v_tex_coord"));
        assert!(!contains_identifier("out.v_tex_coord2 = x;", "v_tex_coord"));
        assert!(!contains_identifier("my_v_tex_coord", "v_tex_coord"));
        assert!(!contains_identifier("anything", ""));
    }

    #[test]
    fn test_default_names_satisfy_contract() {
        let names = ShaderNames::default();
        let vertex = default_vertex_shader(&names);
        assert!(names.verify(&vertex, PASSTHROUGH_FRAGMENT).is_ok());
    }

    #[test]
    fn test_missing_varying_is_reported() {
        let names = ShaderNames::new("a_position", "a_tex_coord", "v_uv");
        let vertex = default_vertex_shader(&names);
        let err = names
            .verify(&vertex, PASSTHROUGH_FRAGMENT)
            .expect_err("fragment reads v_tex_coord, not v_uv");
        assert!(err.contains("fragment"));
        assert!(err.contains("v_uv"));
    }

    #[test]
    fn test_missing_attribute_is_reported() {
        let names = ShaderNames::default();
        let vertex = default_vertex_shader(&ShaderNames::new("pos", "a_tex_coord", "v_tex_coord"));
        let err = names
            .verify(&vertex, PASSTHROUGH_FRAGMENT)
            .expect_err("vertex stage lacks a_position");
        assert!(err.contains("a_position"));
    }

    #[test]
    fn test_stage_uniforms_layout() {
        assert_eq!(std::mem::size_of::<StageUniforms>(), 144);
        let uniforms = StageUniforms::new(&IDENTITY_MATRIX, [0.25, 0.75], 2_500_000);
        assert_eq!(uniforms.parameters, [0.25, 0.75, 2.5, 0.0]);
        assert_eq!(uniforms.mvp, IDENTITY_MATRIX);
    }

    #[test]
    fn test_set_size_same_value_is_noop() {
        let mut pass = passthrough_pass();
        assert_eq!(pass.size(), None);
        pass.set_size(Dimensions::new(64, 32));
        pass.set_size(Dimensions::new(64, 32));
        assert_eq!(pass.size(), Some(Dimensions::new(64, 32)));
        assert_eq!(pass.framebuffer_allocations(), 0);
        assert!(pass.framebuffer().is_none());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut pass = passthrough_pass();
        assert!(!pass.is_released());
        pass.destroy();
        pass.destroy();
        assert!(pass.is_released());
        assert!(!pass.has_program());
    }

    #[test]
    fn test_fresh_keeps_size_drops_state() {
        let mut pass = passthrough_pass();
        pass.set_size(Dimensions::new(8, 8));
        pass.destroy();
        let fresh = pass.fresh();
        assert_eq!(fresh.size(), Some(Dimensions::new(8, 8)));
        assert!(!fresh.is_released());
        assert_eq!(fresh.label(), "passthrough");
    }
}
