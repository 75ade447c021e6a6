// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing the built-in effects
//! - Rendering a still image through the full frame pipeline

use camera_compositor::constants::{IDENTITY_MATRIX, OFFSCREEN_FORMAT};
use camera_compositor::gpu::{read_texture_rgba, wgpu};
use camera_compositor::media::Nv12Image;
use camera_compositor::{
    Dimensions, EffectKind, EffectSpec, ExternalFormat, ExternalFrame, FrameTexture, GpuContext,
    PipelineConfig, SurfaceTarget,
};
use std::path::PathBuf;
use std::time::Instant;

pub struct RenderOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub effects: Vec<EffectKind>,
    pub parameter1: Option<f32>,
    pub parameter2: Option<f32>,
    pub config: Option<PathBuf>,
    pub size: Option<(u32, u32)>,
    pub nv12: bool,
}

/// List all built-in effects
pub fn list_effects() -> Result<(), Box<dyn std::error::Error>> {
    println!("Available effects:");
    println!();
    for kind in EffectKind::ALL {
        let capabilities = kind.capabilities();
        let parameters = match (capabilities.parameter1, capabilities.parameter2) {
            (true, true) => " [2 parameters]",
            (true, false) => " [1 parameter]",
            _ => "",
        };
        println!("  {:<12} {}{}", kind.name(), kind.description(), parameters);
    }
    Ok(())
}

/// Render one image through the pipeline and write the displayed result
pub fn render_image(options: RenderOptions) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::open(&options.input)?.to_rgba8();
    let image_size = Dimensions::new(image.width(), image.height());
    println!("Input: {} ({})", options.input.display(), image_size);

    let config = resolve_config(&options, image_size)?;
    let target_size = config.target_size();

    let gpu = GpuContext::new("camera-compositor")?;
    println!(
        "GPU: {} ({:?}{})",
        gpu.info().adapter_name,
        gpu.info().backend,
        if gpu.info().software { ", software" } else { "" }
    );

    let mut pipeline = config.build_pipeline()?;
    let external = pipeline.create_external_texture(&gpu, image_size)?;
    match config.external_format {
        ExternalFormat::Nv12 => {
            let nv12 = Nv12Image::from_rgba(&image);
            external.upload(&gpu, nv12.as_frame())?;
        }
        ExternalFormat::Rgba => external.upload(
            &gpu,
            ExternalFrame::Rgba {
                data: image.as_raw(),
                stride: image.width() * 4,
            },
        )?,
    }

    let surface = create_surface(&gpu, target_size);
    let start = Instant::now();
    pipeline.render_frame(
        &gpu,
        &external,
        0,
        &IDENTITY_MATRIX,
        &SurfaceTarget {
            view: surface.view(),
            format: OFFSCREEN_FORMAT,
            size: target_size,
        },
    )?;
    let rgba = read_texture_rgba(&gpu, &surface)?;
    let elapsed = start.elapsed();
    pipeline.release();

    let output = image::RgbaImage::from_raw(target_size.width, target_size.height, rgba)
        .ok_or("Readback size does not match the output size")?;
    output.save(&options.output)?;

    println!(
        "Output: {} ({}, rendered in {:.1} ms)",
        options.output.display(),
        target_size,
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

/// Merge the config file (if any) with command-line overrides.
///
/// Without a config file the output keeps the input size and frames are fed
/// as RGBA unless `--nv12` is given.
fn resolve_config(
    options: &RenderOptions,
    image_size: Dimensions,
) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &options.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig {
            width: image_size.width,
            height: image_size.height,
            external_format: ExternalFormat::Rgba,
            effects: Vec::new(),
        },
    };

    if !options.effects.is_empty() {
        config.effects = options
            .effects
            .iter()
            .map(|&kind| EffectSpec {
                kind,
                parameter1: options.parameter1,
                parameter2: options.parameter2,
            })
            .collect();
    }
    if let Some((width, height)) = options.size {
        config.width = width;
        config.height = height;
    }
    if options.nv12 {
        config.external_format = ExternalFormat::Nv12;
    }

    config.validate()?;
    Ok(config)
}

/// Offscreen texture standing in for a window surface
fn create_surface(gpu: &GpuContext, size: Dimensions) -> FrameTexture {
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("cli_surface"),
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
