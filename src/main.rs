// SPDX-License-Identifier: GPL-3.0-only

use camera_compositor::EffectKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-compositor")]
#[command(about = "Run still images through the camera effect pipeline")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in effects
    Effects,

    /// Render an image through the pipeline and save the result
    Render {
        /// Input image (any format the image crate decodes)
        #[arg(short, long)]
        input: PathBuf,

        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Effect to apply; repeat to build a chain (overrides --config effects)
        #[arg(short, long = "effect")]
        effects: Vec<EffectKind>,

        /// First effect parameter in [0, 1], applied to every effect given with --effect
        #[arg(long)]
        parameter1: Option<f32>,

        /// Second effect parameter in [0, 1], applied to every effect given with --effect
        #[arg(long)]
        parameter2: Option<f32>,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output width (default: config or input width)
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Output height (default: config or input height)
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Feed the image as NV12, like a camera would
        #[arg(long)]
        nv12: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_compositor=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Effects => cli::list_effects(),
        Commands::Render {
            input,
            output,
            effects,
            parameter1,
            parameter2,
            config,
            width,
            height,
            nv12,
        } => cli::render_image(cli::RenderOptions {
            input,
            output,
            effects,
            parameter1,
            parameter2,
            config,
            size: width.zip(height),
            nv12,
        }),
    }
}
