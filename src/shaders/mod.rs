// SPDX-License-Identifier: GPL-3.0-only
//! WGSL sources for the stage programs
//!
//! Every stage program is assembled from three parts concatenated at runtime:
//! the shared bindings in [`STAGE_COMMON`], a vertex stage (usually generated
//! by [`crate::stages::default_vertex_shader`]) and a fragment stage. Fragment
//! code reads its input through `input_texture` / `input_sampler` and its
//! scalar controls through `stage.parameters`.

/// Bindings shared by every stage: input texture, sampler and uniforms
pub const STAGE_COMMON: &str = include_str!("stage/common.wgsl");

/// Copies the input unchanged (identity effect, display, RGBA conversion)
pub const PASSTHROUGH_FRAGMENT: &str = include_str!("stage/passthrough.wgsl");

/// NV12 to RGB conversion; binds the chroma plane at `@binding(3)`
pub const NV12_CONVERSION_FRAGMENT: &str = include_str!("stage/convert_nv12.wgsl");

pub const FILL_LIGHT_FRAGMENT: &str = include_str!("stage/fill_light.wgsl");
pub const MONO_FRAGMENT: &str = include_str!("stage/mono.wgsl");
pub const SEPIA_FRAGMENT: &str = include_str!("stage/sepia.wgsl");
pub const NEGATIVE_FRAGMENT: &str = include_str!("stage/negative.wgsl");
pub const POSTERIZE_FRAGMENT: &str = include_str!("stage/posterize.wgsl");
pub const VIGNETTE_FRAGMENT: &str = include_str!("stage/vignette.wgsl");

/// Full module source of a stage program
pub fn stage_module_source(vertex: &str, fragment: &str) -> String {
    format!("{}\n{}\n{}", STAGE_COMMON, vertex, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{ShaderNames, default_vertex_shader};

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {:?}", name, e);
            }
        }
    }

    fn with_default_vertex(fragment: &str) -> String {
        stage_module_source(&default_vertex_shader(&ShaderNames::default()), fragment)
    }

    #[test]
    fn test_passthrough_shader_validates() {
        validate_shader("passthrough", &with_default_vertex(PASSTHROUGH_FRAGMENT));
    }

    #[test]
    fn test_nv12_conversion_shader_validates() {
        validate_shader(
            "nv12_conversion",
            &with_default_vertex(NV12_CONVERSION_FRAGMENT),
        );
    }

    #[test]
    fn test_effect_shaders_validate() {
        for (name, fragment) in [
            ("fill_light", FILL_LIGHT_FRAGMENT),
            ("mono", MONO_FRAGMENT),
            ("sepia", SEPIA_FRAGMENT),
            ("negative", NEGATIVE_FRAGMENT),
            ("posterize", POSTERIZE_FRAGMENT),
            ("vignette", VIGNETTE_FRAGMENT),
        ] {
            validate_shader(name, &with_default_vertex(fragment));
        }
    }

    #[test]
    fn test_custom_names_generate_valid_vertex_stage() {
        let names = ShaderNames::new("in_pos", "in_uv", "frag_uv");
        let fragment = PASSTHROUGH_FRAGMENT.replace("v_tex_coord", "frag_uv");
        validate_shader(
            "custom_names",
            &stage_module_source(&default_vertex_shader(&names), &fragment),
        );
    }
}
