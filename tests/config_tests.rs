// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the pipeline configuration

use camera_compositor::constants::{DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH};
use camera_compositor::stages::ParameterSlot;
use camera_compositor::{
    ConfigError, Dimensions, EffectKind, EffectSpec, ExternalFormat, PipelineConfig,
    PipelineState,
};

#[test]
fn test_config_default() {
    let config = PipelineConfig::default();
    assert_eq!(
        config.target_size(),
        Dimensions::new(DEFAULT_TARGET_WIDTH, DEFAULT_TARGET_HEIGHT)
    );
    assert_eq!(config.external_format, ExternalFormat::Nv12);
    assert!(config.effects.is_empty());
}

#[test]
fn test_config_parses_partial_json() {
    let config = PipelineConfig::from_json(
        r#"{
            "width": 640,
            "height": 480,
            "effects": [
                { "kind": "fill_light", "parameter1": 0.8 },
                { "kind": "vignette", "parameter1": 0.5, "parameter2": 0.9 }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(config.target_size(), Dimensions::new(640, 480));
    assert_eq!(config.external_format, ExternalFormat::Nv12);
    assert_eq!(config.effects.len(), 2);
    assert_eq!(config.effects[0].kind, EffectKind::FillLight);
    assert_eq!(config.effects[0].parameter1, Some(0.8));
    assert_eq!(config.effects[0].parameter2, None);
}

#[test]
fn test_config_rejects_unknown_effect() {
    let result = PipelineConfig::from_json(r#"{ "effects": [ { "kind": "blur" } ] }"#);
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_config_rejects_out_of_range_parameter() {
    let json = r#"{ "effects": [ { "kind": "posterize", "parameter1": 4.0 } ] }"#;
    let result = PipelineConfig::from_json(json);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_config_save_and_load() {
    let path = std::env::temp_dir().join(format!(
        "camera_compositor_config_{}.json",
        std::process::id()
    ));
    let config = PipelineConfig {
        width: 320,
        height: 240,
        external_format: ExternalFormat::Rgba,
        effects: vec![EffectSpec::new(EffectKind::Sepia)],
    };

    config.save(&path).unwrap();
    let loaded = PipelineConfig::load(&path);
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.unwrap(), config);
}

#[test]
fn test_config_load_missing_file() {
    let result = PipelineConfig::load("/nonexistent/camera_compositor.json");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_build_pipeline_applies_settings() {
    let config = PipelineConfig {
        width: 96,
        height: 64,
        external_format: ExternalFormat::Rgba,
        effects: vec![EffectSpec {
            kind: EffectKind::FillLight,
            parameter1: Some(0.25),
            parameter2: None,
        }],
    };

    let pipeline = config.build_pipeline().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Uninitialized);
    assert_eq!(pipeline.external_format(), ExternalFormat::Rgba);
    assert_eq!(pipeline.target_size(), Some(Dimensions::new(96, 64)));

    let effect = pipeline.effect();
    let effect = effect.lock();
    assert_eq!(effect.name(), "fill_light");
    assert_eq!(effect.parameter(ParameterSlot::First), Some(0.25));
}
