// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for effect chains drawn on the GPU

mod common;

use camera_compositor::constants::IDENTITY_MATRIX;
use camera_compositor::stages::ParameterSlot;
use camera_compositor::{CompositeStage, Dimensions, EffectKind, FrameTexture, RenderStage};

const SIZE: Dimensions = Dimensions::new(32, 32);

#[test]
fn test_identity_chain_reproduces_input() {
    let Some(gpu) = common::gpu() else { return };

    let input_rgba = common::gradient(SIZE);
    let input = FrameTexture::from_rgba(&gpu, SIZE, &input_rgba).unwrap();
    let mut composite = CompositeStage::from_children([
        EffectKind::Identity.into_stage(None, None),
        EffectKind::Identity.into_stage(None, None),
    ])
    .unwrap();
    composite.set_size(SIZE);
    composite.create(&gpu).unwrap();

    let mut frame = gpu.begin_frame("identity_chain");
    let output = composite
        .draw_offscreen(&mut frame, &input, 0, &IDENTITY_MATRIX)
        .unwrap();
    frame.submit();

    assert_ne!(output.id(), input.id());
    assert!(common::max_difference(&common::read(&gpu, &output), &input_rgba) <= 1);
}

#[test]
fn test_empty_composite_returns_its_input() {
    let Some(gpu) = common::gpu() else { return };

    let input = FrameTexture::from_rgba(&gpu, SIZE, &common::gradient(SIZE)).unwrap();
    let mut composite = CompositeStage::new();
    composite.set_size(SIZE);
    composite.create(&gpu).unwrap();

    let mut frame = gpu.begin_frame("empty_chain");
    let output = composite
        .draw_offscreen(&mut frame, &input, 0, &IDENTITY_MATRIX)
        .unwrap();

    assert_eq!(output.id(), input.id());
}

#[test]
fn test_chain_applies_children_in_order() {
    let Some(gpu) = common::gpu() else { return };

    // Negative then posterize to two levels: dark input ends up white
    let input = FrameTexture::from_rgba(&gpu, SIZE, &common::solid(SIZE, [20, 20, 20, 255]))
        .unwrap();
    let mut composite = CompositeStage::from_children([
        EffectKind::Negative.into_stage(None, None),
        EffectKind::Posterize.into_stage(Some(0.0), None),
    ])
    .unwrap();
    composite.set_size(SIZE);

    let mut frame = gpu.begin_frame("ordered_chain");
    let output = composite
        .draw_offscreen(&mut frame, &input, 0, &IDENTITY_MATRIX)
        .unwrap();
    frame.submit();

    let expected = common::solid(SIZE, [255, 255, 255, 255]);
    assert_eq!(common::max_difference(&common::read(&gpu, &output), &expected), 0);
}

#[test]
fn test_parameters_reach_children_that_support_them() {
    let Some(gpu) = common::gpu() else { return };

    let fill_light = EffectKind::FillLight.into_stage(None, None);
    let mono = EffectKind::Mono.into_stage(None, None);
    let mut composite =
        CompositeStage::from_children([fill_light.clone(), mono.clone()]).unwrap();
    composite.set_parameter(ParameterSlot::First, 0.9);
    composite.set_size(SIZE);
    composite.create(&gpu).unwrap();

    assert_eq!(
        fill_light.lock().parameter(ParameterSlot::First),
        Some(0.9)
    );
    assert_eq!(mono.lock().parameter(ParameterSlot::First), None);
    assert_eq!(fill_light.lock().size(), Some(SIZE));
}

#[test]
fn test_chain_applies_transform_once() {
    let Some(gpu) = common::gpu() else { return };

    let input_rgba = common::gradient(SIZE);
    let input = FrameTexture::from_rgba(&gpu, SIZE, &input_rgba).unwrap();
    let mut composite = CompositeStage::from_children([
        EffectKind::Identity.into_stage(None, None),
        EffectKind::Identity.into_stage(None, None),
    ])
    .unwrap();
    composite.set_size(SIZE);
    composite.create(&gpu).unwrap();

    let mut frame = gpu.begin_frame("mirrored_chain");
    let output = composite
        .draw_offscreen(&mut frame, &input, 0, &common::MIRROR_MATRIX)
        .unwrap();
    frame.submit();

    // Two flips would cancel out and leave the input unchanged
    let expected = common::mirror(SIZE, &input_rgba);
    assert!(common::max_difference(&common::read(&gpu, &output), &expected) <= 1);
}
