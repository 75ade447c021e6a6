// SPDX-License-Identifier: GPL-3.0-only

//! Built-in effects
//!
//! Scalar controls are normalised to `[0, 1]` so a composite can fan one value
//! out to every child; each effect maps the value onto its own range.

use crate::shaders;
use crate::stages::{Capabilities, Effect, EffectStage, ParameterSlot, StageHandle};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Passes its input through unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Identity;

impl Effect for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn fragment_shader(&self) -> Cow<'static, str> {
        Cow::Borrowed(shaders::PASSTHROUGH_FRAGMENT)
    }
}

/// Brightens dark regions while leaving highlights alone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillLight {
    strength: f32,
}

impl Default for FillLight {
    fn default() -> Self {
        Self { strength: 0.5 }
    }
}

impl FillLight {
    const FADE_GAMMA: f32 = 0.3;

    pub fn new(strength: f32) -> Self {
        let mut effect = Self::default();
        effect.set_strength(strength);
        effect
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// 0.0 leaves the image unchanged, 1.0 is the strongest fill.
    /// Non-finite values are ignored.
    pub fn set_strength(&mut self, strength: f32) {
        if let Some(strength) = unit(strength) {
            self.strength = strength;
        }
    }

    /// `(mult, igamma)` uploaded to the shader
    fn curve(&self) -> (f32, f32) {
        let amount = 1.0 - self.strength;
        let mult = 1.0 / (amount * 0.7 + 0.3);
        let faded = Self::FADE_GAMMA + (1.0 - Self::FADE_GAMMA) * mult;
        (mult, 1.0 / faded)
    }
}

impl Effect for FillLight {
    fn name(&self) -> &'static str {
        "fill_light"
    }

    fn fragment_shader(&self) -> Cow<'static, str> {
        Cow::Borrowed(shaders::FILL_LIGHT_FRAGMENT)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ONE_PARAMETER
    }

    fn parameter(&self, slot: ParameterSlot) -> Option<f32> {
        (slot == ParameterSlot::First).then_some(self.strength)
    }

    fn set_parameter(&mut self, slot: ParameterSlot, value: f32) {
        if slot == ParameterSlot::First {
            self.set_strength(value);
        }
    }

    fn shader_parameters(&self) -> [f32; 2] {
        let (mult, igamma) = self.curve();
        [mult, igamma]
    }
}

/// Luminance only
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mono;

impl Effect for Mono {
    fn name(&self) -> &'static str {
        "mono"
    }

    fn fragment_shader(&self) -> Cow<'static, str> {
        Cow::Borrowed(shaders::MONO_FRAGMENT)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sepia;

impl Effect for Sepia {
    fn name(&self) -> &'static str {
        "sepia"
    }

    fn fragment_shader(&self) -> Cow<'static, str> {
        Cow::Borrowed(shaders::SEPIA_FRAGMENT)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Negative;

impl Effect for Negative {
    fn name(&self) -> &'static str {
        "negative"
    }

    fn fragment_shader(&self) -> Cow<'static, str> {
        Cow::Borrowed(shaders::NEGATIVE_FRAGMENT)
    }
}

/// Reduces every channel to a fixed number of levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posterize {
    levels: u32,
}

impl Default for Posterize {
    fn default() -> Self {
        Self { levels: 10 }
    }
}

impl Posterize {
    pub const MIN_LEVELS: u32 = 2;
    pub const MAX_LEVELS: u32 = 64;

    pub fn new(levels: u32) -> Self {
        Self {
            levels: levels.clamp(Self::MIN_LEVELS, Self::MAX_LEVELS),
        }
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    fn normalized(&self) -> f32 {
        (self.levels - Self::MIN_LEVELS) as f32 / (Self::MAX_LEVELS - Self::MIN_LEVELS) as f32
    }
}

impl Effect for Posterize {
    fn name(&self) -> &'static str {
        "posterize"
    }

    fn fragment_shader(&self) -> Cow<'static, str> {
        Cow::Borrowed(shaders::POSTERIZE_FRAGMENT)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ONE_PARAMETER
    }

    fn parameter(&self, slot: ParameterSlot) -> Option<f32> {
        (slot == ParameterSlot::First).then(|| self.normalized())
    }

    fn set_parameter(&mut self, slot: ParameterSlot, value: f32) {
        if slot == ParameterSlot::First
            && let Some(value) = unit(value)
        {
            let span = (Self::MAX_LEVELS - Self::MIN_LEVELS) as f32;
            let levels = (Self::MIN_LEVELS as f32 + value * span).round() as u32;
            self.levels = levels.clamp(Self::MIN_LEVELS, Self::MAX_LEVELS);
        }
    }

    fn shader_parameters(&self) -> [f32; 2] {
        [self.levels as f32, 0.0]
    }
}

/// Darkens the corners of the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vignette {
    scale: f32,
    shade: f32,
}

impl Default for Vignette {
    fn default() -> Self {
        Self {
            scale: 0.85,
            shade: 0.5,
        }
    }
}

impl Vignette {
    pub fn new(scale: f32, shade: f32) -> Self {
        let mut vignette = Self::default();
        vignette.set_parameter(ParameterSlot::First, scale);
        vignette.set_parameter(ParameterSlot::Second, shade);
        vignette
    }

    /// Size of the unshaded centre
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Darkening applied at the edges
    pub fn shade(&self) -> f32 {
        self.shade
    }
}

impl Effect for Vignette {
    fn name(&self) -> &'static str {
        "vignette"
    }

    fn fragment_shader(&self) -> Cow<'static, str> {
        Cow::Borrowed(shaders::VIGNETTE_FRAGMENT)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TWO_PARAMETERS
    }

    fn parameter(&self, slot: ParameterSlot) -> Option<f32> {
        Some(match slot {
            ParameterSlot::First => self.scale,
            ParameterSlot::Second => self.shade,
        })
    }

    fn set_parameter(&mut self, slot: ParameterSlot, value: f32) {
        let Some(value) = unit(value) else {
            return;
        };
        match slot {
            ParameterSlot::First => self.scale = value,
            ParameterSlot::Second => self.shade = value,
        }
    }

    fn shader_parameters(&self) -> [f32; 2] {
        [self.scale, self.shade]
    }
}

/// `value` clamped to `[0, 1]`, or `None` for NaN and infinities
fn unit(value: f32) -> Option<f32> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// Built-in effect selector used by configuration files and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Identity,
    FillLight,
    Mono,
    Sepia,
    Negative,
    Posterize,
    Vignette,
}

impl EffectKind {
    pub const ALL: [EffectKind; 7] = [
        EffectKind::Identity,
        EffectKind::FillLight,
        EffectKind::Mono,
        EffectKind::Sepia,
        EffectKind::Negative,
        EffectKind::Posterize,
        EffectKind::Vignette,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Identity => "identity",
            EffectKind::FillLight => "fill_light",
            EffectKind::Mono => "mono",
            EffectKind::Sepia => "sepia",
            EffectKind::Negative => "negative",
            EffectKind::Posterize => "posterize",
            EffectKind::Vignette => "vignette",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EffectKind::Identity => "No change",
            EffectKind::FillLight => "Lift shadows (parameter 1: strength)",
            EffectKind::Mono => "Black and white",
            EffectKind::Sepia => "Warm brown tones",
            EffectKind::Negative => "Inverted colors",
            EffectKind::Posterize => "Reduced color levels (parameter 1: levels)",
            EffectKind::Vignette => "Darkened corners (parameter 1: scale, parameter 2: shade)",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            EffectKind::FillLight | EffectKind::Posterize => Capabilities::ONE_PARAMETER,
            EffectKind::Vignette => Capabilities::TWO_PARAMETERS,
            _ => Capabilities::NONE,
        }
    }

    /// Build a stage with default settings, then apply whichever parameters
    /// are given and supported
    pub fn into_stage(self, parameter1: Option<f32>, parameter2: Option<f32>) -> StageHandle {
        let handle = match self {
            EffectKind::Identity => StageHandle::new(EffectStage::new(Identity)).into_dyn(),
            EffectKind::FillLight => {
                StageHandle::new(EffectStage::new(FillLight::default())).into_dyn()
            }
            EffectKind::Mono => StageHandle::new(EffectStage::new(Mono)).into_dyn(),
            EffectKind::Sepia => StageHandle::new(EffectStage::new(Sepia)).into_dyn(),
            EffectKind::Negative => StageHandle::new(EffectStage::new(Negative)).into_dyn(),
            EffectKind::Posterize => {
                StageHandle::new(EffectStage::new(Posterize::default())).into_dyn()
            }
            EffectKind::Vignette => {
                StageHandle::new(EffectStage::new(Vignette::default())).into_dyn()
            }
        };

        {
            let mut stage = handle.lock();
            for (slot, value) in ParameterSlot::ALL.into_iter().zip([parameter1, parameter2]) {
                if let Some(value) = value {
                    stage.set_parameter(slot, value);
                }
            }
        }
        handle
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        EffectKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = EffectKind::ALL.iter().map(|kind| kind.name()).collect();
                format!("unknown effect '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}
