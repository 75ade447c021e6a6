// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH};
use crate::effects::EffectKind;
use crate::errors::{ConfigError, StageResult};
use crate::gpu::{Dimensions, ExternalFormat};
use crate::pipeline::FramePipeline;
use crate::stages::{CompositeStage, StageHandle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One entry of the effect chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Which built-in effect to use
    pub kind: EffectKind,
    /// First scalar control in `[0, 1]`; the effect default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter1: Option<f32>,
    /// Second scalar control in `[0, 1]`; the effect default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter2: Option<f32>,
}

impl EffectSpec {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            parameter1: None,
            parameter2: None,
        }
    }

    pub fn into_stage(self) -> StageHandle {
        self.kind.into_stage(self.parameter1, self.parameter2)
    }
}

impl From<EffectKind> for EffectSpec {
    fn from(kind: EffectKind) -> Self {
        Self::new(kind)
    }
}

/// Frame pipeline settings, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target width of every offscreen stage
    pub width: u32,
    /// Target height of every offscreen stage
    pub height: u32,
    /// Plane layout of the camera frames
    pub external_format: ExternalFormat,
    /// Effect chain, drawn in order
    pub effects: Vec<EffectSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_TARGET_WIDTH,
            height: DEFAULT_TARGET_HEIGHT,
            external_format: ExternalFormat::default(), // NV12, like most cameras
            effects: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        debug!(path = %path.display(), effects = config.effects.len(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject sizes of zero and parameters outside `[0, 1]`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "target size must be non-zero, got {}",
                self.target_size()
            )));
        }

        for (index, spec) in self.effects.iter().enumerate() {
            for value in [spec.parameter1, spec.parameter2].into_iter().flatten() {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::Invalid(format!(
                        "effect #{} ({}) has parameter {} outside [0, 1]",
                        index, spec.kind, value
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn target_size(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Build the effect stage: identity for an empty chain, the stage itself
    /// for a single entry, a composite otherwise
    pub fn build_effect(&self) -> StageResult<StageHandle> {
        match self.effects.as_slice() {
            [] => Ok(EffectKind::Identity.into_stage(None, None)),
            [single] => Ok(single.into_stage()),
            chain => {
                let composite =
                    CompositeStage::from_children(chain.iter().map(|spec| spec.into_stage()))?;
                Ok(StageHandle::new(composite).into_dyn())
            }
        }
    }

    /// Pipeline with this config's effect chain, format and target size
    pub fn build_pipeline(&self) -> StageResult<FramePipeline> {
        let mut pipeline = FramePipeline::new(self.build_effect()?, self.external_format);
        pipeline.set_target_size(self.target_size());
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain_builds_identity() {
        let effect = PipelineConfig::default().build_effect().unwrap();
        assert_eq!(effect.lock().name(), "identity");
    }

    #[test]
    fn test_long_chain_builds_composite() {
        let config = PipelineConfig {
            effects: vec![EffectKind::Mono.into(), EffectKind::Vignette.into()],
            ..Default::default()
        };
        let effect = config.build_effect().unwrap();
        let effect = effect.lock();
        assert_eq!(effect.name(), "composite");
        assert_eq!(effect.children().map(|children| children.len()), Some(2));
    }

    #[test]
    fn test_zero_size_is_invalid() {
        let config = PipelineConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
