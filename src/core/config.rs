/// Engine configuration: policy constants and gate thresholds.
///
/// Every threshold the engine applies lives here so a run can be reproduced
/// or tightened from a RON file without touching code.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Speaking-rate window and compression policy, in characters per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub min_rate: f64,
    pub default_rate: f64,
    pub max_rate: f64,
    /// Largest share of characters the compression step may remove.
    pub max_compression_ratio: f64,
    /// Smallest slot any scene receives, in seconds.
    pub min_scene_sec: f64,
    /// Upper bound on water-filling passes in the allocator.
    pub max_fill_iterations: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_rate: 5.0,
            default_rate: 7.0,
            max_rate: 9.0,
            max_compression_ratio: 0.08,
            min_scene_sec: 1.0,
            max_fill_iterations: 16,
        }
    }
}

impl PacingConfig {
    pub fn clamp_rate(&self, rate: f64) -> f64 {
        rate.clamp(self.min_rate, self.max_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Display-width threshold above which a caption is split in two lines.
    pub max_line_width: usize,
    /// Caption end vs. scene audio end tolerance, in seconds.
    pub boundary_tolerance_sec: f64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            max_line_width: 42,
            boundary_tolerance_sec: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub max_boundary_delta_sec: f64,
    pub max_caption_voice_delta_sec: f64,
    pub min_action_rate: f64,
    pub max_static_frame_ratio: f64,
    pub runtime_budget_minutes: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_boundary_delta_sec: 0.15,
            max_caption_voice_delta_sec: 0.15,
            min_action_rate: 0.9,
            max_static_frame_ratio: 0.35,
            runtime_budget_minutes: 30.0,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pacing: PacingConfig,
    pub captions: CaptionConfig,
    pub retry: RetryConfig,
    pub gates: GateConfig,
}

impl EngineConfig {
    /// Load a config from a RON file. Omitted fields keep their defaults.
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pacing;
        if !(p.min_rate > 0.0 && p.min_rate <= p.default_rate && p.default_rate <= p.max_rate) {
            return Err(ConfigError::Invalid(format!(
                "rates must satisfy 0 < min_rate <= default_rate <= max_rate (got {} / {} / {})",
                p.min_rate, p.default_rate, p.max_rate
            )));
        }
        if !(0.0..1.0).contains(&p.max_compression_ratio) {
            return Err(ConfigError::Invalid(format!(
                "max_compression_ratio must be in [0, 1) (got {})",
                p.max_compression_ratio
            )));
        }
        if p.min_scene_sec < 1.0 {
            return Err(ConfigError::Invalid(
                "min_scene_sec must be at least 1 second".to_string(),
            ));
        }
        if p.max_fill_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_fill_iterations must be positive".to_string(),
            ));
        }
        if self.captions.max_line_width == 0 {
            return Err(ConfigError::Invalid(
                "max_line_width must be positive".to_string(),
            ));
        }
        if self.captions.boundary_tolerance_sec < 0.0 {
            return Err(ConfigError::Invalid(
                "boundary_tolerance_sec must not be negative".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_retries must be at least 1".to_string(),
            ));
        }
        let g = &self.gates;
        if g.max_boundary_delta_sec < 0.0 || g.max_caption_voice_delta_sec < 0.0 {
            return Err(ConfigError::Invalid(
                "gate delta thresholds must not be negative".to_string(),
            ));
        }
        if g.runtime_budget_minutes <= 0.0 {
            return Err(ConfigError::Invalid(
                "runtime_budget_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
