/// TTS pacing ladder: fits narration speech into a scene's time budget.
///
/// Mitigations run in a fixed order and stop as soon as the speech fits:
/// speed up (within the rate window), compress text (bounded), and finally
/// extend the scene. Narration is never cut beyond the compression budget;
/// the remaining overflow is recorded instead.

use serde::{Deserialize, Serialize};

use crate::core::config::PacingConfig;
use crate::core::text::clean_char_count;
use crate::schema::scene::SceneId;

const EPSILON: f64 = 1e-9;

/// Highest mitigation step a scene needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdjustmentStep {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "speed")]
    Speed,
    #[serde(rename = "speed+compression")]
    SpeedCompression,
    #[serde(rename = "speed+compression+scene_extend")]
    SpeedCompressionSceneExtend,
}

impl AdjustmentStep {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Speed => "speed",
            Self::SpeedCompression => "speed+compression",
            Self::SpeedCompressionSceneExtend => "speed+compression+scene_extend",
        }
    }
}

/// Result of running the ladder on one narration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingOutcome {
    pub chars: usize,
    /// Characters left after compression.
    pub spoken_chars: usize,
    pub speech_est_sec: f64,
    pub speech_final_sec: f64,
    /// Speaking rate actually applied, in characters per second.
    pub tts_rate: f64,
    pub compression_ratio: f64,
    pub overflow_sec: f64,
    pub fill_ratio: f64,
    pub adjustment_step: AdjustmentStep,
}

/// Per-scene timing derived from allocation and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTimingPlan {
    pub scene_id: SceneId,
    pub target_sec: f64,
    pub speech_est_sec: f64,
    pub speech_final_sec: f64,
    pub fill_ratio: f64,
    pub tts_rate: f64,
    pub overflow_sec: f64,
    pub compression_ratio: f64,
    pub adjustment_step: AdjustmentStep,
    pub cue_start: f64,
    /// Original scene end plus overflow.
    pub cue_end: f64,
}

impl SceneTimingPlan {
    /// Effective scene length including any scene-extend overflow.
    pub fn effective_sec(&self) -> f64 {
        self.cue_end - self.cue_start
    }
}

pub struct PacingLadder {
    config: PacingConfig,
}

impl PacingLadder {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// Resolve speech timing for `text` against `target_sec`.
    ///
    /// `rate_hint` is the preferred speaking rate; it defaults to the
    /// configured default rate and is always clamped into the rate window.
    pub fn resolve(&self, text: &str, target_sec: f64, rate_hint: Option<f64>) -> PacingOutcome {
        let chars = clean_char_count(text);
        if chars == 0 {
            return PacingOutcome {
                chars: 0,
                spoken_chars: 0,
                speech_est_sec: 0.0,
                speech_final_sec: 0.0,
                tts_rate: 0.0,
                compression_ratio: 0.0,
                overflow_sec: 0.0,
                fill_ratio: 0.0,
                adjustment_step: AdjustmentStep::None,
            };
        }
        let n = chars as f64;
        let target = target_sec.max(0.0);

        // Baseline
        let mut rate = self
            .config
            .clamp_rate(rate_hint.unwrap_or(self.config.default_rate));
        let speech_est_sec = n / rate;
        let mut speech = speech_est_sec;
        let mut spoken = chars;
        let mut step = AdjustmentStep::None;

        // Speed
        if speech > target + EPSILON {
            step = AdjustmentStep::Speed;
            let needed = if target > 0.0 { n / target } else { self.config.max_rate };
            rate = self.config.clamp_rate(needed);
            speech = n / rate;
        }

        // Compression
        if speech > target + EPSILON {
            step = AdjustmentStep::SpeedCompression;
            let budget = ((n * self.config.max_compression_ratio).floor() as usize).min(chars - 1);
            let fitting = (target * rate + EPSILON).floor() as usize;
            let removed = chars.saturating_sub(fitting).min(budget);
            spoken = chars - removed;
            speech = spoken as f64 / rate;
        }

        // Scene extend
        if speech > target + EPSILON {
            step = AdjustmentStep::SpeedCompressionSceneExtend;
        }

        let overflow_sec = (speech - target).max(0.0);
        let outcome = PacingOutcome {
            chars,
            spoken_chars: spoken,
            speech_est_sec,
            speech_final_sec: speech,
            tts_rate: rate,
            compression_ratio: (chars - spoken) as f64 / n,
            overflow_sec: if overflow_sec > EPSILON { overflow_sec } else { 0.0 },
            fill_ratio: if target > 0.0 { speech / target } else { 0.0 },
            adjustment_step: step,
        };
        if step == AdjustmentStep::SpeedCompressionSceneExtend {
            tracing::debug!(
                chars,
                target_sec,
                overflow_sec = outcome.overflow_sec,
                "speech exceeds scene budget after mitigation, extending scene"
            );
        }
        outcome
    }

    /// Build the timing plan for a scene placed at `scene_start`.
    pub fn plan(
        &self,
        scene_id: &SceneId,
        text: &str,
        target_sec: f64,
        scene_start: f64,
        rate_hint: Option<f64>,
    ) -> SceneTimingPlan {
        let outcome = self.resolve(text, target_sec, rate_hint);
        SceneTimingPlan {
            scene_id: scene_id.clone(),
            target_sec,
            speech_est_sec: outcome.speech_est_sec,
            speech_final_sec: outcome.speech_final_sec,
            fill_ratio: outcome.fill_ratio,
            tts_rate: outcome.tts_rate,
            overflow_sec: outcome.overflow_sec,
            compression_ratio: outcome.compression_ratio,
            adjustment_step: outcome.adjustment_step,
            cue_start: scene_start,
            cue_end: scene_start + target_sec + outcome.overflow_sec,
        }
    }
}
