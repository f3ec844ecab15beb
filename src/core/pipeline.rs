/// The timeline pipeline: Scenario → durations → pacing plans → captions.
///
/// Wires together the duration allocator, the pacing ladder, and the
/// caption builder, and writes the resulting artifacts.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::allocator::{Allocation, DurationAllocator, SceneBudget};
use crate::core::caption::{CaptionBuilder, CaptionError, CaptionTrack, NoTranslation, PhrasebookTranslator, Translator};
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::export::write_track;
use crate::core::pacing::{AdjustmentStep, PacingLadder, SceneTimingPlan};
use crate::schema::manifest::{ManifestError, Scenario, VoiceMetadata};

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("caption error: {0}")]
    Caption(#[from] CaptionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub const TIMING_PLAN_FILE: &str = "timing_plan.json";

/// Everything one planning pass produces.
#[derive(Debug, Clone)]
pub struct TimelineOutput {
    pub primary_language: String,
    pub allocation: Allocation,
    pub plans: Vec<SceneTimingPlan>,
    pub tracks: Vec<CaptionTrack>,
}

#[derive(Serialize)]
struct TimingPlanPayload<'a> {
    target_sec: u32,
    bounds_relaxed: bool,
    total_overflow_sec: f64,
    extended_scene_count: usize,
    scenes: &'a [SceneTimingPlan],
}

impl TimelineOutput {
    pub fn track(&self, lang: &str) -> Option<&CaptionTrack> {
        self.tracks.iter().find(|t| t.language == lang)
    }

    pub fn total_overflow_sec(&self) -> f64 {
        self.plans.iter().map(|p| p.overflow_sec).sum()
    }

    pub fn timing_plan_json(&self) -> Result<String, serde_json::Error> {
        let payload = TimingPlanPayload {
            target_sec: self.allocation.target_sec,
            bounds_relaxed: self.allocation.bounds_relaxed,
            total_overflow_sec: self.total_overflow_sec(),
            extended_scene_count: self
                .plans
                .iter()
                .filter(|p| p.adjustment_step == AdjustmentStep::SpeedCompressionSceneExtend)
                .count(),
            scenes: &self.plans,
        };
        let mut json = serde_json::to_string_pretty(&payload)?;
        json.push('\n');
        Ok(json)
    }

    /// Write `timing_plan.json` and every caption track into `out_dir`.
    /// Existing files are overwritten wholesale.
    pub fn write_artifacts(&self, out_dir: &Path) -> Result<Vec<PathBuf>, TimelineError> {
        std::fs::create_dir_all(out_dir)?;
        let plan_path = out_dir.join(TIMING_PLAN_FILE);
        std::fs::write(&plan_path, self.timing_plan_json()?)?;

        let mut written = vec![plan_path];
        for track in &self.tracks {
            let is_primary = track.language == self.primary_language;
            written.extend(write_track(out_dir, track, is_primary)?);
        }
        Ok(written)
    }
}

/// The top-level timeline engine. Built via `TimelineEngine::builder()`.
pub struct TimelineEngine {
    config: EngineConfig,
    translator: Box<dyn Translator>,
    voice: VoiceMetadata,
}

/// Builder for constructing a `TimelineEngine`.
pub struct TimelineEngineBuilder {
    config_path: Option<String>,
    phrasebook_path: Option<String>,
    voice_path: Option<String>,
    /// Directly provided config (for testing without files).
    config: Option<EngineConfig>,
    /// Directly provided translator (for testing without files).
    translator: Option<Box<dyn Translator>>,
    /// Directly provided voice metadata (for testing without files).
    voice: Option<VoiceMetadata>,
}

impl TimelineEngine {
    pub fn builder() -> TimelineEngineBuilder {
        TimelineEngineBuilder {
            config_path: None,
            phrasebook_path: None,
            voice_path: None,
            config: None,
            translator: None,
            voice: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn voice(&self) -> &VoiceMetadata {
        &self.voice
    }

    /// Run allocation, pacing, and caption building for `scenario`.
    ///
    /// `target_sec` overrides the scenario's own target duration.
    pub fn plan(&self, scenario: &Scenario, target_sec: Option<f64>) -> Result<TimelineOutput, TimelineError> {
        if scenario.scenes.is_empty() {
            return Err(ManifestError::EmptySceneList.into());
        }
        let primary = scenario.primary_language.as_str();

        // 1. Allocate scene durations
        let budgets: Vec<SceneBudget> = scenario
            .scenes
            .iter()
            .map(|s| SceneBudget::from_scene(s, primary))
            .collect();
        let allocator = DurationAllocator::new(self.config.pacing.clone());
        let allocation = allocator.allocate(&budgets, target_sec.or(scenario.target_duration_sec));

        // 2. Fit speech into each scene
        let ladder = PacingLadder::new(self.config.pacing.clone());
        let mut cursor = 0.0;
        let mut plans = Vec::with_capacity(scenario.scenes.len());
        for (scene, duration) in scenario.scenes.iter().zip(&allocation.durations_sec) {
            let target = *duration as f64;
            plans.push(ladder.plan(&scene.id, scene.speech_text(primary), target, cursor, None));
            cursor += target;
        }

        // 3. Caption every language
        let builder = CaptionBuilder::new(&self.config.captions, primary, self.translator.as_ref());
        let mut tracks = Vec::with_capacity(scenario.languages.len());
        for lang in &scenario.languages {
            tracks.push(builder.build_track(lang, &scenario.scenes, &plans, &self.voice)?);
        }

        tracing::info!(
            scenes = plans.len(),
            target_sec = allocation.target_sec,
            languages = tracks.len(),
            "timeline planned"
        );
        Ok(TimelineOutput {
            primary_language: primary.to_string(),
            allocation,
            plans,
            tracks,
        })
    }
}

impl TimelineEngineBuilder {
    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    pub fn phrasebook(mut self, path: &str) -> Self {
        self.phrasebook_path = Some(path.to_string());
        self
    }

    pub fn voice_metadata(mut self, path: &str) -> Self {
        self.voice_path = Some(path.to_string());
        self
    }

    /// Provide config directly (for testing without files).
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Provide a translator directly (for testing without files).
    pub fn with_translator(mut self, translator: Box<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Provide voice metadata directly (for testing without files).
    pub fn with_voice(mut self, voice: VoiceMetadata) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn build(self) -> Result<TimelineEngine, TimelineError> {
        // A config file, when named, is required and overrides defaults
        let config = match (self.config, self.config_path) {
            (Some(config), _) => {
                config.validate()?;
                config
            }
            (None, Some(path)) => {
                let path = Path::new(&path);
                if !path.exists() {
                    return Err(ManifestError::Missing(path.to_path_buf()).into());
                }
                EngineConfig::load_from_ron(path)?
            }
            (None, None) => EngineConfig::default(),
        };

        let translator: Box<dyn Translator> = match (self.translator, self.phrasebook_path) {
            (Some(translator), _) => translator,
            (None, Some(path)) => Box::new(PhrasebookTranslator::load_from_ron(Path::new(&path))?),
            (None, None) => Box::new(NoTranslation),
        };

        // Voice metadata is optional: absent or malformed means no ground truth
        let voice = match (self.voice, self.voice_path) {
            (Some(voice), _) => voice,
            (None, Some(path)) => VoiceMetadata::load_lenient(Path::new(&path)),
            (None, None) => VoiceMetadata::default(),
        };

        Ok(TimelineEngine {
            config,
            translator,
            voice,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::caption::TimingSource;
    use crate::schema::manifest::AudioRanges;
    use crate::schema::scene::{SceneAudioRange, SceneId};

    fn scenario() -> Scenario {
        Scenario::parse_json(
            r#"{
                "primaryLanguage": "ko",
                "languages": ["ko", "en"],
                "scenes": [
                    {"id": "scene-01", "narration": {"ko": "씬 하나 설명", "en": "Scene one"}, "durationSec": 5},
                    {"id": "scene-02", "narration": "씬 둘 설명", "durationSec": 5}
                ]
            }"#,
        )
        .unwrap()
    }

    fn voice() -> VoiceMetadata {
        VoiceMetadata {
            duration_seconds: Some(10.0),
            scene_audio_ranges: Some(AudioRanges::Shared(vec![
                SceneAudioRange {
                    scene_id: SceneId::from("scene-01"),
                    start_sec: 0.0,
                    end_sec: 5.0,
                },
                SceneAudioRange {
                    scene_id: SceneId::from("scene-02"),
                    start_sec: 5.0,
                    end_sec: 10.0,
                },
            ])),
        }
    }

    #[test]
    fn plan_end_to_end() {
        let engine = TimelineEngine::builder().with_voice(voice()).build().unwrap();
        let output = engine.plan(&scenario(), None).unwrap();

        assert_eq!(output.allocation.durations_sec, vec![5, 5]);
        assert_eq!(output.plans[1].cue_start, 5.0);
        assert_eq!(output.tracks.len(), 2);

        let ko = output.track("ko").unwrap();
        assert_eq!(ko.timing_source, TimingSource::Voice);
        assert_eq!(ko.alignment.violation_count, 0);
        assert!(ko.alignment.max_delta_sec <= 0.15);

        let en = output.track("en").unwrap();
        assert_eq!(en.timing_source, TimingSource::Plan);
        assert_eq!(en.captions[0].text, "Scene one");
        assert_eq!(en.captions[1].end_sec, 10.0);
    }

    #[test]
    fn target_override_wins() {
        let mut scenario = scenario();
        for scene in &mut scenario.scenes {
            scene.timing = crate::schema::scene::SceneTiming::Unspecified;
        }
        let engine = TimelineEngine::builder().build().unwrap();
        let output = engine.plan(&scenario, Some(7.0)).unwrap();
        assert_eq!(output.allocation.total_sec(), 7);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.retry.max_retries = 0;
        assert!(matches!(
            TimelineEngine::builder().with_config(config).build(),
            Err(TimelineError::Config(_))
        ));
    }

    #[test]
    fn missing_config_file_is_fatal() {
        let result = TimelineEngine::builder().config_path("no/such/config.ron").build();
        assert!(matches!(result, Err(TimelineError::Manifest(ManifestError::Missing(_)))));
    }

    #[test]
    fn planning_is_idempotent() {
        let engine = TimelineEngine::builder().with_voice(voice()).build().unwrap();
        let a = engine.plan(&scenario(), None).unwrap();
        let b = engine.plan(&scenario(), None).unwrap();
        assert_eq!(a.timing_plan_json().unwrap(), b.timing_plan_json().unwrap());
        assert_eq!(a.tracks, b.tracks);
    }
}
