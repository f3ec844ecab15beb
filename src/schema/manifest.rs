/// Collaborator artifacts: scenario manifests and voice-synthesis metadata.
///
/// External JSON is normalized into strongly typed records here; nothing
/// past this module sees raw collaborator payloads.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::scene::{Narration, Scene, SceneAudioRange, SceneId, SceneTiming};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("required artifact not found: {0}")]
    Missing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scenario has no scenes")]
    EmptySceneList,
    #[error("scene {0} has no narration")]
    MissingNarration(SceneId),
    #[error("scene id {0} appears more than once")]
    DuplicateScene(SceneId),
    #[error("scene {scene}: invalid timing ({detail})")]
    InvalidTiming { scene: SceneId, detail: String },
    #[error("voice metadata has no positive durationSeconds")]
    MissingDuration,
}

/// Read a required artifact, naming it when it does not exist.
pub fn read_required(path: &Path) -> Result<String, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::Missing(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Read an optional JSON artifact. Missing or unparsable files are absent.
pub fn read_json_lenient(path: &Path) -> Option<serde_json::Value> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "optional artifact not readable");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "ignoring malformed artifact");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScene {
    #[serde(alias = "sceneId")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    narration: Option<Narration>,
    #[serde(default)]
    duration_sec: Option<f64>,
    #[serde(default)]
    start_sec: Option<f64>,
    #[serde(default)]
    end_sec: Option<f64>,
    #[serde(default)]
    time_range: Option<String>,
    #[serde(default)]
    subtitle_cue: Option<String>,
}

impl RawScene {
    fn into_scene(self) -> Result<Scene, ManifestError> {
        let id = SceneId(self.id);
        let narration = match self.narration {
            Some(n) if !n.is_empty() => n,
            _ => return Err(ManifestError::MissingNarration(id)),
        };
        let invalid = |detail: &str| ManifestError::InvalidTiming {
            scene: id.clone(),
            detail: detail.to_string(),
        };

        // Explicit duration wins over a placement range.
        let timing = if let Some(sec) = self.duration_sec {
            if sec.is_nan() || sec <= 0.0 {
                return Err(invalid("durationSec must be positive"));
            }
            SceneTiming::Duration(sec)
        } else if let (Some(start_sec), Some(end_sec)) = (self.start_sec, self.end_sec) {
            if end_sec <= start_sec || start_sec < 0.0 {
                return Err(invalid("endSec must be after startSec"));
            }
            SceneTiming::Range { start_sec, end_sec }
        } else if let Some(ref range) = self.time_range {
            SceneTiming::parse_range(range).ok_or_else(|| invalid(range))?
        } else {
            SceneTiming::Unspecified
        };

        Ok(Scene {
            id,
            title: self.title,
            narration,
            timing,
            subtitle_cue: self.subtitle_cue.filter(|c| !c.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScenario {
    #[serde(default)]
    primary_language: Option<String>,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default)]
    target_duration_sec: Option<f64>,
    #[serde(default)]
    scenes: Vec<RawScene>,
}

/// The ordered scene script for one pipeline run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub primary_language: String,
    /// Caption languages; always starts with the primary language.
    pub languages: Vec<String>,
    pub target_duration_sec: Option<f64>,
    pub scenes: Vec<Scene>,
}

pub const DEFAULT_LANGUAGE: &str = "ko";

impl Scenario {
    pub fn load(path: &Path) -> Result<Scenario, ManifestError> {
        let contents = read_required(path)?;
        Self::parse_json(&contents)
    }

    pub fn parse_json(input: &str) -> Result<Scenario, ManifestError> {
        let raw: RawScenario = serde_json::from_str(input)?;
        if raw.scenes.is_empty() {
            return Err(ManifestError::EmptySceneList);
        }

        let mut seen = HashSet::new();
        let mut scenes = Vec::with_capacity(raw.scenes.len());
        for raw_scene in raw.scenes {
            let scene = raw_scene.into_scene()?;
            if !seen.insert(scene.id.clone()) {
                return Err(ManifestError::DuplicateScene(scene.id));
            }
            scenes.push(scene);
        }

        let primary_language = raw
            .primary_language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let mut languages = vec![primary_language.clone()];
        for lang in raw.languages {
            if !lang.trim().is_empty() && !languages.contains(&lang) {
                languages.push(lang);
            }
        }

        Ok(Scenario {
            primary_language,
            languages,
            target_duration_sec: raw.target_duration_sec,
            scenes,
        })
    }

    pub fn scene_ids(&self) -> Vec<SceneId> {
        self.scenes.iter().map(|s| s.id.clone()).collect()
    }
}

/// Scene audio ranges, either shared by the primary track or keyed by language.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AudioRanges {
    Shared(Vec<SceneAudioRange>),
    PerLanguage(BTreeMap<String, Vec<SceneAudioRange>>),
}

/// Metadata written by the voice-synthesis collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceMetadata {
    pub duration_seconds: Option<f64>,
    pub scene_audio_ranges: Option<AudioRanges>,
}

impl VoiceMetadata {
    /// Load as an optional collaborator: absent or malformed input yields
    /// empty metadata, malformed keys are dropped individually.
    pub fn load_lenient(path: &Path) -> VoiceMetadata {
        read_json_lenient(path)
            .map(|value| Self::from_value(&value))
            .unwrap_or_default()
    }

    /// Load as a required collaborator: the file must exist, parse, and
    /// carry a positive `durationSeconds`.
    pub fn load(path: &Path) -> Result<VoiceMetadata, ManifestError> {
        let contents = read_required(path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        let meta = Self::from_value(&value);
        if meta.duration_seconds.is_none() {
            return Err(ManifestError::MissingDuration);
        }
        Ok(meta)
    }

    pub fn from_value(value: &serde_json::Value) -> VoiceMetadata {
        let duration_seconds = value
            .get("durationSeconds")
            .and_then(serde_json::Value::as_f64)
            .filter(|d| *d > 0.0);
        let scene_audio_ranges = value.get("sceneAudioRanges").and_then(|v| {
            match serde_json::from_value::<AudioRanges>(v.clone()) {
                Ok(ranges) => Some(ranges),
                Err(err) => {
                    tracing::warn!(%err, "ignoring malformed sceneAudioRanges");
                    None
                }
            }
        });
        VoiceMetadata {
            duration_seconds,
            scene_audio_ranges,
        }
    }

    /// Ground-truth ranges for a caption language, if the synthesizer
    /// provided any. A shared list belongs to the primary language.
    pub fn ranges_for(&self, lang: &str, primary: &str) -> Option<&[SceneAudioRange]> {
        let ranges = match self.scene_audio_ranges.as_ref()? {
            AudioRanges::Shared(list) if lang == primary => list.as_slice(),
            AudioRanges::Shared(_) => return None,
            AudioRanges::PerLanguage(map) => map.get(lang)?.as_slice(),
        };
        if ranges.is_empty() {
            None
        } else {
            Some(ranges)
        }
    }
}
