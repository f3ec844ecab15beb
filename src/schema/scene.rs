use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Newtype wrapper for stable scene identifiers (e.g. `scene-01`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Narration text for a scene, either a single source-language string or
/// an explicit map of language code to text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Narration {
    Single(String),
    PerLanguage(BTreeMap<String, String>),
}

impl Default for Narration {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl Narration {
    /// Explicit narration for `lang`, if any. A `Single` narration belongs to
    /// the primary language.
    pub fn explicit(&self, lang: &str, primary: &str) -> Option<&str> {
        let text = match self {
            Self::Single(text) if lang == primary => Some(text.as_str()),
            Self::Single(_) => None,
            Self::PerLanguage(map) => map.get(lang).map(String::as_str),
        };
        text.filter(|t| !t.trim().is_empty())
    }

    /// Source-language text: the primary entry, else the first non-empty entry.
    pub fn source(&self, primary: &str) -> Option<&str> {
        match self {
            Self::Single(text) => Some(text.as_str()).filter(|t| !t.trim().is_empty()),
            Self::PerLanguage(map) => map
                .get(primary)
                .filter(|t| !t.trim().is_empty())
                .or_else(|| map.values().find(|t| !t.trim().is_empty()))
                .map(String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(text) => text.trim().is_empty(),
            Self::PerLanguage(map) => map.values().all(|t| t.trim().is_empty()),
        }
    }
}

/// Scene timing as declared by the scenario, normalized at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SceneTiming {
    /// No explicit timing; the allocator decides.
    #[default]
    Unspecified,
    /// Explicit length in seconds.
    Duration(f64),
    /// Explicit placement on the scenario clock.
    Range { start_sec: f64, end_sec: f64 },
}

impl SceneTiming {
    /// Pinned duration in seconds, when the scenario fixed one.
    pub fn duration_sec(&self) -> Option<f64> {
        match *self {
            Self::Unspecified => None,
            Self::Duration(sec) => Some(sec),
            Self::Range { start_sec, end_sec } => Some(end_sec - start_sec),
        }
    }

    /// Parse a `MM:SS-MM:SS` (or `HH:MM:SS`, or plain seconds) range.
    pub fn parse_range(value: &str) -> Option<SceneTiming> {
        let (start, end) = value.split_once('-')?;
        let start_sec = parse_clock(start)?;
        let end_sec = parse_clock(end)?;
        if end_sec <= start_sec {
            return None;
        }
        Some(Self::Range { start_sec, end_sec })
    }
}

/// Parse `SS`, `MM:SS` or `HH:MM:SS` (seconds may carry a fraction).
fn parse_clock(value: &str) -> Option<f64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut total = 0.0;
    for part in &parts {
        let n: f64 = part.trim().parse().ok()?;
        if n < 0.0 {
            return None;
        }
        total = total * 60.0 + n;
    }
    Some(total)
}

/// An ordered unit of narration with its own time budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    #[serde(default)]
    pub title: String,
    pub narration: Narration,
    #[serde(default)]
    pub timing: SceneTiming,
    #[serde(default)]
    pub subtitle_cue: Option<String>,
}

impl Scene {
    pub fn new(id: &str, narration: &str) -> Self {
        Self {
            id: SceneId::from(id),
            title: String::new(),
            narration: Narration::Single(narration.to_string()),
            timing: SceneTiming::Unspecified,
            subtitle_cue: None,
        }
    }

    pub fn with_duration(mut self, sec: f64) -> Self {
        self.timing = SceneTiming::Duration(sec);
        self
    }

    /// Text that drives speech timing: the source-language narration.
    pub fn speech_text(&self, primary: &str) -> &str {
        self.narration.source(primary).unwrap_or("")
    }
}

/// Ground-truth audio placement of one scene, owned by the voice synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAudioRange {
    pub scene_id: SceneId,
    pub start_sec: f64,
    pub end_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narration_from_string_or_map() {
        let single: Narration = serde_json::from_str(r#""씬 하나 설명""#).unwrap();
        assert_eq!(single.explicit("ko", "ko"), Some("씬 하나 설명"));
        assert_eq!(single.explicit("en", "ko"), None);

        let map: Narration =
            serde_json::from_str(r#"{"ko": "안녕하세요", "en": "Hello"}"#).unwrap();
        assert_eq!(map.explicit("en", "ko"), Some("Hello"));
        assert_eq!(map.source("ko"), Some("안녕하세요"));
        assert_eq!(map.explicit("ja", "ko"), None);
    }

    #[test]
    fn blank_narration_is_empty() {
        assert!(Narration::Single("   ".to_string()).is_empty());
        let map = Narration::PerLanguage(BTreeMap::from([("en".to_string(), "".to_string())]));
        assert!(map.is_empty());
        assert_eq!(map.source("en"), None);
    }

    #[test]
    fn source_falls_back_to_first_non_empty() {
        let map = Narration::PerLanguage(BTreeMap::from([
            ("en".to_string(), "Hello".to_string()),
            ("ko".to_string(), " ".to_string()),
        ]));
        assert_eq!(map.source("ko"), Some("Hello"));
    }

    #[test]
    fn parse_time_ranges() {
        assert_eq!(
            SceneTiming::parse_range("00:05-00:12"),
            Some(SceneTiming::Range {
                start_sec: 5.0,
                end_sec: 12.0
            })
        );
        assert_eq!(
            SceneTiming::parse_range("0:01:00 - 0:01:30.5")
                .and_then(|t| t.duration_sec()),
            Some(30.5)
        );
        assert_eq!(SceneTiming::parse_range("00:10-00:05"), None);
        assert_eq!(SceneTiming::parse_range("garbage"), None);
    }

    #[test]
    fn audio_range_camel_case() {
        let range: SceneAudioRange =
            serde_json::from_str(r#"{"sceneId": "s1", "startSec": 0.0, "endSec": 5.0}"#).unwrap();
        assert_eq!(range.scene_id, SceneId::from("s1"));
        assert_eq!(range.end_sec, 5.0);
    }
}
