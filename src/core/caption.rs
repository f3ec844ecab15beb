/// Caption building: per-language cue text, timing, wrapping, and
/// alignment against the voice synthesizer's scene boundaries.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::config::CaptionConfig;
use crate::core::pacing::SceneTimingPlan;
use crate::core::text::{script_contamination_ratio, wrap_caption};
use crate::schema::manifest::VoiceMetadata;
use crate::schema::scene::{Scene, SceneAudioRange, SceneId};

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("no scenes to caption")]
    NoScenes,
    #[error("expected {expected} timing plans, got {actual}")]
    PlanMismatch { expected: usize, actual: usize },
    #[error("timing plan {plan} does not match scene {scene}")]
    PlanOrder { scene: SceneId, plan: SceneId },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Translation helper consulted when a scene has no explicit narration for
/// a caption language.
pub trait Translator {
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<String>;
}

/// Translator that never translates; captions fall back to source text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslation;

impl Translator for NoTranslation {
    fn translate(&self, _text: &str, _source_lang: &str, _target_lang: &str) -> Option<String> {
        None
    }
}

/// Exact-match phrase table keyed by target language, then source text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhrasebookTranslator {
    pub entries: BTreeMap<String, BTreeMap<String, String>>,
}

impl PhrasebookTranslator {
    pub fn load_from_ron(path: &Path) -> Result<PhrasebookTranslator, CaptionError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<PhrasebookTranslator, CaptionError> {
        let entries: BTreeMap<String, BTreeMap<String, String>> = ron::from_str(input)?;
        Ok(PhrasebookTranslator { entries })
    }
}

impl Translator for PhrasebookTranslator {
    fn translate(&self, text: &str, _source_lang: &str, target_lang: &str) -> Option<String> {
        self.entries
            .get(target_lang)?
            .get(text.trim())
            .filter(|t| !t.trim().is_empty())
            .cloned()
    }
}

/// Where a track's cue times came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingSource {
    /// Scene audio ranges reported by the voice synthesizer.
    Voice,
    /// Scaled scene timing plans.
    Plan,
}

/// One caption cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    /// 1-based position in the track.
    pub index: u32,
    pub scene_id: SceneId,
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
}

/// Caption end vs. ground-truth scene end, across a track.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub max_delta_sec: f64,
    pub violation_count: usize,
    /// Captions that had a ground-truth scene end to compare against.
    pub compared_count: usize,
    pub tolerance_sec: f64,
}

/// A caption track for one language.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language: String,
    pub timing_source: TimingSource,
    pub duration_sec: f64,
    pub captions: Vec<Caption>,
    pub alignment: AlignmentReport,
    pub script_contamination_ratio: f64,
}

/// Round seconds to whole milliseconds.
pub fn round_ms(sec: f64) -> f64 {
    (sec * 1000.0).round() / 1000.0
}

/// Compare each caption's end with its scene's ground-truth end.
pub fn boundary_alignment(
    captions: &[Caption],
    ranges: &[SceneAudioRange],
    tolerance_sec: f64,
) -> AlignmentReport {
    let ends: FxHashMap<&SceneId, f64> = ranges.iter().map(|r| (&r.scene_id, r.end_sec)).collect();
    let mut report = AlignmentReport {
        tolerance_sec,
        ..AlignmentReport::default()
    };
    for caption in captions {
        let Some(end) = ends.get(&caption.scene_id) else {
            continue;
        };
        let delta = round_ms((caption.end_sec - end).abs());
        report.compared_count += 1;
        report.max_delta_sec = report.max_delta_sec.max(delta);
        if delta > tolerance_sec {
            report.violation_count += 1;
        }
    }
    report
}

pub struct CaptionBuilder<'a> {
    config: &'a CaptionConfig,
    primary_language: &'a str,
    translator: &'a dyn Translator,
}

impl<'a> CaptionBuilder<'a> {
    pub fn new(
        config: &'a CaptionConfig,
        primary_language: &'a str,
        translator: &'a dyn Translator,
    ) -> Self {
        Self {
            config,
            primary_language,
            translator,
        }
    }

    /// Caption text for `scene` in `lang`; never empty.
    ///
    /// Order: subtitle cue (primary language only), explicit narration,
    /// translation helper, source narration, then title or id.
    pub fn resolve_text(&self, scene: &Scene, lang: &str) -> String {
        let primary = self.primary_language;
        if lang == primary {
            if let Some(cue) = scene.subtitle_cue.as_deref() {
                return cue.trim().to_string();
            }
        }
        if let Some(text) = scene.narration.explicit(lang, primary) {
            return text.trim().to_string();
        }
        let source = scene.narration.source(primary);
        if let Some(source) = source {
            if lang != primary {
                if let Some(translated) = self.translator.translate(source, primary, lang) {
                    return translated.trim().to_string();
                }
                tracing::debug!(scene = %scene.id, lang, "no translation, using source text");
            }
            return source.trim().to_string();
        }
        if !scene.title.trim().is_empty() {
            return scene.title.trim().to_string();
        }
        scene.id.to_string()
    }

    /// Build the caption track for `lang`.
    pub fn build_track(
        &self,
        lang: &str,
        scenes: &[Scene],
        plans: &[SceneTimingPlan],
        voice: &VoiceMetadata,
    ) -> Result<CaptionTrack, CaptionError> {
        if scenes.is_empty() {
            return Err(CaptionError::NoScenes);
        }
        if plans.len() != scenes.len() {
            return Err(CaptionError::PlanMismatch {
                expected: scenes.len(),
                actual: plans.len(),
            });
        }
        for (scene, plan) in scenes.iter().zip(plans) {
            if scene.id != plan.scene_id {
                return Err(CaptionError::PlanOrder {
                    scene: scene.id.clone(),
                    plan: plan.scene_id.clone(),
                });
            }
        }

        let ranges = voice.ranges_for(lang, self.primary_language);
        let (timing_source, spans) = match ranges {
            Some(ranges) => (TimingSource::Voice, self.spans_from_ranges(plans, ranges)),
            None => (TimingSource::Plan, self.spans_from_plans(plans, voice.duration_seconds)),
        };

        let mut captions = Vec::with_capacity(scenes.len());
        let mut prev_end = 0.0f64;
        for (i, (scene, (start, end))) in scenes.iter().zip(spans).enumerate() {
            let start = round_ms(start.max(prev_end));
            let end = round_ms(end.max(start));
            captions.push(Caption {
                index: i as u32 + 1,
                scene_id: scene.id.clone(),
                start_sec: start,
                end_sec: end,
                text: wrap_caption(&self.resolve_text(scene, lang), self.config.max_line_width),
            });
            prev_end = end;
        }

        // Measured before trailing audio stretches the last caption.
        let alignment = match ranges {
            Some(ranges) => {
                boundary_alignment(&captions, ranges, self.config.boundary_tolerance_sec)
            }
            None => AlignmentReport {
                tolerance_sec: self.config.boundary_tolerance_sec,
                ..AlignmentReport::default()
            },
        };

        let timeline_end = captions.last().map_or(0.0, |c| c.end_sec);
        let duration_sec = round_ms(voice.duration_seconds.unwrap_or(timeline_end).max(timeline_end));
        if let Some(last) = captions.last_mut() {
            if last.end_sec < duration_sec {
                last.end_sec = duration_sec;
            }
        }
        let all_text: String = captions.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
        let track = CaptionTrack {
            language: lang.to_string(),
            timing_source,
            duration_sec,
            captions,
            alignment,
            script_contamination_ratio: round_ms(script_contamination_ratio(&all_text, lang)),
        };
        tracing::debug!(
            lang,
            ?timing_source,
            max_delta = track.alignment.max_delta_sec,
            violations = track.alignment.violation_count,
            "built caption track"
        );
        Ok(track)
    }

    /// Voice ranges are authoritative; scenes the synthesizer skipped are
    /// placed after the previous span with their planned length.
    fn spans_from_ranges(
        &self,
        plans: &[SceneTimingPlan],
        ranges: &[SceneAudioRange],
    ) -> Vec<(f64, f64)> {
        let by_id: FxHashMap<&SceneId, &SceneAudioRange> =
            ranges.iter().map(|r| (&r.scene_id, r)).collect();
        let mut cursor = 0.0f64;
        plans
            .iter()
            .map(|plan| {
                let span = match by_id.get(&plan.scene_id) {
                    Some(range) => (range.start_sec, range.end_sec),
                    None => {
                        tracing::warn!(scene = %plan.scene_id, "no audio range for scene, using plan");
                        (cursor, cursor + plan.effective_sec())
                    }
                };
                cursor = span.1.max(cursor);
                span
            })
            .collect()
    }

    /// Lay plan durations end to end from zero, scaled to the audio length
    /// when the synthesizer reported one.
    fn spans_from_plans(
        &self,
        plans: &[SceneTimingPlan],
        audio_duration: Option<f64>,
    ) -> Vec<(f64, f64)> {
        let total: f64 = plans.iter().map(|p| p.effective_sec()).sum();
        let scale = match audio_duration {
            Some(d) if total > 0.0 => d / total,
            _ => 1.0,
        };
        let mut cursor = 0.0f64;
        plans
            .iter()
            .map(|plan| {
                let start = cursor;
                cursor += plan.effective_sec() * scale;
                (start, cursor)
            })
            .collect()
    }
}
