/// Caption artifacts: numbered subtitle files and JSON payloads per language.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::caption::{Caption, CaptionTrack, TimingSource};

pub const CAPTION_STEM: &str = "captions";

/// Format seconds as an `HH:MM:SS,mmm` subtitle timestamp.
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Render a track as numbered `index / time range / text` blocks.
pub fn render_srt(track: &CaptionTrack) -> String {
    let mut out = String::new();
    for caption in &track.captions {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            caption.index,
            format_srt_time(caption.start_sec),
            format_srt_time(caption.end_sec),
            caption.text
        ));
    }
    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptionPayload<'a> {
    language: &'a str,
    timing_source: TimingSource,
    duration_sec: f64,
    scene_boundary_tolerance_sec: f64,
    scene_boundary_max_delta_sec: f64,
    scene_boundary_violation_count: usize,
    scene_boundary_compared_count: usize,
    script_contamination_ratio: f64,
    captions: &'a [Caption],
}

/// Render a track's structured JSON payload.
pub fn render_json(track: &CaptionTrack) -> Result<String, serde_json::Error> {
    let payload = CaptionPayload {
        language: &track.language,
        timing_source: track.timing_source,
        duration_sec: track.duration_sec,
        scene_boundary_tolerance_sec: track.alignment.tolerance_sec,
        scene_boundary_max_delta_sec: track.alignment.max_delta_sec,
        scene_boundary_violation_count: track.alignment.violation_count,
        scene_boundary_compared_count: track.alignment.compared_count,
        script_contamination_ratio: track.script_contamination_ratio,
        captions: &track.captions,
    };
    let mut json = serde_json::to_string_pretty(&payload)?;
    json.push('\n');
    Ok(json)
}

/// Write a track as `captions.<lang>.srt` and `captions.<lang>.json`.
///
/// The primary-language track is also written to the unsuffixed
/// `captions.srt` / `captions.json` with identical contents.
pub fn write_track(
    out_dir: &Path,
    track: &CaptionTrack,
    is_primary: bool,
) -> Result<Vec<PathBuf>, std::io::Error> {
    std::fs::create_dir_all(out_dir)?;
    let srt = render_srt(track);
    let json = render_json(track).map_err(std::io::Error::other)?;

    let mut written = Vec::new();
    let mut stems = vec![format!("{}.{}", CAPTION_STEM, track.language)];
    if is_primary {
        stems.push(CAPTION_STEM.to_string());
    }
    for stem in stems {
        let srt_path = out_dir.join(format!("{}.srt", stem));
        std::fs::write(&srt_path, &srt)?;
        written.push(srt_path);
        let json_path = out_dir.join(format!("{}.json", stem));
        std::fs::write(&json_path, &json)?;
        written.push(json_path);
    }
    Ok(written)
}
