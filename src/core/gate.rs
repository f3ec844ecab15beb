/// Quality gates: scene, version, and runtime-budget checks.
///
/// Gates consume externally measured evidence, never measure anything
/// themselves, and emit an auditable report plus a process exit code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::GateConfig;
use crate::schema::manifest::{read_json_lenient, read_required, ManifestError};
use crate::schema::scene::SceneId;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pass,
    Fail,
}

impl GateStatus {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    /// Process exit code: 0 for pass, 1 for fail.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Pass => 0,
            Self::Fail => 1,
        }
    }

    /// Parse a status string from an upstream report.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pass" | "passed" | "ok" => Some(Self::Pass),
            "fail" | "failed" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Evidence for one evaluated item (a scene, an upstream report).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateItem {
    pub id: String,
    pub status: GateStatus,
    pub checks: BTreeMap<String, bool>,
    pub metrics: BTreeMap<String, Option<f64>>,
}

/// Machine-readable gate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub gate: String,
    pub status: GateStatus,
    pub thresholds: BTreeMap<String, f64>,
    pub checks: BTreeMap<String, bool>,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<GateItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl GateReport {
    fn new(gate: &str) -> Self {
        Self {
            gate: gate.to_string(),
            status: GateStatus::Fail,
            thresholds: BTreeMap::new(),
            checks: BTreeMap::new(),
            metrics: BTreeMap::new(),
            items: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Status is pass iff every top-level check passed.
    fn settle(mut self) -> Self {
        let passed = !self.checks.is_empty() && self.checks.values().all(|ok| *ok);
        self.status = GateStatus::from_bool(passed);
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn summary_markdown(&self) -> String {
        let mut md = format!(
            "# {} gate\n\n- status: **{}**\n",
            self.gate,
            self.status.as_str()
        );
        for (name, ok) in &self.checks {
            md.push_str(&format!("- {}: {}\n", name, if *ok { "ok" } else { "FAILED" }));
        }
        if !self.items.is_empty() {
            md.push_str("\n| item | status | failed checks |\n|---|---|---|\n");
            for item in &self.items {
                let failed: Vec<&str> = item
                    .checks
                    .iter()
                    .filter(|(_, ok)| !**ok)
                    .map(|(name, _)| name.as_str())
                    .collect();
                md.push_str(&format!(
                    "| {} | {} | {} |\n",
                    item.id,
                    item.status.as_str(),
                    if failed.is_empty() { "-".to_string() } else { failed.join(", ") }
                ));
            }
        }
        for note in &self.notes {
            md.push_str(&format!("\n> {}\n", note));
        }
        md
    }
}

/// Write `<name>.json` and `<name>.md` into `out_dir`.
pub fn write_report_files<T: Serialize>(
    out_dir: &Path,
    name: &str,
    report: &T,
    markdown: &str,
) -> Result<Vec<PathBuf>, GateError> {
    std::fs::create_dir_all(out_dir)?;
    let json_path = out_dir.join(format!("{}.json", name));
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    std::fs::write(&json_path, json)?;
    let md_path = out_dir.join(format!("{}.md", name));
    std::fs::write(&md_path, markdown)?;
    Ok(vec![json_path, md_path])
}

pub fn write_report(out_dir: &Path, name: &str, report: &GateReport) -> Result<Vec<PathBuf>, GateError> {
    write_report_files(out_dir, name, report, &report.summary_markdown())
}

/// Externally measured metrics for one scene. Absent values fail their check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMetrics {
    #[serde(default)]
    pub scene_av_boundary_delta_sec: Option<f64>,
    #[serde(default)]
    pub scene_caption_voice_end_delta_sec: Option<f64>,
    #[serde(default)]
    pub action_execution_rate: Option<f64>,
    #[serde(default)]
    pub static_frame_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSceneMetrics {
    #[serde(alias = "sceneId", alias = "scene_id")]
    id: String,
    #[serde(default)]
    scene_av_boundary_delta_sec: Option<f64>,
    #[serde(default)]
    scene_caption_voice_end_delta_sec: Option<f64>,
    #[serde(default)]
    action_execution_rate: Option<f64>,
    #[serde(default)]
    static_frame_ratio: Option<f64>,
}

impl RawSceneMetrics {
    fn into_entry(self) -> (SceneId, SceneMetrics) {
        let metrics = SceneMetrics {
            scene_av_boundary_delta_sec: self.scene_av_boundary_delta_sec,
            scene_caption_voice_end_delta_sec: self.scene_caption_voice_end_delta_sec,
            action_execution_rate: self.action_execution_rate,
            static_frame_ratio: self.static_frame_ratio,
        };
        (SceneId(self.id), metrics)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMetricsFile {
    List(Vec<RawSceneMetrics>),
    Wrapped { scenes: Vec<RawSceneMetrics> },
    Keyed(BTreeMap<String, SceneMetrics>),
}

/// Per-scene metrics in scenario order (or id order for keyed files).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMetricsSet {
    pub scenes: Vec<(SceneId, SceneMetrics)>,
}

impl SceneMetricsSet {
    pub fn load(path: &Path) -> Result<SceneMetricsSet, GateError> {
        let contents = read_required(path)?;
        Self::parse_json(&contents)
    }

    pub fn parse_json(input: &str) -> Result<SceneMetricsSet, GateError> {
        let raw: RawMetricsFile = serde_json::from_str(input)?;
        let scenes = match raw {
            RawMetricsFile::List(list) | RawMetricsFile::Wrapped { scenes: list } => {
                list.into_iter().map(RawSceneMetrics::into_entry).collect()
            }
            RawMetricsFile::Keyed(map) => map.into_iter().map(|(id, m)| (SceneId(id), m)).collect(),
        };
        Ok(SceneMetricsSet { scenes })
    }
}

/// Track-level alignment summary read back from a captions payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionAlignment {
    pub max_delta_sec: f64,
    pub violation_count: u64,
}

impl CaptionAlignment {
    /// Read `sceneBoundaryMaxDeltaSec` / `sceneBoundaryViolationCount`;
    /// an absent or malformed payload yields `None`.
    pub fn load_lenient(path: &Path) -> Option<CaptionAlignment> {
        let value = read_json_lenient(path)?;
        Some(CaptionAlignment {
            max_delta_sec: value.get("sceneBoundaryMaxDeltaSec")?.as_f64()?,
            violation_count: value.get("sceneBoundaryViolationCount")?.as_u64()?,
        })
    }
}

pub struct SceneGate {
    config: GateConfig,
}

impl SceneGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    fn check_max(value: Option<f64>, limit: f64) -> bool {
        value.is_some_and(|v| v.is_finite() && v <= limit)
    }

    fn check_min(value: Option<f64>, limit: f64) -> bool {
        value.is_some_and(|v| v.is_finite() && v >= limit)
    }

    pub fn evaluate_scene(&self, id: &SceneId, m: &SceneMetrics) -> GateItem {
        let c = &self.config;
        let checks = BTreeMap::from([
            (
                "boundary_delta".to_string(),
                Self::check_max(m.scene_av_boundary_delta_sec, c.max_boundary_delta_sec),
            ),
            (
                "caption_voice_delta".to_string(),
                Self::check_max(m.scene_caption_voice_end_delta_sec, c.max_caption_voice_delta_sec),
            ),
            (
                "action_execution_rate".to_string(),
                Self::check_min(m.action_execution_rate, c.min_action_rate),
            ),
            (
                "static_frame_ratio".to_string(),
                Self::check_max(m.static_frame_ratio, c.max_static_frame_ratio),
            ),
        ]);
        let metrics = BTreeMap::from([
            ("scene_av_boundary_delta_sec".to_string(), m.scene_av_boundary_delta_sec),
            (
                "scene_caption_voice_end_delta_sec".to_string(),
                m.scene_caption_voice_end_delta_sec,
            ),
            ("action_execution_rate".to_string(), m.action_execution_rate),
            ("static_frame_ratio".to_string(), m.static_frame_ratio),
        ]);
        GateItem {
            id: id.to_string(),
            status: GateStatus::from_bool(checks.values().all(|ok| *ok)),
            checks,
            metrics,
        }
    }

    /// Pass iff at least one scene was measured and every scene passes.
    /// A caption alignment summary, when given, must also be within bounds.
    pub fn evaluate(&self, set: &SceneMetricsSet, captions: Option<CaptionAlignment>) -> GateReport {
        let c = &self.config;
        let mut report = GateReport::new("scene");
        report.thresholds = BTreeMap::from([
            ("max_boundary_delta_sec".to_string(), c.max_boundary_delta_sec),
            ("max_caption_voice_delta_sec".to_string(), c.max_caption_voice_delta_sec),
            ("min_action_rate".to_string(), c.min_action_rate),
            ("max_static_frame_ratio".to_string(), c.max_static_frame_ratio),
        ]);
        report.items = set
            .scenes
            .iter()
            .map(|(id, m)| self.evaluate_scene(id, m))
            .collect();

        let failing = report.items.iter().filter(|i| i.status == GateStatus::Fail).count();
        report.checks.insert("has_scenes".to_string(), !report.items.is_empty());
        report.checks.insert("all_scenes_pass".to_string(), failing == 0);
        report.metrics.insert("scene_count".to_string(), report.items.len() as f64);
        report.metrics.insert("failing_scene_count".to_string(), failing as f64);

        if let Some(alignment) = captions {
            report.checks.insert(
                "caption_track_alignment".to_string(),
                alignment.violation_count == 0 && alignment.max_delta_sec <= c.max_boundary_delta_sec,
            );
            report
                .metrics
                .insert("caption_max_boundary_delta_sec".to_string(), alignment.max_delta_sec);
            report.metrics.insert(
                "caption_boundary_violation_count".to_string(),
                alignment.violation_count as f64,
            );
        }

        let report = report.settle();
        tracing::info!(status = report.status.as_str(), failing, "scene gate evaluated");
        report
    }
}

/// Status of an upstream report as seen by the version gate.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamStatus {
    pub name: String,
    /// `None` when the report is missing, unreadable, or has no status.
    pub status: Option<GateStatus>,
}

impl UpstreamStatus {
    pub fn read(name: &str, path: &Path) -> UpstreamStatus {
        let status = read_json_lenient(path).and_then(|value| {
            value
                .get("status")
                .and_then(serde_json::Value::as_str)
                .and_then(GateStatus::parse)
        });
        UpstreamStatus {
            name: name.to_string(),
            status,
        }
    }
}

/// Rolls up upstream gate reports. Missing reports do not block promotion;
/// an explicit fail does.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionGate;

impl VersionGate {
    pub fn evaluate(&self, upstreams: &[UpstreamStatus]) -> GateReport {
        let mut report = GateReport::new("version");
        for upstream in upstreams {
            let ok = upstream.status != Some(GateStatus::Fail);
            report.checks.insert(upstream.name.clone(), ok);
            if upstream.status.is_none() {
                report
                    .notes
                    .push(format!("{} report absent, treated as non-blocking", upstream.name));
            }
        }
        if upstreams.is_empty() {
            report.checks.insert("upstream_reports".to_string(), true);
            report.notes.push("no upstream reports configured".to_string());
        }
        let missing = upstreams.iter().filter(|u| u.status.is_none()).count();
        report.metrics.insert("upstream_count".to_string(), upstreams.len() as f64);
        report.metrics.insert("missing_upstream_count".to_string(), missing as f64);
        let report = report.settle();
        tracing::info!(status = report.status.as_str(), missing, "version gate evaluated");
        report
    }
}

pub struct RuntimeGate {
    budget_minutes: f64,
}

impl RuntimeGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            budget_minutes: config.runtime_budget_minutes,
        }
    }

    /// Pass iff the elapsed wall-clock time is within the budget.
    pub fn evaluate(&self, elapsed_sec: f64) -> GateReport {
        let mut report = GateReport::new("runtime");
        let elapsed_minutes = elapsed_sec / 60.0;
        report
            .thresholds
            .insert("runtime_budget_minutes".to_string(), self.budget_minutes);
        report.metrics.insert("elapsed_sec".to_string(), elapsed_sec);
        report.metrics.insert("elapsed_minutes".to_string(), elapsed_minutes);
        report.checks.insert(
            "within_budget".to_string(),
            elapsed_sec.is_finite() && elapsed_sec >= 0.0 && elapsed_minutes <= self.budget_minutes,
        );
        report.settle()
    }
}
