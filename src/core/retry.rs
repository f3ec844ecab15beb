/// Scene retry runner: bounded capture attempts per scene.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::config::RetryConfig;
use crate::core::gate::GateStatus;
use crate::schema::manifest::{read_required, ManifestError};
use crate::schema::scene::SceneId;

/// Outcome of one capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureOutcome {
    #[serde(alias = "PASS")]
    Pass,
    #[serde(alias = "FAIL")]
    Fail,
}

impl CaptureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// Supplies the outcome of capture attempt `attempt` (1-based) for a scene.
pub trait CaptureSource {
    fn attempt(&mut self, scene_id: &SceneId, attempt: u32) -> CaptureOutcome;
}

impl<F> CaptureSource for F
where
    F: FnMut(&SceneId, u32) -> CaptureOutcome,
{
    fn attempt(&mut self, scene_id: &SceneId, attempt: u32) -> CaptureOutcome {
        self(scene_id, attempt)
    }
}

/// Deterministic stand-in for the capture collaborator:
/// `{"scene-01": ["fail", "pass"]}`. Attempts past a scene's list pass.
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    outcomes: FxHashMap<SceneId, Vec<CaptureOutcome>>,
}

impl FailurePlan {
    pub fn load(path: &Path) -> Result<FailurePlan, ManifestError> {
        let contents = read_required(path)?;
        Self::parse_json(&contents)
    }

    pub fn parse_json(input: &str) -> Result<FailurePlan, ManifestError> {
        let raw: BTreeMap<SceneId, Vec<CaptureOutcome>> = serde_json::from_str(input)?;
        Ok(FailurePlan {
            outcomes: raw.into_iter().collect(),
        })
    }

    pub fn insert(&mut self, scene_id: SceneId, outcomes: Vec<CaptureOutcome>) {
        self.outcomes.insert(scene_id, outcomes);
    }
}

impl CaptureSource for FailurePlan {
    fn attempt(&mut self, scene_id: &SceneId, attempt: u32) -> CaptureOutcome {
        self.outcomes
            .get(scene_id)
            .and_then(|plan| plan.get(attempt.saturating_sub(1) as usize))
            .copied()
            .unwrap_or(CaptureOutcome::Pass)
    }
}

/// Final record for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRunnerResult {
    pub scene_id: SceneId,
    pub attempt_history: Vec<CaptureOutcome>,
    pub status: CaptureOutcome,
    pub attempt_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerReport {
    pub status: GateStatus,
    pub max_retries: u32,
    pub scenes: Vec<SceneRunnerResult>,
}

impl RunnerReport {
    pub fn summary_markdown(&self) -> String {
        let mut md = format!(
            "# Scene Runner\n\n- status: **{}**\n- max retries: {}\n\n| scene | attempts | status |\n|---|---|---|\n",
            self.status.as_str(),
            self.max_retries
        );
        for scene in &self.scenes {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                scene.scene_id,
                scene.attempt_count,
                scene.status.as_str()
            ));
        }
        md
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SceneState {
    Pending,
    Attempt(u32),
    Passed,
    Failed,
}

pub struct SceneRunner {
    config: RetryConfig,
}

impl SceneRunner {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run every scene through at most `max_retries` attempts.
    ///
    /// The run passes only if every scene passes; an empty scene list fails.
    pub fn run(&self, scene_ids: &[SceneId], source: &mut dyn CaptureSource) -> RunnerReport {
        let max = self.config.max_retries.max(1);
        let scenes: Vec<SceneRunnerResult> = scene_ids
            .iter()
            .map(|id| self.run_scene(id, max, source))
            .collect();

        let all_passed = scenes.iter().all(|s| s.status == CaptureOutcome::Pass);
        let status = GateStatus::from_bool(!scenes.is_empty() && all_passed);
        if scenes.is_empty() {
            tracing::warn!("scene runner invoked with no scenes");
        }
        RunnerReport {
            status,
            max_retries: max,
            scenes,
        }
    }

    fn run_scene(&self, id: &SceneId, max: u32, source: &mut dyn CaptureSource) -> SceneRunnerResult {
        let mut history = Vec::new();
        let mut state = SceneState::Pending;
        loop {
            state = match state {
                SceneState::Pending => SceneState::Attempt(1),
                SceneState::Attempt(k) => {
                    let outcome = source.attempt(id, k);
                    history.push(outcome);
                    tracing::info!(scene = %id, attempt = k, ?outcome, "capture attempt");
                    match outcome {
                        CaptureOutcome::Pass => SceneState::Passed,
                        CaptureOutcome::Fail if k < max => SceneState::Attempt(k + 1),
                        CaptureOutcome::Fail => SceneState::Failed,
                    }
                }
                SceneState::Passed | SceneState::Failed => break,
            };
        }

        let status = if state == SceneState::Passed {
            CaptureOutcome::Pass
        } else {
            CaptureOutcome::Fail
        };
        SceneRunnerResult {
            scene_id: id.clone(),
            attempt_count: history.len() as u32,
            attempt_history: history,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<SceneId> {
        names.iter().map(|n| SceneId::from(*n)).collect()
    }

    #[test]
    fn failure_plan_scenario() {
        let mut plan = FailurePlan::parse_json(
            r#"{"scene-01": ["fail", "fail", "pass"], "scene-02": ["pass"]}"#,
        )
        .unwrap();
        let runner = SceneRunner::new(RetryConfig { max_retries: 3 });
        let report = runner.run(&ids(&["scene-01", "scene-02"]), &mut plan);

        assert_eq!(report.scenes[0].attempt_count, 3);
        assert_eq!(
            report.scenes[0].attempt_history,
            vec![CaptureOutcome::Fail, CaptureOutcome::Fail, CaptureOutcome::Pass]
        );
        assert_eq!(report.scenes[1].attempt_count, 1);
        assert_eq!(report.status, GateStatus::Pass);
    }

    #[test]
    fn exhausted_retries_fail() {
        let mut plan = FailurePlan::parse_json(r#"{"a": ["fail", "fail", "fail", "pass"]}"#).unwrap();
        let runner = SceneRunner::new(RetryConfig { max_retries: 3 });
        let report = runner.run(&ids(&["a"]), &mut plan);
        assert_eq!(report.scenes[0].attempt_count, 3);
        assert_eq!(report.scenes[0].status, CaptureOutcome::Fail);
        assert_eq!(report.status, GateStatus::Fail);

        let md = report.summary_markdown();
        assert!(md.contains("- status: **fail**"));
        assert!(md.contains("| a | 3 | fail |"));
        assert_eq!(CaptureOutcome::Pass.as_str(), "pass");
    }

    #[test]
    fn empty_scene_list_fails() {
        let runner = SceneRunner::new(RetryConfig::default());
        let report = runner.run(&[], &mut FailurePlan::default());
        assert_eq!(report.status, GateStatus::Fail);
        assert!(report.scenes.is_empty());
    }

    #[test]
    fn attempt_count_matches_first_pass() {
        let runner = SceneRunner::new(RetryConfig { max_retries: 5 });
        for first_pass in 1..=7u32 {
            let mut source = |_: &SceneId, attempt: u32| {
                if attempt >= first_pass {
                    CaptureOutcome::Pass
                } else {
                    CaptureOutcome::Fail
                }
            };
            let report = runner.run(&ids(&["x"]), &mut source);
            let result = &report.scenes[0];
            assert!(result.attempt_count <= 5);
            assert_eq!(result.attempt_count, first_pass.min(5));
            assert_eq!(result.status == CaptureOutcome::Pass, first_pass <= 5);
            assert_eq!(result.attempt_history.last(), Some(&result.status));
        }
    }

    #[test]
    fn unplanned_scene_passes_first_try() {
        let mut plan = FailurePlan::default();
        plan.insert(SceneId::from("a"), vec![CaptureOutcome::Fail]);
        let runner = SceneRunner::new(RetryConfig::default());
        let report = runner.run(&ids(&["a", "b"]), &mut plan);
        assert_eq!(report.scenes[0].attempt_count, 2);
        assert_eq!(report.scenes[1].attempt_count, 1);
        assert!(report.summary_markdown().contains("| a | 2 | pass |"));
    }

    #[test]
    fn malformed_plan_is_an_error() {
        assert!(FailurePlan::parse_json(r#"{"a": ["maybe"]}"#).is_err());
        assert!(matches!(
            FailurePlan::load(Path::new("no/plan.json")),
            Err(ManifestError::Missing(_))
        ));
    }
}
