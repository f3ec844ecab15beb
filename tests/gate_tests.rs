/// Gate and runner integration tests against the fixture reports.

use scene_timeline::core::config::{EngineConfig, GateConfig, RetryConfig};
use scene_timeline::core::gate::{
    write_report, write_report_files, CaptionAlignment, GateStatus, RuntimeGate, SceneGate,
    SceneMetricsSet, UpstreamStatus, VersionGate,
};
use scene_timeline::core::pipeline::TimelineEngine;
use scene_timeline::core::retry::{CaptureOutcome, FailurePlan, SceneRunner};
use scene_timeline::schema::manifest::Scenario;
use scene_timeline::schema::scene::SceneId;
use std::path::Path;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new("tests/fixtures").join(name)
}

#[test]
fn runner_follows_failure_plan() {
    let mut plan = FailurePlan::load(&fixture("failure_plan.json")).unwrap();
    let scenes = vec![SceneId::from("scene-01"), SceneId::from("scene-02")];

    let report = SceneRunner::new(RetryConfig { max_retries: 3 }).run(&scenes, &mut plan);
    assert_eq!(report.status, GateStatus::Pass);
    assert_eq!(report.scenes[0].attempt_count, 3);
    assert_eq!(
        report.scenes[0].attempt_history,
        vec![CaptureOutcome::Fail, CaptureOutcome::Fail, CaptureOutcome::Pass]
    );
    assert_eq!(report.scenes[1].attempt_count, 1);
}

#[test]
fn runner_gives_up_after_max_retries() {
    let mut plan = FailurePlan::load(&fixture("failure_plan.json")).unwrap();
    let scenes = vec![SceneId::from("scene-01"), SceneId::from("scene-02")];

    let config = EngineConfig::load_from_ron(&fixture("engine.ron")).unwrap();
    let report = SceneRunner::new(config.retry).run(&scenes, &mut plan);
    assert_eq!(report.status, GateStatus::Fail);
    assert_eq!(report.scenes[0].status, CaptureOutcome::Fail);
    assert_eq!(report.scenes[0].attempt_count, 2);
    assert_eq!(report.scenes[1].status, CaptureOutcome::Pass);

    let dir = tempfile::tempdir().unwrap();
    write_report_files(dir.path(), "scene_runner_report", &report, &report.summary_markdown()).unwrap();
    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("scene_runner_report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["status"], "fail");
}

#[test]
fn runner_over_scenario_ids() {
    let scenario = Scenario::load(&fixture("scenario_walkthrough.json")).unwrap();
    let mut calls = 0u32;
    let mut always_pass = |_: &SceneId, _: u32| {
        calls += 1;
        CaptureOutcome::Pass
    };
    let report = SceneRunner::new(RetryConfig::default()).run(&scenario.scene_ids(), &mut always_pass);
    assert_eq!(report.status, GateStatus::Pass);
    assert_eq!(report.scenes.len(), 4);
    assert_eq!(calls, 4);
}

#[test]
fn scene_gate_thresholds_come_from_config() {
    let metrics = SceneMetricsSet::load(&fixture("scene_metrics.json")).unwrap();
    assert_eq!(metrics.scenes.len(), 2);

    let strict = SceneGate::new(GateConfig::default()).evaluate(&metrics, None);
    assert_eq!(strict.status, GateStatus::Fail);
    assert_eq!(strict.exit_code(), 1);
    assert_eq!(strict.items[0].status, GateStatus::Pass);
    assert_eq!(strict.items[1].status, GateStatus::Fail);
    assert!(!strict.items[1].checks["boundary_delta"]);

    let config = EngineConfig::load_from_ron(&fixture("engine.ron")).unwrap();
    let relaxed = SceneGate::new(config.gates).evaluate(&metrics, None);
    assert_eq!(relaxed.status, GateStatus::Pass);
    assert_eq!(relaxed.exit_code(), 0);
}

#[test]
fn scene_gate_reads_caption_alignment() {
    let scenario = Scenario::load(&fixture("scenario_two_scenes.json")).unwrap();
    let engine = TimelineEngine::builder()
        .voice_metadata("tests/fixtures/voice_two_scenes.json")
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    engine.plan(&scenario, None).unwrap().write_artifacts(dir.path()).unwrap();

    let alignment = CaptionAlignment::load_lenient(&dir.path().join("captions.json")).unwrap();
    assert_eq!(alignment.violation_count, 0);

    let metrics = SceneMetricsSet::load(&fixture("scene_metrics.json")).unwrap();
    let config = EngineConfig::load_from_ron(&fixture("engine.ron")).unwrap();
    let report = SceneGate::new(config.gates).evaluate(&metrics, Some(alignment));
    assert!(report.checks["caption_track_alignment"]);
    assert_eq!(report.status, GateStatus::Pass);

    assert!(CaptionAlignment::load_lenient(&dir.path().join("missing.json")).is_none());
}

#[test]
fn version_gate_reads_written_reports() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = SceneMetricsSet::load(&fixture("scene_metrics.json")).unwrap();

    let failing = SceneGate::new(GateConfig::default()).evaluate(&metrics, None);
    write_report(dir.path(), "scene_gate", &failing).unwrap();
    let upstream = UpstreamStatus::read("scene_gate", &dir.path().join("scene_gate.json"));
    assert_eq!(upstream.status, Some(GateStatus::Fail));
    assert_eq!(VersionGate.evaluate(&[upstream]).status, GateStatus::Fail);

    let config = EngineConfig::load_from_ron(&fixture("engine.ron")).unwrap();
    let passing = SceneGate::new(config.gates).evaluate(&metrics, None);
    write_report(dir.path(), "scene_gate", &passing).unwrap();
    let upstream = UpstreamStatus::read("scene_gate", &dir.path().join("scene_gate.json"));
    assert_eq!(VersionGate.evaluate(&[upstream]).status, GateStatus::Pass);
}

#[test]
fn version_gate_passes_without_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let upstream = UpstreamStatus::read("scene_gate", &dir.path().join("scene_gate.json"));
    assert_eq!(upstream.status, None);

    let report = VersionGate.evaluate(&[upstream]);
    assert_eq!(report.status, GateStatus::Pass);
    assert_eq!(report.notes.len(), 1);
    assert_eq!(report.metrics["missing_upstream_count"], 1.0);
}

#[test]
fn runtime_gate_uses_configured_budget() {
    let config = EngineConfig::load_from_ron(&fixture("engine.ron")).unwrap();
    let gate = RuntimeGate::new(&config.gates);
    assert_eq!(gate.evaluate(14.0 * 60.0).status, GateStatus::Pass);
    assert_eq!(gate.evaluate(16.0 * 60.0).status, GateStatus::Fail);

    let default_gate = RuntimeGate::new(&GateConfig::default());
    assert_eq!(default_gate.evaluate(16.0 * 60.0).status, GateStatus::Pass);
}
