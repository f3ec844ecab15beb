/// Pipeline integration tests: scenario files to timing plans and captions.

use scene_timeline::core::allocator::{DurationAllocator, SceneBudget};
use scene_timeline::core::caption::TimingSource;
use scene_timeline::core::config::{EngineConfig, PacingConfig};
use scene_timeline::core::pacing::{AdjustmentStep, PacingLadder};
use scene_timeline::core::pipeline::TimelineEngine;
use scene_timeline::schema::manifest::Scenario;
use std::path::Path;

fn load(name: &str) -> Scenario {
    Scenario::load(&Path::new("tests/fixtures").join(name)).unwrap()
}

#[test]
fn two_scene_voice_alignment() {
    let scenario = load("scenario_two_scenes.json");
    let engine = TimelineEngine::builder()
        .voice_metadata("tests/fixtures/voice_two_scenes.json")
        .build()
        .unwrap();
    let output = engine.plan(&scenario, None).unwrap();

    let dir = tempfile::tempdir().unwrap();
    output.write_artifacts(dir.path()).unwrap();

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("captions.json")).unwrap(),
    )
    .unwrap();
    assert!(json["sceneBoundaryMaxDeltaSec"].as_f64().unwrap() <= 0.15);
    assert_eq!(json["sceneBoundaryViolationCount"], 0);
    assert_eq!(json["timingSource"], "voice");
    assert_eq!(json["captions"].as_array().unwrap().len(), 2);

    let srt = std::fs::read_to_string(dir.path().join("captions.ko.srt")).unwrap();
    assert!(srt.contains("00:00:05,000 --> 00:00:10,000"));
    assert!(dir.path().join("captions.en.json").exists());
    assert!(dir.path().join("timing_plan.json").exists());
}

#[test]
fn exact_ranges_have_zero_delta() {
    let scenario = load("scenario_two_scenes.json");
    let engine = TimelineEngine::builder()
        .voice_metadata("tests/fixtures/voice_two_scenes.json")
        .build()
        .unwrap();
    let output = engine.plan(&scenario, None).unwrap();
    let ko = output.track("ko").unwrap();
    assert!(ko.alignment.max_delta_sec.abs() < 1e-9);
    assert_eq!(ko.alignment.violation_count, 0);
    assert_eq!(ko.alignment.compared_count, 2);
}

#[test]
fn runs_are_byte_identical() {
    let scenario = load("scenario_walkthrough.json");
    let engine = TimelineEngine::builder()
        .config_path("tests/fixtures/engine.ron")
        .phrasebook("tests/fixtures/phrasebook.ron")
        .build()
        .unwrap();

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let written_a = engine.plan(&scenario, None).unwrap().write_artifacts(first.path()).unwrap();
    let written_b = engine.plan(&scenario, None).unwrap().write_artifacts(second.path()).unwrap();
    assert_eq!(written_a.len(), written_b.len());

    for path in &written_a {
        let name = path.file_name().unwrap();
        let a = std::fs::read(path).unwrap();
        let b = std::fs::read(second.path().join(name)).unwrap();
        assert_eq!(a, b, "{:?} differs between runs", name);
    }
}

#[test]
fn walkthrough_captions_are_monotonic() {
    let scenario = load("scenario_walkthrough.json");
    let engine = TimelineEngine::builder()
        .phrasebook("tests/fixtures/phrasebook.ron")
        .build()
        .unwrap();
    let output = engine.plan(&scenario, None).unwrap();

    assert_eq!(output.allocation.total_sec(), 60);
    assert_eq!(output.allocation.durations_sec[2], 15);

    for track in &output.tracks {
        assert_eq!(track.timing_source, TimingSource::Plan);
        for pair in track.captions.windows(2) {
            assert_eq!(pair[1].index, pair[0].index + 1);
            assert!(pair[1].start_sec >= pair[0].start_sec);
            assert!(pair[1].start_sec >= pair[0].end_sec, "overlap in {}", track.language);
        }
        assert_eq!(track.captions[0].start_sec, 0.0);
    }

    let ko = output.track("ko").unwrap();
    assert_eq!(ko.captions[1].text, "관리자 계정으로 로그인");
    assert_eq!(ko.script_contamination_ratio, 0.0);

    let en = output.track("en").unwrap();
    assert_eq!(
        en.captions[0].text,
        "In this video we create a new\nproject from the dashboard."
    );
    assert_eq!(
        en.captions[1].text,
        "First sign in as an administrator and\nopen the Projects tab from the top menu."
    );
    assert_eq!(en.captions[3].text, "Thank you.");
    // The "create" scene has no English text anywhere.
    assert!(en.script_contamination_ratio > 0.0);
}

#[test]
fn plan_invariants_hold() {
    let scenario = load("scenario_walkthrough.json");
    let engine = TimelineEngine::builder().build().unwrap();
    for target in [4.0, 20.0, 45.0, 60.0, 90.0, 300.0] {
        let output = engine.plan(&scenario, Some(target)).unwrap();
        assert_eq!(output.allocation.total_sec(), (target as u32).max(4));
        let max_ratio = engine.config().pacing.max_compression_ratio;
        let mut scene_start = 0.0;
        for (plan, duration) in output.plans.iter().zip(&output.allocation.durations_sec) {
            assert!(*duration >= 1);
            assert!(plan.overflow_sec >= 0.0);
            assert!(plan.compression_ratio >= 0.0 && plan.compression_ratio <= max_ratio);
            let original_end = scene_start + *duration as f64;
            assert!((plan.cue_end - (original_end + plan.overflow_sec)).abs() < 1e-9);
            scene_start = original_end;
        }
    }
}

#[test]
fn allocator_sum_invariant_over_many_targets() {
    let allocator = DurationAllocator::new(PacingConfig::default());
    let budgets: Vec<SceneBudget> = [3usize, 0, 48, 120, 7, 66, 250, 1]
        .iter()
        .map(|&chars| SceneBudget {
            chars,
            pinned_sec: None,
        })
        .collect();
    for target in 8..=400u32 {
        let allocation = allocator.allocate(&budgets, Some(target as f64));
        assert_eq!(allocation.total_sec(), target, "target {}", target);
        assert!(allocation.durations_sec.iter().all(|d| *d >= 1));
    }
}

#[test]
fn long_narration_in_four_seconds() {
    let config = EngineConfig::default();
    let ladder = PacingLadder::new(config.pacing.clone());
    let narration = "이 장면에서는 설정 화면의 모든 옵션을 하나씩 자세하게 설명하고 각각의 기본값이 무엇인지 알려드립니다";
    let outcome = ladder.resolve(narration, 4.0, None);
    assert!(narration.chars().filter(|c| !c.is_whitespace()).count() as f64 / config.pacing.max_rate > 4.0);
    assert!(matches!(
        outcome.adjustment_step,
        AdjustmentStep::Speed | AdjustmentStep::SpeedCompression | AdjustmentStep::SpeedCompressionSceneExtend
    ));
    assert!(outcome.overflow_sec >= 0.0);
}

#[test]
fn malformed_voice_metadata_degrades_to_plan_timing() {
    let dir = tempfile::tempdir().unwrap();
    let voice_path = dir.path().join("voice.json");
    std::fs::write(&voice_path, "{ this is not json").unwrap();

    let scenario = load("scenario_two_scenes.json");
    let engine = TimelineEngine::builder()
        .voice_metadata(voice_path.to_str().unwrap())
        .build()
        .unwrap();
    let output = engine.plan(&scenario, None).unwrap();
    let ko = output.track("ko").unwrap();
    assert_eq!(ko.timing_source, TimingSource::Plan);
    assert_eq!(ko.captions[1].end_sec, 10.0);
}

#[test]
fn config_fixture_applies() {
    let engine = TimelineEngine::builder()
        .config_path("tests/fixtures/engine.ron")
        .build()
        .unwrap();
    assert_eq!(engine.config().pacing.max_rate, 8.0);
    assert_eq!(engine.config().captions.max_line_width, 32);
    assert_eq!(engine.config().captions.boundary_tolerance_sec, 0.15);
    assert_eq!(engine.config().retry.max_retries, 2);
}

#[test]
fn trailing_voice_padding_keeps_alignment_clean() {
    let dir = tempfile::tempdir().unwrap();
    let voice_path = dir.path().join("voice.json");
    std::fs::write(
        &voice_path,
        r#"{
            "durationSeconds": 10.4,
            "sceneAudioRanges": [
                {"sceneId": "scene-01", "startSec": 0.0, "endSec": 5.0},
                {"sceneId": "scene-02", "startSec": 5.0, "endSec": 10.0}
            ]
        }"#,
    )
    .unwrap();

    let scenario = load("scenario_two_scenes.json");
    let engine = TimelineEngine::builder()
        .voice_metadata(voice_path.to_str().unwrap())
        .build()
        .unwrap();
    let output = engine.plan(&scenario, None).unwrap();
    let ko = output.track("ko").unwrap();
    assert_eq!(ko.captions[1].end_sec, 10.4);
    assert_eq!(ko.alignment.max_delta_sec, 0.0);
    assert_eq!(ko.alignment.violation_count, 0);
}
