/// Timeline Plan — allocates scene durations, paces narration, and writes captions.
///
/// Usage: timeline_plan --scenario <scenario.json> [--voice <voice.json>]
///        [--config <engine.ron>] [--phrasebook <phrasebook.ron>]
///        [--target-sec <n>] [--out-dir <dir>]

use scene_timeline::core::pipeline::TimelineEngine;
use scene_timeline::schema::manifest::Scenario;
use std::path::Path;
use std::process;

const USAGE: &str = "Usage: timeline_plan --scenario <scenario.json> [--voice <voice.json>] \
[--config <engine.ron>] [--phrasebook <phrasebook.ron>] [--target-sec <n>] [--out-dir <dir>]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut scenario_path = None;
    let mut voice_path = None;
    let mut config_path = None;
    let mut phrasebook_path = None;
    let mut target_sec = None;
    let mut out_dir = "out".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" if i + 1 < args.len() => {
                i += 1;
                scenario_path = Some(args[i].clone());
            }
            "--voice" if i + 1 < args.len() => {
                i += 1;
                voice_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--phrasebook" if i + 1 < args.len() => {
                i += 1;
                phrasebook_path = Some(args[i].clone());
            }
            "--target-sec" if i + 1 < args.len() => {
                i += 1;
                target_sec = Some(args[i].parse::<f64>().unwrap_or_else(|_| {
                    eprintln!("Error: --target-sec must be a number");
                    process::exit(1);
                }));
            }
            "--out-dir" if i + 1 < args.len() => {
                i += 1;
                out_dir = args[i].clone();
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{}", USAGE);
                process::exit(1);
            }
        }
        i += 1;
    }

    let scenario_path = scenario_path.unwrap_or_else(|| {
        eprintln!("Error: --scenario is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let scenario = Scenario::load(Path::new(&scenario_path)).unwrap_or_else(|e| {
        eprintln!("Error loading scenario '{}': {}", scenario_path, e);
        process::exit(1);
    });

    let mut builder = TimelineEngine::builder();
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    if let Some(ref path) = phrasebook_path {
        builder = builder.phrasebook(path);
    }
    if let Some(ref path) = voice_path {
        builder = builder.voice_metadata(path);
    }
    let engine = builder.build().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let output = engine.plan(&scenario, target_sec).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let written = output.write_artifacts(Path::new(&out_dir)).unwrap_or_else(|e| {
        eprintln!("Error writing artifacts to '{}': {}", out_dir, e);
        process::exit(1);
    });

    for path in &written {
        println!("wrote {}", path.display());
    }
    for track in &output.tracks {
        println!(
            "captions[{}]: {} cues, max boundary delta {:.3}s, {} violations",
            track.language,
            track.captions.len(),
            track.alignment.max_delta_sec,
            track.alignment.violation_count
        );
    }
    println!(
        "status: planned {} scenes in {}s (overflow {:.3}s)",
        output.plans.len(),
        output.allocation.target_sec,
        output.total_overflow_sec()
    );
}
