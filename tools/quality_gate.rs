/// Quality Gate — evaluates the scene, version, or runtime-budget gate.
///
/// Usage:
///   quality_gate scene --metrics <metrics.json> [--captions <captions.json>]
///   quality_gate version [--scene-gate <scene_gate.json>] [--runner-report <report.json>]
///   quality_gate runtime (--elapsed-sec <n> | --started-at <unix-seconds>) [--budget-minutes <n>]
///
/// Common options: [--config <engine.ron>] [--out-dir <dir>]
///
/// Exits with the gate's status: 0 for pass, 1 for fail.

use scene_timeline::core::config::EngineConfig;
use scene_timeline::core::gate::{
    write_report, CaptionAlignment, GateReport, RuntimeGate, SceneGate, SceneMetricsSet,
    UpstreamStatus, VersionGate,
};
use std::collections::HashMap;
use std::path::Path;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

const USAGE: &str = "Usage: quality_gate <scene|version|runtime> [options]
  scene   --metrics <metrics.json> [--captions <captions.json>]
  version [--scene-gate <scene_gate.json>] [--runner-report <scene_runner_report.json>]
  runtime (--elapsed-sec <n> | --started-at <unix-seconds>) [--budget-minutes <n>]
  common  [--config <engine.ron>] [--out-dir <dir>]";

fn fail_usage(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn parse_number(flag: &str, value: Option<&String>) -> Option<f64> {
    value.map(|v| {
        v.parse::<f64>()
            .unwrap_or_else(|_| fail_usage(&format!("{} must be a number", flag)))
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("{}", USAGE);
        process::exit(0);
    }
    let gate = args[1].clone();

    // Every option takes one value
    let mut options: HashMap<String, String> = HashMap::new();
    let mut i = 2;
    while i < args.len() {
        let flag = &args[i];
        if !flag.starts_with("--") || i + 1 >= args.len() {
            fail_usage(&format!("unexpected argument '{}'", flag));
        }
        options.insert(flag.trim_start_matches("--").to_string(), args[i + 1].clone());
        i += 2;
    }

    let config = match options.get("config") {
        Some(path) => EngineConfig::load_from_ron(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("Error loading config '{}': {}", path, e);
            process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    let out_dir = options.get("out-dir").cloned().unwrap_or_else(|| "out".to_string());

    let (name, report): (&str, GateReport) = match gate.as_str() {
        "scene" => {
            let metrics_path = options
                .get("metrics")
                .unwrap_or_else(|| fail_usage("scene gate requires --metrics"));
            let metrics = SceneMetricsSet::load(Path::new(metrics_path)).unwrap_or_else(|e| {
                eprintln!("Error loading metrics '{}': {}", metrics_path, e);
                process::exit(1);
            });
            let captions = options.get("captions").and_then(|path| {
                let alignment = CaptionAlignment::load_lenient(Path::new(path));
                if alignment.is_none() {
                    tracing::warn!(path = %path, "captions payload unavailable, skipping alignment check");
                }
                alignment
            });
            ("scene_gate", SceneGate::new(config.gates.clone()).evaluate(&metrics, captions))
        }
        "version" => {
            let mut upstreams = Vec::new();
            for (flag, upstream) in [("scene-gate", "scene_gate"), ("runner-report", "scene_runner")] {
                if let Some(path) = options.get(flag) {
                    upstreams.push(UpstreamStatus::read(upstream, Path::new(path)));
                }
            }
            if upstreams.is_empty() {
                upstreams.push(UpstreamStatus::read(
                    "scene_gate",
                    &Path::new(&out_dir).join("scene_gate.json"),
                ));
            }
            ("version_gate", VersionGate.evaluate(&upstreams))
        }
        "runtime" => {
            let mut gates = config.gates.clone();
            if let Some(budget) = parse_number("--budget-minutes", options.get("budget-minutes")) {
                if budget <= 0.0 {
                    fail_usage("--budget-minutes must be positive");
                }
                gates.runtime_budget_minutes = budget;
            }
            let elapsed = match (
                parse_number("--elapsed-sec", options.get("elapsed-sec")),
                parse_number("--started-at", options.get("started-at")),
            ) {
                (Some(elapsed), _) => elapsed,
                (None, Some(started_at)) => {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs_f64())
                        .unwrap_or(0.0);
                    now - started_at
                }
                (None, None) => fail_usage("runtime gate requires --elapsed-sec or --started-at"),
            };
            ("runtime_gate", RuntimeGate::new(&gates).evaluate(elapsed))
        }
        other => fail_usage(&format!("unknown gate '{}'", other)),
    };

    let written = write_report(Path::new(&out_dir), name, &report).unwrap_or_else(|e| {
        eprintln!("Error writing report to '{}': {}", out_dir, e);
        process::exit(1);
    });
    for path in &written {
        println!("wrote {}", path.display());
    }
    println!("{}: {}", name, report.status.as_str());
    process::exit(report.exit_code());
}
