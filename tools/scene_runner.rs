/// Scene Runner — bounded capture retries per scene.
///
/// Usage: scene_runner (--scenario <scenario.json> | --scenes <id,id,...>)
///        --failure-plan <plan.json> [--max-retries <n>] [--config <engine.ron>]
///        [--out-dir <dir>]
///
/// Exits 0 when every scene passes, 1 otherwise.

use scene_timeline::core::config::EngineConfig;
use scene_timeline::core::gate::write_report_files;
use scene_timeline::core::retry::{FailurePlan, SceneRunner};
use scene_timeline::schema::manifest::Scenario;
use scene_timeline::schema::scene::SceneId;
use std::path::Path;
use std::process;

const USAGE: &str = "Usage: scene_runner (--scenario <scenario.json> | --scenes <id,id,...>) \
--failure-plan <plan.json> [--max-retries <n>] [--config <engine.ron>] [--out-dir <dir>]";

const REPORT_NAME: &str = "scene_runner_report";

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
    let mut scene_list = None;
    let mut plan_path = None;
    let mut max_retries = None;
    let mut config_path = None;
    let mut out_dir = "out".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" if i + 1 < args.len() => {
                i += 1;
                scenario_path = Some(args[i].clone());
            }
            "--scenes" if i + 1 < args.len() => {
                i += 1;
                scene_list = Some(args[i].clone());
            }
            "--failure-plan" if i + 1 < args.len() => {
                i += 1;
                plan_path = Some(args[i].clone());
            }
            "--max-retries" if i + 1 < args.len() => {
                i += 1;
                max_retries = Some(args[i].parse::<u32>().unwrap_or_else(|_| {
                    eprintln!("Error: --max-retries must be a positive integer");
                    process::exit(1);
                }));
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
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

    let mut config = match config_path {
        Some(ref path) => EngineConfig::load_from_ron(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("Error loading config '{}': {}", path, e);
            process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    if let Some(n) = max_retries {
        if n == 0 {
            eprintln!("Error: --max-retries must be at least 1");
            process::exit(1);
        }
        config.retry.max_retries = n;
    }

    let scene_ids: Vec<SceneId> = match (scenario_path, scene_list) {
        (Some(path), _) => Scenario::load(Path::new(&path))
            .unwrap_or_else(|e| {
                eprintln!("Error loading scenario '{}': {}", path, e);
                process::exit(1);
            })
            .scene_ids(),
        (None, Some(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SceneId::from)
            .collect(),
        (None, None) => {
            eprintln!("Error: --scenario or --scenes is required");
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    let plan_path = plan_path.unwrap_or_else(|| {
        eprintln!("Error: --failure-plan is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });
    let mut plan = FailurePlan::load(Path::new(&plan_path)).unwrap_or_else(|e| {
        eprintln!("Error loading failure plan '{}': {}", plan_path, e);
        process::exit(1);
    });

    let runner = SceneRunner::new(config.retry.clone());
    let report = runner.run(&scene_ids, &mut plan);

    let written = write_report_files(
        Path::new(&out_dir),
        REPORT_NAME,
        &report,
        &report.summary_markdown(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Error writing report to '{}': {}", out_dir, e);
        process::exit(1);
    });

    for path in &written {
        println!("wrote {}", path.display());
    }
    for scene in &report.scenes {
        println!("{}: {} attempt(s)", scene.scene_id, scene.attempt_count);
    }
    println!("status: {}", report.status.as_str());
    process::exit(report.status.exit_code());
}
