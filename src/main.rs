// main.rs - Thin driver: read a script file, run one production, print the log.
// The pipeline itself is UI-agnostic; this binary stands in for a presentation layer.
use scene_director::{PipelineConfig, ProductionOrchestrator, Severity};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging();

    let script_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: scene_director <script-file>");
            std::process::exit(2);
        }
    };

    let script = match std::fs::read_to_string(&script_path) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("failed to read {}: {}", script_path, e);
            std::process::exit(2);
        }
    };

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let orchestrator = ProductionOrchestrator::from_config(&config);
    let cancel = CancellationToken::new();

    let outcome = orchestrator.run(&script, cancel).await;

    for event in orchestrator.events() {
        let severity = match event.severity {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        println!("{} [{:5}] {}: {}", event.timestamp, severity, event.role, event.message);
    }

    for scene in orchestrator.scenes().await {
        if let Some(uri) = &scene.video_uri {
            println!("scene {} \"{}\": {}", scene.index, scene.title, uri);
        }
    }

    if let Err(e) = outcome {
        tracing::error!("run failed: {}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scene_director=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
