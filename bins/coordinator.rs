use std::path::PathBuf;

use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use configs::AppConfig;
use service::Coordinator;

/// One scripted action: `{"action": "add_funds", "payload": {"amount": 10}}`.
#[derive(Debug, Deserialize)]
struct ScriptStep {
    action: String,
    #[serde(default)]
    payload: Value,
}

async fn load_script(path: &PathBuf) -> anyhow::Result<Vec<ScriptStep>> {
    let raw = tokio::fs::read(path).await.with_context(|| format!("read script {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parse script {}", path.display()))
}

async fn run(cfg: AppConfig, script: Option<PathBuf>) -> anyhow::Result<()> {
    let coordinator = Coordinator::bootstrap(&cfg).await?;

    if let Some(path) = script {
        let steps = load_script(&path).await?;
        info!(service = "coordinator", event = "script_loaded", steps = steps.len(), "replaying script");
        for step in steps {
            let result = coordinator.dispatch(&step.action, step.payload).await;
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    println!("{}", serde_json::to_string_pretty(&coordinator.snapshot().await)?);
    Ok(())
}

fn main() -> std::process::ExitCode {
    // 提前加载 .env，使得 RUST_LOG / CONFIG_PATH 生效
    dotenv().ok();

    let cfg = AppConfig::load_and_validate();
    let format = cfg.as_ref().map(|c| c.logging.format.clone()).unwrap_or_default();
    common::utils::logging::init_logging(&format);
    info!(service = "coordinator", event = "logger_init", "tracing subscriber initialized");

    let cfg = match cfg {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(service = "coordinator", event = "config_invalid", error = %e, "failed to load config");
            return std::process::ExitCode::FAILURE;
        }
    };

    let run_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "coordinator", event = "panic", %run_id, pid, message = %info, "unhandled panic occurred");
    }));

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "coordinator", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    let script = std::env::args_os().nth(1).map(PathBuf::from);
    info!(
        service = "coordinator",
        event = "start",
        %run_id,
        pid,
        version,
        backend = ?cfg.storage.backend,
        "coordinator starting"
    );

    rt.block_on(async move {
        tokio::select! {
            res = run(cfg, script) => match res {
                Ok(()) => {
                    info!(service = "coordinator", event = "stop", %run_id, "finished");
                    std::process::ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(service = "coordinator", event = "run_failed", error = %e, "coordinator run failed");
                    std::process::ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(service = "coordinator", event = "shutdown_signal", %run_id, "received Ctrl+C, stopping");
                std::process::ExitCode::SUCCESS
            }
        }
    })
}
