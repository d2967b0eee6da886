use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use harken_core::{
    AutomationBridge, Config, Daemon, InferenceEngine, InferenceOutcome, MediaOutput, Result, Role,
};

/// Harken - control plane for the Harken voice assistant
#[derive(Parser)]
#[command(name = "harken", version, about)]
struct Cli {
    /// Run as the inference server or as an edge-node client
    #[arg(long, value_enum, env = "HARKEN_ROLE", default_value = "server")]
    role: Role,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "HARKEN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the main transport port
    #[arg(long, env = "HARKEN_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,harken_core=info",
        1 => "info,harken_core=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = cli
        .config
        .as_deref()
        .map(Config::load)
        .transpose()?
        .unwrap_or_default();
    if let Some(port) = cli.port {
        config.main_server_port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    // The worker-thread count is configuration, so the runtime is built by
    // hand instead of with #[tokio::main].
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if config.threads > 0 {
        builder.worker_threads(config.threads);
    }
    let runtime = builder.enable_all().build()?;

    let role = cli.role;
    runtime.block_on(async move {
        let daemon = Daemon::new(
            config,
            role,
            Arc::new(PassthroughEngine),
            Arc::new(LoggingBridge),
            Arc::new(UnconfiguredMedia),
        );
        daemon.run().await
    })?;

    Ok(())
}

/// Placeholder engine until a real inference backend is wired in:
/// returns every payload unchanged.
struct PassthroughEngine;

#[async_trait]
impl InferenceEngine for PassthroughEngine {
    async fn process(&self, audio: &[u8]) -> Result<InferenceOutcome> {
        Ok(InferenceOutcome::Raw(audio.to_vec()))
    }
}

/// Placeholder bridge that logs every command and reports success.
struct LoggingBridge;

#[async_trait]
impl AutomationBridge for LoggingBridge {
    async fn call_service(&self, domain: &str, service: &str, entity_id: &str) -> Result<bool> {
        tracing::info!(domain, service, entity_id, "automation call (no bridge configured)");
        Ok(true)
    }

    async fn send_state_change(&self, entity_id: &str, new_state: &str) -> Result<bool> {
        tracing::info!(entity_id, new_state, "state change (no bridge configured)");
        Ok(true)
    }
}

/// Placeholder media collaborator that rejects playback requests.
struct UnconfiguredMedia;

#[async_trait]
impl MediaOutput for UnconfiguredMedia {
    async fn find_track(&self, _entities: &[harken_core::Entity]) -> Result<String> {
        Err(harken_core::Error::Dispatch(
            "no media output configured".to_string(),
        ))
    }

    async fn play(&self, _client: &harken_core::ClientInfo, _track_id: &str) -> Result<bool> {
        Err(harken_core::Error::Dispatch(
            "no media output configured".to_string(),
        ))
    }
}
