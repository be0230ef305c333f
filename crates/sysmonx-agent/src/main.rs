use anyhow::Result;
use sysmonx_agent::{AgentConfig, Collector, StopOutcome};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let loaded = AgentConfig::load_optional(&config_path)?;
    let config = loaded.clone().unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log_directive().parse()?))
        .init();

    if loaded.is_none() {
        tracing::warn!(path = %config_path, "Config file not found, using defaults");
    }
    tracing::info!(path = %config_path, "sysmonx-agent starting");

    let collector = Collector::with_host_source(config.collector)?;
    collector.start()?;

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    match collector.stop().await {
        StopOutcome::Abandoned => tracing::warn!("Buffered samples were lost on shutdown"),
        outcome => tracing::debug!(?outcome, "Collector stopped"),
    }

    let status = collector.status();
    tracing::info!(
        flushes = status.flush_count,
        logs_dir = %status.logs_dir.display(),
        "sysmonx-agent stopped"
    );
    Ok(())
}
