//! Serve command.

use clap::Args;
use plotbox_core::Config;
use plotbox_gateway::{Gateway, GatewayConfig};
use plotbox_history::{ExecutionHistory, MemoryHistory, RateGovernor, SqliteHistory};
use plotbox_sandbox::{CodeRunner, SandboxOrchestrator};
use std::sync::Arc;
use tracing::info;

/// Serve command arguments.
#[derive(Args)]
pub struct ServeArgs {
    /// Bind address
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port number
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Keep run history in memory instead of the database
    #[arg(long)]
    pub in_memory: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, config: Config) -> anyhow::Result<()> {
    let mut gateway_config = GatewayConfig::from(&config.server);
    if let Some(bind) = args.bind {
        gateway_config.bind = bind;
    }
    if let Some(port) = args.port {
        gateway_config.port = port;
    }

    let orchestrator = SandboxOrchestrator::from_config(&config.execution)?;
    info!(
        worker = %orchestrator.command().program().display(),
        timeout = orchestrator.budget().wall_clock_seconds,
        memory_mb = config.execution.memory_limit_mb,
        "Sandbox configured"
    );
    let runner: Arc<dyn CodeRunner> = Arc::new(orchestrator);

    let history: Arc<dyn ExecutionHistory> = if args.in_memory {
        info!("Using in-memory run history");
        Arc::new(MemoryHistory::new())
    } else {
        info!(url = %config.history.database_url, "Using SQLite run history");
        Arc::new(SqliteHistory::connect(&config.history.database_url).await?)
    };

    let governor = RateGovernor::new(config.rate_limit.clone());

    Gateway::new(gateway_config, runner, history, governor)
        .run()
        .await?;
    Ok(())
}
