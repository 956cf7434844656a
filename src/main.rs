use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use cosigner_client::{ClientConfig, HttpCustodyClient};
use cosigner_config::{AgentCredentials, Config};
use cosigner_engine::{Cosigner, PollCursor, Poller, PollerConfig};
use cosigner_log::{init_tracing, LogFormat};
use cosigner_telemetry::{CosignerMetrics, MetricsRegistry, MetricsServer};
use std::{path::PathBuf, sync::Arc, time::Duration};

#[derive(Parser, Debug)]
#[command(
    name = "cosigner",
    about = "Co-signing agent for a federated multisig custody group",
    version
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// How far back the first poll reaches, e.g. 30m or 2h
    #[arg(long, value_name = "DURATION", default_value = "1h", value_parser = humantime::parse_duration)]
    since: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(LogFormat::from_env())
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;

    let config = Config::load(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from {}",
            cli.config.display()
        )
    })?;
    let credentials = AgentCredentials::from_dapp(&config.dapp)
        .context("failed to compose agent credentials")?;
    let policy = config.group.policy();

    let registry = Arc::new(MetricsRegistry::new());
    let metrics = CosignerMetrics::register(&registry)?;
    let metrics_task = match config.telemetry.listen_address {
        Some(address) => {
            let server = MetricsServer::new(address, registry.clone())
                .bind()
                .await
                .context("failed to start metrics server")?;
            Some(server.spawn())
        }
        None => None,
    };

    let client_config =
        ClientConfig::from_api(&config.api).context("invalid api configuration")?;
    let client = HttpCustodyClient::new(client_config, &credentials)
        .context("failed to build custody client")?;

    let cosigner = Cosigner::new(
        credentials.client_id(),
        credentials.pin(),
        policy.sign_threshold,
    );
    let cursor = PollCursor::with_lookback(Utc::now(), cli.since);

    tracing::info!(
        client_id = %credentials.client_id(),
        members = policy.members.len(),
        threshold = policy.threshold,
        sign_threshold = policy.sign_threshold,
        since = %humantime::format_duration(cli.since),
        "Starting co-signer"
    );

    Poller::new(
        client,
        cosigner,
        PollerConfig::new(&policy, &config.poll),
        cursor,
        metrics,
    )
    .run(shutdown_signal())
    .await;

    if let Some(task) = metrics_task {
        task.abort();
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutting down...");
}
