mod agent;
mod capture;
mod command;
mod config;
mod connection;
mod device;
mod error;
mod logging;
mod process;
mod storage;
mod telemetry;
mod transport;

#[cfg(test)]
mod testing;

use agent::Agent;
use capture::{CapturePipeline, CaptureSettings};
use clap::Parser;
use command::{CommandExecutor, HandlerContext};
use config::{AgentConfig, DEVICE_CONNECTION_STRING_VAR, STORAGE_CONNECTION_STRING_VAR};
use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use device::{DeviceInspector, THERMAL_PROGRAM};
use process::{ProcessRunner, SystemRunner};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use storage::{AzureBlobStore, BlobStore, StorageProber, StorageUploader};
use telemetry::{Heartbeat, TelemetryEmitter};
use tokio::sync::watch;
use transport::TcpConnector;

use camera_agent_shared::limits;
use tracing::{error, info, warn};

/// How long shutdown waits for queued frames to reach the hub
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "camera-agent", version, about)]
struct Cli {
    /// Hub connection string: HostName=<host[:port]>;DeviceId=<id>
    #[arg(long, env = DEVICE_CONNECTION_STRING_VAR, hide_env_values = true)]
    device_connection_string: Option<String>,

    /// Azure storage account connection string
    #[arg(long, env = STORAGE_CONNECTION_STRING_VAR, hide_env_values = true)]
    storage_connection_string: Option<String>,

    /// Also write logs to this file (e.g. /var/log/camera-client.log)
    #[arg(long, env = "CAMERA_AGENT_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match AgentConfig::from_secrets(
        cli.device_connection_string.map(SecretString::from),
        cli.storage_connection_string.map(SecretString::from),
    ) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let device_id = config.device.device_id.clone();
    info!("Camera agent starting: {}", device_id);
    info!("  Hub: {}", config.device.hub_address);
    info!("  Storage account: {}", config.storage.name);

    if !Path::new(THERMAL_PROGRAM).exists() {
        warn!("{} not found; not running on a Raspberry Pi, some features may not work", THERMAL_PROGRAM);
    }

    let conn_config = ConnectionConfig {
        device_id: device_id.clone(),
        ..Default::default()
    };
    let mut conn = ConnectionManager::new(conn_config, TcpConnector::new(config.device.hub_address.as_str()));
    let sender = conn.sender();
    let telemetry = TelemetryEmitter::new(sender.clone());
    let state = ConnectionState::new();

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
    let store: Arc<dyn BlobStore> = Arc::new(AzureBlobStore::new(config.storage)?);

    let pipeline = CapturePipeline::new(
        runner.clone(),
        StorageUploader::new(store.clone(), limits::CONTAINER_NAME),
        telemetry.clone(),
        CaptureSettings::default(),
    );
    let executor = CommandExecutor::new(HandlerContext {
        device_id,
        pipeline: pipeline.clone(),
        inspector: DeviceInspector::new(runner),
        prober: StorageProber::new(store, limits::CONTAINER_NAME),
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    let heartbeat = Heartbeat::spawn(
        telemetry.clone(),
        state.clone(),
        Duration::from_secs(limits::HEARTBEAT_INTERVAL_SECS),
        stop_rx,
    );
    info!("Heartbeat every {}s", limits::HEARTBEAT_INTERVAL_SECS);

    let mut agent = Agent::new(executor, pipeline, sender, state);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // Main event loop
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            event = conn.recv() => {
                let Some(event) = event else {
                    error!("Connection manager closed");
                    break;
                };
                agent.handle_event(event);
            }
        }
    }

    let _ = stop_tx.send(true);
    let _ = heartbeat.await;

    agent.announce_stop();
    conn.disconnect(SHUTDOWN_GRACE).await;

    info!("Camera agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
}
