use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{error, info};
use vmbix_core::{
    build_dispatcher, init_observability, AdapterFactory, CacheBank, Config, ConnectTarget,
    ConnectionHandler, EntityResolver, Listener, ServerStats, Services, SessionSupervisor, Settings,
    WorkerPool,
};

mod cli;
mod pidfile;
mod shutdown;

use cli::Cli;
use pidfile::PidFile;
use shutdown::shutdown_signal;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Validate everything before touching the filesystem or the network
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let settings = cli.apply(config).validate().context("Invalid configuration")?;

    init_observability(&settings.log_level, settings.metrics_port)
        .map_err(|e| anyhow!("Failed to initialize observability: {}", e))?;
    info!(version = env!("CARGO_PKG_VERSION"), "VmBix daemon starting");

    let pid_file = match &settings.pid_file {
        Some(path) => Some(
            PidFile::create(path).with_context(|| format!("Failed to write pid file {}", path.display()))?,
        ),
        None => None,
    };

    let outcome = run(settings).await;
    if let Err(e) = &outcome {
        error!(error = %e, "VmBix daemon failed");
    }

    if let Some(pid_file) = pid_file {
        pid_file.remove();
    }
    info!("VmBix daemon stopped");
    outcome
}

async fn run(settings: Settings) -> Result<()> {
    let connector = AdapterFactory::create(&settings.service_url)?;
    let target = ConnectTarget {
        url: settings.service_url.clone(),
        username: settings.username.clone(),
        password: settings.password.clone(),
        connect_timeout: settings.connect_timeout,
        read_timeout: settings.read_timeout,
    };
    let supervisor = Arc::new(
        SessionSupervisor::connect(connector, target)
            .await
            .with_context(|| format!("Failed to connect to {}", settings.service_url))?,
    );

    let caches = Arc::new(CacheBank::new(&settings.caches));
    let resolver = EntityResolver::new(supervisor.clone(), caches, settings.addressing);
    let stats = Arc::new(ServerStats::new());
    let services =
        Arc::new(Services::new(resolver, stats.clone(), settings.interval, settings.escape_chars));

    let dispatcher = Arc::new(build_dispatcher()?);
    info!(commands = dispatcher.len(), addressing = ?settings.addressing, "Command table ready");

    let handler = Arc::new(ConnectionHandler::new(dispatcher, services, settings.read_timeout));
    let pool = WorkerPool::<TcpStream>::new(settings.max_connections, handler, stats);
    let listener = Listener::bind(settings.bind_address).await?;
    info!(max_connections = settings.max_connections, "VmBix daemon ready");

    let mut shutdown = shutdown_signal();
    tokio::select! {
        _ = listener.run(pool) => {}
        _ = shutdown.recv() => {
            info!("Shutting down");
        }
    }

    supervisor.shutdown().await;
    Ok(())
}
