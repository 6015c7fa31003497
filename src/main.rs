//! docwire - legacy document-database wire protocol server
//!
//! Speaks the wire protocol without a storage engine: handshake commands are
//! answered, data operations are rejected.

use clap::Parser;
use docwire_bson::{DocumentDecoder, StringPool};
use docwire_server::{
    builtin_registry, run_metrics_server, Config, Dispatcher, Metrics, Server, ServerConfig,
    StandaloneProcessor,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docwire")]
#[command(about = "Legacy document-database wire protocol server")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "DOCWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the configuration file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match cli.config {
        Some(ref path) => {
            let config = Config::from_file(path)?;
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => {
            tracing::info!("Using default configuration");
            Config::default()
        }
    };
    config.apply_env_overrides();

    if let Some(addr) = cli.bind {
        config.network.bind_addr = addr;
    }
    if let Some(addr) = cli.metrics_addr {
        config.metrics.enabled = true;
        config.metrics.bind_addr = addr;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e);
        }
    };

    tracing::info!("Starting docwire server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Allocation: {:?}", config.codec.allocation);
    tracing::info!("  String pool: {:?}", config.codec.string_pool);

    let pool = StringPool::with_kind(config.codec.string_pool)
        .with_purge_interval(config.codec.pool_purge_interval);
    let dispatcher = Dispatcher::new(
        Arc::new(builtin_registry()?),
        Arc::new(StandaloneProcessor::new()),
    )
    .with_decoder(DocumentDecoder::new(Arc::new(pool)))
    .with_strategy(config.codec.allocation);

    let mut server_config = ServerConfig::from_network(&config.network);
    if config.metrics.enabled {
        server_config = server_config.with_metrics(Arc::new(Metrics::new()?));
    }
    let metrics = server_config.metrics.clone();

    let server = Arc::new(Server::new(server_config, dispatcher));

    let metrics_handle = match metrics {
        Some(metrics) => {
            let addr = config.metrics.bind_addr;
            let shutdown = server.subscribe_shutdown();
            Some(tokio::spawn(async move {
                if let Err(e) = run_metrics_server(addr, metrics, shutdown).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            }))
        }
        None => {
            tracing::info!("  Metrics: disabled");
            None
        }
    };

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    server.run().await?;

    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    tracing::info!("Server stopped");
    Ok(())
}
