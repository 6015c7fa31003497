//! TCP server implementation.

use crate::config::NetworkConfig;
use crate::connection::{Channel, Connection};
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::metrics::Metrics;
use dashmap::DashMap;
use docwire_protocol::{Decoder, DEFAULT_PORT};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_connections", &self.max_connections)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            idle_timeout: Duration::from_secs(300),
            max_connections: 1000,
            metrics: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds from the `network` section of the file configuration.
    pub fn from_network(network: &NetworkConfig) -> Self {
        Self::new(network.bind_addr)
            .with_idle_timeout(network.idle_timeout())
            .with_max_connections(network.max_connections)
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub frames_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server speaking the legacy wire protocol.
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ServerStats>,
    connections: Arc<DashMap<Uuid, Arc<Connection>>>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server. Metrics in `config` are attached to the
    /// dispatcher as well.
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let dispatcher = match config.metrics {
            Some(ref metrics) => dispatcher.with_metrics(metrics.clone()),
            None => dispatcher,
        };
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(ServerStats::default()),
            connections: Arc::new(DashMap::new()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the listener without accepting yet.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Runs the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.accept(stream, addr),
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        if self.stats.connections_active.load(Ordering::Relaxed)
            >= self.config.max_connections as u64
        {
            tracing::warn!("Connection limit reached, rejecting {}", addr);
            return;
        }

        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
        if let Some(ref metrics) = self.config.metrics {
            metrics.connections_total.inc();
            metrics.connections_active.inc();
        }

        let dispatcher = self.dispatcher.clone();
        let stats = self.stats.clone();
        let connections = self.connections.clone();
        let config = self.config.clone();
        let mut conn_shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut channel = Channel::new(addr);
            let result = match channel.on_active(dispatcher.processor().as_ref()) {
                Ok(connection) => {
                    connections.insert(connection.id(), connection.clone());
                    Self::handle_connection(
                        stream,
                        &connection,
                        &dispatcher,
                        &stats,
                        config.idle_timeout,
                        &mut conn_shutdown,
                    )
                    .await
                }
                Err(e) => Err(e),
            };
            if let Some(connection) = channel.connection() {
                connections.remove(&connection.id());
            }
            channel.on_inactive(dispatcher.processor().as_ref());

            match result {
                Ok(()) | Err(ServerError::ShuttingDown) => {}
                Err(e) => {
                    tracing::debug!("Connection {} error: {}", addr, e);
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
            }

            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            if let Some(ref metrics) = config.metrics {
                metrics.connections_active.dec();
            }
            dispatcher.update_gauge_metrics();
        });
    }

    /// Reads frames in arrival order and writes each reply before reading on.
    async fn handle_connection(
        mut stream: TcpStream,
        connection: &Connection,
        dispatcher: &Dispatcher,
        stats: &ServerStats,
        idle_timeout: Duration,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = connection.remote_addr();
        let mut decoder = Decoder::new();
        let mut buf = vec![0u8; 8192];

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            tracing::debug!("[{}] Connection closed by client", addr);
                            return Ok(());
                        }
                        Ok(n) => {
                            tracing::trace!("[{}] Received {} bytes", addr, n);
                            decoder.extend(&buf[..n]);
                        }
                        Err(e) => {
                            tracing::debug!("[{}] Read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }

                _ = tokio::time::sleep(idle_timeout) => {
                    if connection.idle_duration() >= idle_timeout {
                        tracing::debug!("[{}] Idle timeout", addr);
                        return Ok(());
                    }
                }

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            }

            while let Some(frame) = decoder.decode_frame().map_err(|e| {
                tracing::warn!("[{}] Closing connection: {}", addr, e);
                e
            })? {
                stats.frames_total.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "[{}] Request: {} (id={}, {} bytes)",
                    addr,
                    frame.op_code(),
                    frame.request_id(),
                    frame.header.message_length
                );

                if let Some(reply) = dispatcher.dispatch(connection, frame)? {
                    tracing::debug!("[{}] Writing {} bytes", addr, reply.len());
                    stream.write_all(&reply).await?;
                }
            }
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns a receiver that fires when the server shuts down.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the connections currently open.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}
