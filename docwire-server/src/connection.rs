//! Connections and their channel lifecycle.

use crate::error::ServerError;
use crate::processor::RequestProcessor;
use chrono::{DateTime, Utc};
use docwire_protocol::WireError;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// State kept for one client connection.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    remote_addr: SocketAddr,
    connected_at: DateTime<Utc>,
    request_count: AtomicU64,
    last_activity: Mutex<Instant>,
    /// Failure of the most recent fire-and-forget request, for `getLastError`.
    last_error: Mutex<Option<WireError>>,
}

impl Connection {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_addr,
            connected_at: Utc::now(),
            request_count: AtomicU64::new(0),
            last_activity: Mutex::new(Instant::now()),
            last_error: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Counts a request and refreshes the activity timestamp.
    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        *self.last_activity.lock() = Instant::now();
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn idle_duration(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn set_last_error(&self, error: WireError) {
        *self.last_error.lock() = Some(error);
    }

    pub fn clear_last_error(&self) {
        *self.last_error.lock() = None;
    }

    pub fn last_error(&self) -> Option<WireError> {
        self.last_error.lock().clone()
    }
}

/// Binds at most one [`Connection`] to a transport channel.
///
/// The transport calls [`on_active`](Channel::on_active) once the peer is
/// connected and [`on_inactive`](Channel::on_inactive) when it goes away.
#[derive(Debug)]
pub struct Channel {
    remote_addr: SocketAddr,
    connection: Option<Arc<Connection>>,
}

impl Channel {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            connection: None,
        }
    }

    /// Opens the channel's connection through the processor.
    pub fn on_active(
        &mut self,
        processor: &dyn RequestProcessor,
    ) -> Result<Arc<Connection>, ServerError> {
        if self.connection.is_some() {
            return Err(ServerError::ConnectionAlreadyActive);
        }
        let connection = Arc::new(processor.open_connection(self.remote_addr));
        tracing::debug!(
            "[{}] Opened connection {}",
            self.remote_addr,
            connection.id()
        );
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    /// Closes the channel's connection, if one is open.
    pub fn on_inactive(&mut self, processor: &dyn RequestProcessor) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!(
                "[{}] Closing connection {} after {} requests",
                self.remote_addr,
                connection.id(),
                connection.request_count()
            );
            processor.close_connection(&connection);
        }
    }

    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.connection.is_some()
    }
}
