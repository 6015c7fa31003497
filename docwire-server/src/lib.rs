//! # docwire-server
//!
//! TCP server for the legacy document-database wire protocol.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Opcode routing from frames to the request processor
//! - The command registry and the command dispatch pipeline
//! - Translation of failures into error reply documents
//! - A storage-less processor that answers the driver handshake

pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod processor;
pub mod registry;
pub mod reply;
pub mod server;
pub mod standalone;

pub use commands::builtin_registry;
pub use config::{CodecConfig, Config, ConfigError, MetricsConfig, NetworkConfig};
pub use connection::{Channel, Connection};
pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use metrics::{run_metrics_server, Metrics};
pub use processor::{CommandExecutors, Request, RequestProcessor};
pub use registry::{Command, CommandArgument, CommandDescriptor, CommandRegistry, CommandResult};
pub use reply::translate_error;
pub use server::{Server, ServerConfig, ServerStats};
pub use standalone::StandaloneProcessor;
