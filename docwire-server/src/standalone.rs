//! A processor with no storage behind it.
//!
//! Answers the handshake commands drivers send on connect, so the wire layer
//! can be exercised end to end. Every data operation is rejected; writes
//! fail silently and surface through `getLastError`.

use crate::commands::{
    BuildInfo, BuildInfoReply, DropIndexes, GetLastError, GetLastErrorReply, GetNonce, IsMaster,
    IsMasterReply, Ping,
};
use crate::connection::Connection;
use crate::processor::{CommandExecutors, Request, RequestProcessor};
use crate::registry::{CommandArgument, CommandDescriptor, CommandResult};
use docwire_protocol::WireError;
use std::net::SocketAddr;

/// Storage-less [`RequestProcessor`].
#[derive(Debug)]
pub struct StandaloneProcessor {
    executors: CommandExecutors,
}

impl StandaloneProcessor {
    pub fn new() -> Self {
        let executors = CommandExecutors::new()
            .with(&Ping, |_, _, _| Ok(()))
            .with(&IsMaster, |_, _, _| Ok(IsMasterReply::standalone()))
            .with(&BuildInfo, |_, _, _| Ok(BuildInfoReply::current()))
            .with(&GetNonce, |_, _, _| Ok(GetNonce::generate()))
            .with(&DropIndexes, |_, request, arg| {
                Err(WireError::namespace_not_found(format!(
                    "ns not found: {}.{}",
                    request.database, arg.collection
                )))
            })
            .with(&GetLastError, |connection, _, _| {
                Ok(GetLastErrorReply {
                    error: connection.last_error(),
                    n: 0,
                })
            });
        Self { executors }
    }
}

impl Default for StandaloneProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestProcessor for StandaloneProcessor {
    fn open_connection(&self, remote_addr: SocketAddr) -> Connection {
        let connection = Connection::new(remote_addr);
        tracing::info!("Client connected: {} ({})", remote_addr, connection.id());
        connection
    }

    fn close_connection(&self, connection: &Connection) {
        tracing::info!(
            "Client disconnected: {} ({}, {} requests)",
            connection.remote_addr(),
            connection.id(),
            connection.request_count()
        );
    }

    fn execute(
        &self,
        connection: &Connection,
        request: &Request,
        command: &CommandDescriptor,
        argument: CommandArgument,
    ) -> Result<CommandResult, WireError> {
        self.executors
            .execute(connection, request, command, argument)
    }
}
