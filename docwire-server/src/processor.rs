//! The request processor interface.
//!
//! The dispatcher owns the wire protocol; everything that touches data is
//! delegated to a [`RequestProcessor`]. Commands reach the processor already
//! resolved, authorized and unmarshalled.

use crate::connection::Connection;
use crate::registry::{Command, CommandArgument, CommandDescriptor, CommandResult};
use docwire_protocol::{
    DeleteMessage, GetMoreMessage, InsertMessage, KillCursorsMessage, QueryMessage, ReplyMessage,
    UpdateMessage, WireError, ADMIN_DATABASE,
};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Context of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Database the request targets.
    pub database: String,
    pub client_addr: SocketAddr,
    /// Whether the client accepts reads from a secondary.
    pub slave_ok: bool,
    /// Point after which the caller no longer wants an answer. The dispatcher
    /// passes it through without acting on it.
    pub deadline: Option<Instant>,
}

impl Request {
    pub fn new(database: impl Into<String>, client_addr: SocketAddr) -> Self {
        Self {
            database: database.into(),
            client_addr,
            slave_ok: false,
            deadline: None,
        }
    }

    pub fn with_slave_ok(mut self, slave_ok: bool) -> Self {
        self.slave_ok = slave_ok;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns whether the request targets the admin database.
    pub fn is_admin(&self) -> bool {
        self.database == ADMIN_DATABASE
    }

    /// Returns whether the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

/// Executes requests on behalf of the dispatcher.
///
/// Only [`execute`](RequestProcessor::execute) is required. The other
/// operations default to rejecting the request with `CommandNotSupported`.
pub trait RequestProcessor: Send + Sync {
    /// Creates the state for a newly connected client.
    fn open_connection(&self, remote_addr: SocketAddr) -> Connection {
        Connection::new(remote_addr)
    }

    /// Releases a connection's state.
    fn close_connection(&self, _connection: &Connection) {}

    /// Runs a resolved command.
    fn execute(
        &self,
        connection: &Connection,
        request: &Request,
        command: &CommandDescriptor,
        argument: CommandArgument,
    ) -> Result<CommandResult, WireError>;

    fn query(
        &self,
        _connection: &Connection,
        _request: &Request,
        message: &QueryMessage,
    ) -> Result<ReplyMessage, WireError> {
        Err(unsupported("query", &message.namespace))
    }

    fn get_more(
        &self,
        _connection: &Connection,
        _request: &Request,
        message: &GetMoreMessage,
    ) -> Result<ReplyMessage, WireError> {
        Err(unsupported("getMore", &message.namespace))
    }

    fn insert(
        &self,
        _connection: &Connection,
        _request: &Request,
        message: &InsertMessage,
    ) -> Result<(), WireError> {
        Err(unsupported("insert", &message.namespace))
    }

    fn update(
        &self,
        _connection: &Connection,
        _request: &Request,
        message: &UpdateMessage,
    ) -> Result<(), WireError> {
        Err(unsupported("update", &message.namespace))
    }

    fn delete(
        &self,
        _connection: &Connection,
        _request: &Request,
        message: &DeleteMessage,
    ) -> Result<(), WireError> {
        Err(unsupported("delete", &message.namespace))
    }

    fn kill_cursors(
        &self,
        _connection: &Connection,
        _message: &KillCursorsMessage,
    ) -> Result<(), WireError> {
        Err(WireError::command_not_supported("killCursors is not supported"))
    }

    /// Receives the failure of a request that cannot be replied to.
    fn record_error(&self, connection: &Connection, error: &WireError) {
        connection.set_last_error(error.clone());
    }
}

fn unsupported(op: &str, namespace: &impl fmt::Display) -> WireError {
    WireError::command_not_supported(format!("{} on {} is not supported", op, namespace))
}

type Executor = Box<
    dyn Fn(&Connection, &Request, CommandArgument) -> Result<CommandResult, WireError>
        + Send
        + Sync,
>;

/// Routes resolved commands to typed closures.
///
/// A processor can implement [`RequestProcessor::execute`] by forwarding to
/// [`CommandExecutors::execute`]; each closure then sees the command's own
/// argument type instead of an erased one.
#[derive(Default)]
pub struct CommandExecutors {
    executors: HashMap<&'static str, Executor>,
}

impl CommandExecutors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `executor` to `command`, replacing any previous binding.
    pub fn register<C, F>(&mut self, command: &C, executor: F)
    where
        C: Command,
        F: Fn(&Connection, &Request, C::Arg) -> Result<C::Result, WireError>
            + Send
            + Sync
            + 'static,
    {
        let name = command.name();
        let erased = move |connection: &Connection,
                           request: &Request,
                           argument: CommandArgument|
              -> Result<CommandResult, WireError> {
            let argument = argument.downcast::<C::Arg>().map_err(|_| {
                WireError::internal(format!("{} received an argument of the wrong type", name))
            })?;
            let result = executor(connection, request, *argument)?;
            Ok(Box::new(result))
        };
        self.executors.insert(name, Box::new(erased));
    }

    /// Chained form of [`register`](Self::register).
    pub fn with<C, F>(mut self, command: &C, executor: F) -> Self
    where
        C: Command,
        F: Fn(&Connection, &Request, C::Arg) -> Result<C::Result, WireError>
            + Send
            + Sync
            + 'static,
    {
        self.register(command, executor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    /// Runs the closure bound to `command`.
    pub fn execute(
        &self,
        connection: &Connection,
        request: &Request,
        command: &CommandDescriptor,
        argument: CommandArgument,
    ) -> Result<CommandResult, WireError> {
        match self.executors.get(command.name()) {
            Some(executor) => executor(connection, request, argument),
            None => Err(WireError::command_not_supported(format!(
                "{} is not supported",
                command.name()
            ))),
        }
    }
}

impl fmt::Debug for CommandExecutors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.executors.keys().collect();
        names.sort();
        f.debug_struct("CommandExecutors")
            .field("commands", &names)
            .finish()
    }
}
