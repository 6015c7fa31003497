//! Command registry.
//!
//! A command is described once by a type implementing [`Command`]: its
//! canonical name, aliases, whether it is admin-only, and how its argument is
//! read from and its result written to a document. The registry erases the
//! argument and result types so descriptors of different commands can share
//! one lookup table. The table is filled before serving starts and is only
//! read afterwards.

use crate::error::ServerError;
use docwire_bson::Document;
use docwire_protocol::WireError;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A command argument after unmarshalling, with its concrete type erased.
pub type CommandArgument = Box<dyn Any + Send>;

/// A command result before marshalling, with its concrete type erased.
pub type CommandResult = Box<dyn Any + Send>;

/// Static description of one command.
pub trait Command: Send + Sync + 'static {
    type Arg: Send + 'static;
    type Result: Send + 'static;

    /// Canonical name, matched case-sensitively against the first key.
    fn name(&self) -> &'static str;

    /// Alternative spellings accepted for the name.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether the command may only run against the admin database.
    fn admin_only(&self) -> bool {
        false
    }

    /// Reads the argument from the command document. `alias` is the key the
    /// client actually used, so the command's own field can be read by it.
    fn unmarshal_arg(&self, command: &Document, alias: &str) -> Result<Self::Arg, WireError>;

    /// Writes the result. An `ok` field is added later if absent. Any error
    /// returned here reaches the client as `FailedToParse`.
    fn marshal_result(&self, result: Self::Result) -> Result<Document, WireError>;
}

trait ErasedCommand: Send + Sync {
    fn unmarshal(&self, command: &Document, alias: &str) -> Result<CommandArgument, WireError>;
    fn marshal(&self, result: CommandResult) -> Result<Document, WireError>;
}

impl<C: Command> ErasedCommand for C {
    fn unmarshal(&self, command: &Document, alias: &str) -> Result<CommandArgument, WireError> {
        let arg = self.unmarshal_arg(command, alias)?;
        Ok(Box::new(arg))
    }

    fn marshal(&self, result: CommandResult) -> Result<Document, WireError> {
        match result.downcast::<C::Result>() {
            Ok(result) => self
                .marshal_result(*result)
                .map_err(|e| WireError::failed_to_parse(e.message)),
            Err(_) => Err(WireError::internal(format!(
                "{} was executed with a result of the wrong type",
                self.name()
            ))),
        }
    }
}

/// Type-erased registry entry.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: &'static str,
    aliases: &'static [&'static str],
    admin_only: bool,
    command: Arc<dyn ErasedCommand>,
}

impl CommandDescriptor {
    pub fn new<C: Command>(command: C) -> Self {
        Self {
            name: command.name(),
            aliases: command.aliases(),
            admin_only: command.admin_only(),
            command: Arc::new(command),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    pub fn is_admin_only(&self) -> bool {
        self.admin_only
    }

    /// Returns the canonical name and every alias.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    pub fn unmarshal_arg(
        &self,
        command: &Document,
        alias: &str,
    ) -> Result<CommandArgument, WireError> {
        self.command.unmarshal(command, alias)
    }

    pub fn marshal_result(&self, result: CommandResult) -> Result<Document, WireError> {
        self.command.marshal(result)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("admin_only", &self.admin_only)
            .finish()
    }
}

/// Lookup table from command name or alias to descriptor.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    descriptors: Vec<CommandDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command under its name and aliases.
    ///
    /// Fails without modifying the registry if any of them is taken.
    pub fn register<C: Command>(&mut self, command: C) -> Result<(), ServerError> {
        let descriptor = CommandDescriptor::new(command);
        if let Some(taken) = descriptor.names().find(|n| self.index.contains_key(n)) {
            return Err(ServerError::DuplicateCommand(taken.to_string()));
        }
        let slot = self.descriptors.len();
        for name in descriptor.names() {
            self.index.insert(name, slot);
        }
        tracing::debug!("Registered command {}", descriptor.name());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Chained form of [`register`](Self::register).
    pub fn with<C: Command>(mut self, command: C) -> Result<Self, ServerError> {
        self.register(command)?;
        Ok(self)
    }

    /// Finds a command by exact name or alias, returning the descriptor and
    /// the spelling that matched.
    pub fn find(&self, key: &str) -> Option<(&CommandDescriptor, &'static str)> {
        let (name, slot) = self.index.get_key_value(key)?;
        Some((&self.descriptors[*slot], *name))
    }

    /// Resolves the command named by the first key of `command`.
    pub fn resolve(&self, command: &Document) -> Result<(&CommandDescriptor, &'static str), WireError> {
        let key = command
            .first_key()
            .ok_or_else(|| WireError::command_not_found("no such command: empty document query"))?;
        self.find(key)
            .ok_or_else(|| WireError::command_not_found(format!("no such command: '{}'", key)))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterates descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.descriptors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docwire_bson::reader;
    use docwire_protocol::ErrorCode;

    struct Echo;

    impl Command for Echo {
        type Arg = String;
        type Result = String;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn aliases(&self) -> &'static [&'static str] {
            &["ECHO"]
        }

        fn unmarshal_arg(&self, command: &Document, alias: &str) -> Result<String, WireError> {
            Ok(reader::get_str(command, alias)?.to_string())
        }

        fn marshal_result(&self, result: String) -> Result<Document, WireError> {
            Ok(Document::builder().append("echoed", result).build())
        }
    }

    struct Shutdown;

    impl Command for Shutdown {
        type Arg = ();
        type Result = ();

        fn name(&self) -> &'static str {
            "shutdown"
        }

        fn admin_only(&self) -> bool {
            true
        }

        fn unmarshal_arg(&self, _: &Document, _: &str) -> Result<(), WireError> {
            Ok(())
        }

        fn marshal_result(&self, _: ()) -> Result<Document, WireError> {
            Ok(Document::new())
        }
    }

    fn registry() -> CommandRegistry {
        CommandRegistry::new()
            .with(Echo)
            .unwrap()
            .with(Shutdown)
            .unwrap()
    }

    #[test]
    fn test_find_by_name_and_alias() {
        let registry = registry();
        let (desc, alias) = registry.find("echo").unwrap();
        assert_eq!(desc.name(), "echo");
        assert_eq!(alias, "echo");

        let (desc, alias) = registry.find("ECHO").unwrap();
        assert_eq!(desc.name(), "echo");
        assert_eq!(alias, "ECHO");

        assert!(registry.find("Echo").is_none());
        assert!(registry.find("shutdown").unwrap().0.is_admin_only());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_resolve_empty_document() {
        let err = registry().resolve(&Document::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandNotFound);
        assert_eq!(err.message, "no such command: empty document query");
    }

    #[test]
    fn test_resolve_unknown_names_key() {
        let doc = Document::builder().append("bogus", 1).build();
        let err = registry().resolve(&doc).unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandNotFound);
        assert!(err.message.contains("bogus"));
    }

    #[test]
    fn test_resolve_uses_first_key_only() {
        let doc = Document::builder()
            .append("bogus", 1)
            .append("echo", "hi")
            .build();
        assert!(registry().resolve(&doc).is_err());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = registry();
        let err = registry.register(Echo).unwrap_err();
        assert!(matches!(err, ServerError::DuplicateCommand(ref n) if n == "echo"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_erased_roundtrip() {
        let registry = registry();
        let doc = Document::builder().append("ECHO", "hello").build();
        let (desc, alias) = registry.resolve(&doc).unwrap();

        let arg = desc.unmarshal_arg(&doc, alias).unwrap();
        let arg = arg.downcast::<String>().unwrap();
        assert_eq!(*arg, "hello");

        let out = desc.marshal_result(Box::new(String::from("back"))).unwrap();
        assert_eq!(out.get("echoed").and_then(|v| v.as_str()), Some("back"));
    }

    #[test]
    fn test_marshal_wrong_result_type() {
        let registry = registry();
        let (desc, _) = registry.find("echo").unwrap();
        let err = desc.marshal_result(Box::new(42i32)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_unmarshal_type_mismatch() {
        let registry = registry();
        let doc = Document::builder().append("echo", 1).build();
        let (desc, alias) = registry.resolve(&doc).unwrap();
        let err = desc.unmarshal_arg(&doc, alias).unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }
}
