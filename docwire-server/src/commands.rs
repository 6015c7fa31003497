//! Built-in command descriptors.
//!
//! These describe the argument and result shapes of a few commands every
//! client issues on connect. Executing them is up to the processor.

use crate::error::ServerError;
use crate::registry::{Command, CommandRegistry};
use docwire_bson::{reader, Array, DateTime, Document, Value, MAX_DOCUMENT_SIZE};
use docwire_protocol::{ErrorCode, WireError, MAX_MESSAGE_SIZE};

/// Registers every built-in command.
pub fn register_all(registry: &mut CommandRegistry) -> Result<(), ServerError> {
    registry.register(Ping)?;
    registry.register(IsMaster)?;
    registry.register(BuildInfo)?;
    registry.register(GetNonce)?;
    registry.register(DropIndexes)?;
    registry.register(GetLastError)?;
    Ok(())
}

/// A registry holding the built-in commands.
pub fn builtin_registry() -> Result<CommandRegistry, ServerError> {
    let mut registry = CommandRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

/// `{ping: 1}` → `{}`
pub struct Ping;

impl Command for Ping {
    type Arg = ();
    type Result = ();

    fn name(&self) -> &'static str {
        "ping"
    }

    fn unmarshal_arg(&self, _command: &Document, _alias: &str) -> Result<(), WireError> {
        Ok(())
    }

    fn marshal_result(&self, _result: ()) -> Result<Document, WireError> {
        Ok(Document::new())
    }
}

/// `{isMaster: 1}` → server role and limits.
pub struct IsMaster;

#[derive(Debug, Clone, PartialEq)]
pub struct IsMasterReply {
    pub is_master: bool,
    pub secondary: bool,
    pub max_bson_object_size: i32,
    pub max_message_size_bytes: i32,
    pub max_write_batch_size: i32,
    pub local_time: DateTime,
    pub min_wire_version: i32,
    pub max_wire_version: i32,
}

impl IsMasterReply {
    /// The reply of a standalone server.
    pub fn standalone() -> Self {
        Self {
            is_master: true,
            secondary: false,
            max_bson_object_size: MAX_DOCUMENT_SIZE as i32,
            max_message_size_bytes: MAX_MESSAGE_SIZE as i32,
            max_write_batch_size: 1000,
            local_time: DateTime::now(),
            min_wire_version: 0,
            max_wire_version: 2,
        }
    }
}

impl Command for IsMaster {
    type Arg = ();
    type Result = IsMasterReply;

    fn name(&self) -> &'static str {
        "isMaster"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["ismaster"]
    }

    fn unmarshal_arg(&self, _command: &Document, _alias: &str) -> Result<(), WireError> {
        Ok(())
    }

    fn marshal_result(&self, r: IsMasterReply) -> Result<Document, WireError> {
        Ok(Document::builder()
            .append("ismaster", r.is_master)
            .append("secondary", r.secondary)
            .append("maxBsonObjectSize", r.max_bson_object_size)
            .append("maxMessageSizeBytes", r.max_message_size_bytes)
            .append("maxWriteBatchSize", r.max_write_batch_size)
            .append("localTime", r.local_time)
            .append("maxWireVersion", r.max_wire_version)
            .append("minWireVersion", r.min_wire_version)
            .build())
    }
}

/// `{buildInfo: 1}` → server version details.
pub struct BuildInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildInfoReply {
    pub version: String,
    pub version_array: Vec<i32>,
    pub git_version: String,
    pub bits: i32,
    pub debug: bool,
    pub max_bson_object_size: i32,
}

impl BuildInfoReply {
    /// Describes this build.
    pub fn current() -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();
        let mut version_array: Vec<i32> = version
            .split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect();
        version_array.resize(4, 0);
        Self {
            version,
            version_array,
            git_version: "unknown".to_string(),
            bits: (usize::BITS) as i32,
            debug: cfg!(debug_assertions),
            max_bson_object_size: MAX_DOCUMENT_SIZE as i32,
        }
    }
}

impl Command for BuildInfo {
    type Arg = ();
    type Result = BuildInfoReply;

    fn name(&self) -> &'static str {
        "buildInfo"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["buildinfo"]
    }

    fn unmarshal_arg(&self, _command: &Document, _alias: &str) -> Result<(), WireError> {
        Ok(())
    }

    fn marshal_result(&self, r: BuildInfoReply) -> Result<Document, WireError> {
        let version_array: Array = r.version_array.into_iter().map(Value::Int32).collect();
        Ok(Document::builder()
            .append("version", r.version)
            .append("gitVersion", r.git_version)
            .append("versionArray", version_array)
            .append("bits", r.bits)
            .append("debug", r.debug)
            .append("maxBsonObjectSize", r.max_bson_object_size)
            .build())
    }
}

/// `{getnonce: 1}` against `admin` → `{nonce}`
pub struct GetNonce;

impl GetNonce {
    /// A fresh random nonce as 16 hex digits.
    pub fn generate() -> String {
        let random = uuid::Uuid::new_v4();
        hex::encode(&random.as_bytes()[..8])
    }
}

impl Command for GetNonce {
    type Arg = ();
    type Result = String;

    fn name(&self) -> &'static str {
        "getnonce"
    }

    fn admin_only(&self) -> bool {
        true
    }

    fn unmarshal_arg(&self, _command: &Document, _alias: &str) -> Result<(), WireError> {
        Ok(())
    }

    fn marshal_result(&self, nonce: String) -> Result<Document, WireError> {
        Ok(Document::builder().append("nonce", nonce).build())
    }
}

/// `{dropIndexes: <collection>, index: <name | "*" | key pattern>}` →
/// `{nIndexesWas}`
pub struct DropIndexes;

/// Which indexes `dropIndexes` removes.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSelector {
    /// `"*"`: every index except the one on `_id`.
    All,
    Name(String),
    KeyPattern(Document),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexesArg {
    pub collection: String,
    pub index: IndexSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropIndexesReply {
    pub n_indexes_was: i32,
}

impl Command for DropIndexes {
    type Arg = DropIndexesArg;
    type Result = DropIndexesReply;

    fn name(&self) -> &'static str {
        "dropIndexes"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["deleteIndexes"]
    }

    fn unmarshal_arg(&self, command: &Document, alias: &str) -> Result<DropIndexesArg, WireError> {
        let collection = reader::get_str(command, alias)?.to_string();
        if collection.is_empty() {
            return Err(WireError::new(
                ErrorCode::InvalidNamespace,
                "collection name must not be empty",
            ));
        }
        let index = match reader::get_value(command, "index")? {
            Value::String(s) if s.as_str() == "*" => IndexSelector::All,
            Value::String(s) => IndexSelector::Name(s.to_string()),
            Value::Document(d) => IndexSelector::KeyPattern(d.clone().into_owned()),
            other => {
                return Err(WireError::new(
                    ErrorCode::TypeMismatch,
                    format!(
                        "Expected string or document type for field index. Found {}",
                        other.element_type().name()
                    ),
                ))
            }
        };
        Ok(DropIndexesArg { collection, index })
    }

    fn marshal_result(&self, r: DropIndexesReply) -> Result<Document, WireError> {
        Ok(Document::builder()
            .append("nIndexesWas", r.n_indexes_was)
            .build())
    }
}

/// `{getLastError: 1, w, wtimeout, fsync, j}` → outcome of the previous
/// fire-and-forget request on the same connection.
pub struct GetLastError;

#[derive(Debug, Clone, PartialEq)]
pub struct GetLastErrorArg {
    /// Requested write concern, passed through untouched.
    pub w: Option<Value>,
    pub wtimeout: i32,
    pub fsync: bool,
    pub j: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetLastErrorReply {
    pub error: Option<WireError>,
    /// Documents affected by the previous write.
    pub n: i64,
}

impl Command for GetLastError {
    type Arg = GetLastErrorArg;
    type Result = GetLastErrorReply;

    fn name(&self) -> &'static str {
        "getLastError"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["getlasterror"]
    }

    fn unmarshal_arg(&self, command: &Document, _alias: &str) -> Result<GetLastErrorArg, WireError> {
        Ok(GetLastErrorArg {
            w: command.get("w").cloned().map(Value::into_owned),
            wtimeout: reader::get_i32_or(command, "wtimeout", 0)?,
            fsync: reader::is_pseudo_true(command, "fsync"),
            j: reader::is_pseudo_true(command, "j"),
        })
    }

    fn marshal_result(&self, r: GetLastErrorReply) -> Result<Document, WireError> {
        let mut builder = Document::builder().append("n", r.n);
        builder = match r.error {
            Some(error) => builder
                .append("err", error.message)
                .append("code", error.code.code()),
            None => builder.append("err", Value::Null),
        };
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docwire_bson::ElementType;

    fn cmd(build: impl FnOnce(docwire_bson::DocumentBuilder) -> docwire_bson::DocumentBuilder) -> Document {
        build(Document::builder()).build()
    }

    #[test]
    fn test_builtin_registry() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.len(), 6);
        for name in [
            "ping",
            "isMaster",
            "ismaster",
            "buildInfo",
            "buildinfo",
            "getnonce",
            "dropIndexes",
            "deleteIndexes",
            "getLastError",
            "getlasterror",
        ] {
            assert!(registry.find(name).is_some(), "{} not registered", name);
        }
        assert!(registry.find("getnonce").unwrap().0.is_admin_only());
        assert!(!registry.find("ping").unwrap().0.is_admin_only());
    }

    #[test]
    fn test_ping() {
        assert_eq!(Ping.marshal_result(()).unwrap(), Document::new());
    }

    #[test]
    fn test_is_master_shape() {
        let doc = IsMaster
            .marshal_result(IsMasterReply::standalone())
            .unwrap();
        assert_eq!(doc.first_key(), Some("ismaster"));
        assert_eq!(doc.get("ismaster"), Some(&Value::Boolean(true)));
        assert_eq!(
            doc.get("maxBsonObjectSize"),
            Some(&Value::Int32(16 * 1024 * 1024))
        );
        assert_eq!(
            doc.get("localTime").map(|v| v.element_type()),
            Some(ElementType::DateTime)
        );
    }

    #[test]
    fn test_build_info_version_array() {
        let info = BuildInfoReply::current();
        assert_eq!(info.version_array.len(), 4);
        let doc = BuildInfo.marshal_result(info).unwrap();
        let array = doc.get("versionArray").and_then(|v| v.as_array()).unwrap();
        assert_eq!(array.len(), 4);
        assert!(array.iter().all(|v| matches!(v, Value::Int32(_))));
    }

    #[test]
    fn test_nonce() {
        let a = GetNonce::generate();
        let b = GetNonce::generate();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        let doc = GetNonce.marshal_result(a.clone()).unwrap();
        assert_eq!(doc.get("nonce").and_then(|v| v.as_str()), Some(a.as_str()));
    }

    #[test]
    fn test_drop_indexes_arguments() {
        let arg = DropIndexes
            .unmarshal_arg(
                &cmd(|b| b.append("dropIndexes", "users").append("index", "*")),
                "dropIndexes",
            )
            .unwrap();
        assert_eq!(arg.collection, "users");
        assert_eq!(arg.index, IndexSelector::All);

        let arg = DropIndexes
            .unmarshal_arg(
                &cmd(|b| b.append("deleteIndexes", "users").append("index", "age_1")),
                "deleteIndexes",
            )
            .unwrap();
        assert_eq!(arg.index, IndexSelector::Name("age_1".into()));

        let pattern = cmd(|b| b.append("age", 1));
        let arg = DropIndexes
            .unmarshal_arg(
                &cmd(|b| b.append("dropIndexes", "users").append("index", pattern.clone())),
                "dropIndexes",
            )
            .unwrap();
        assert_eq!(arg.index, IndexSelector::KeyPattern(pattern));
    }

    #[test]
    fn test_drop_indexes_argument_errors() {
        let err = DropIndexes
            .unmarshal_arg(&cmd(|b| b.append("dropIndexes", "users")), "dropIndexes")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoSuchKey);

        let err = DropIndexes
            .unmarshal_arg(
                &cmd(|b| b.append("dropIndexes", 1).append("index", "*")),
                "dropIndexes",
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);

        let err = DropIndexes
            .unmarshal_arg(
                &cmd(|b| b.append("dropIndexes", "users").append("index", 5)),
                "dropIndexes",
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
        assert_eq!(
            err.message,
            "Expected string or document type for field index. Found int32"
        );
    }

    #[test]
    fn test_drop_indexes_result() {
        let doc = DropIndexes
            .marshal_result(DropIndexesReply { n_indexes_was: 3 })
            .unwrap();
        assert_eq!(doc.get("nIndexesWas"), Some(&Value::Int32(3)));
    }

    #[test]
    fn test_get_last_error_arguments() {
        let arg = GetLastError
            .unmarshal_arg(
                &cmd(|b| {
                    b.append("getlasterror", 1)
                        .append("w", "majority")
                        .append("wtimeout", 500)
                        .append("j", true)
                }),
                "getlasterror",
            )
            .unwrap();
        assert_eq!(arg.w, Some(Value::from("majority")));
        assert_eq!(arg.wtimeout, 500);
        assert!(arg.j);
        assert!(!arg.fsync);
    }

    #[test]
    fn test_get_last_error_result() {
        let doc = GetLastError
            .marshal_result(GetLastErrorReply { error: None, n: 0 })
            .unwrap();
        assert_eq!(doc.get("err"), Some(&Value::Null));
        assert!(!doc.contains_key("code"));

        let doc = GetLastError
            .marshal_result(GetLastErrorReply {
                error: Some(WireError::new(ErrorCode::CommandNotSupported, "no storage")),
                n: 0,
            })
            .unwrap();
        assert_eq!(doc.get("err").and_then(|v| v.as_str()), Some("no storage"));
        assert_eq!(doc.get("code"), Some(&Value::Int32(115)));
    }
}
