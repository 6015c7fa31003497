//! Request dispatch.
//!
//! [`Dispatcher::dispatch`] takes one frame and returns the encoded reply, if
//! the opcode gets one. Queries against `<db>.$cmd` are commands; they are
//! resolved through the [`CommandRegistry`], checked for admin-only access,
//! unmarshalled, executed by the [`RequestProcessor`] and marshalled back.
//! Any step may fail, and the failure becomes the reply document instead.
//!
//! Only fatal framing errors escape as `Err`; the caller must close the
//! connection when it sees one.

use crate::connection::Connection;
use crate::metrics::Metrics;
use crate::processor::{Request, RequestProcessor};
use crate::registry::CommandRegistry;
use crate::reply::{translate_error, with_ok};
use bytes::BytesMut;
use docwire_bson::{AllocationStrategy, Document, DocumentDecoder};
use docwire_protocol::{
    Frame, OpCode, ProtocolError, QueryMessage, ReplyMessage, RequestMessage, WireError,
};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Routes frames to commands and processor operations.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    processor: Arc<dyn RequestProcessor>,
    decoder: DocumentDecoder,
    strategy: AllocationStrategy,
    metrics: Option<Arc<Metrics>>,
    next_request_id: AtomicI32,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, processor: Arc<dyn RequestProcessor>) -> Self {
        Self {
            registry,
            processor,
            decoder: DocumentDecoder::default(),
            strategy: AllocationStrategy::default(),
            metrics: None,
            next_request_id: AtomicI32::new(1),
        }
    }

    /// Sets the decoder, and with it the string pool.
    pub fn with_decoder(mut self, decoder: DocumentDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn processor(&self) -> &Arc<dyn RequestProcessor> {
        &self.processor
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn decoder(&self) -> &DocumentDecoder {
        &self.decoder
    }

    /// Updates gauges that are sampled rather than counted.
    pub fn update_gauge_metrics(&self) {
        if let Some(ref metrics) = self.metrics {
            metrics
                .interned_strings
                .set(self.decoder.pool().len() as f64);
        }
    }

    /// Handles one frame and returns the encoded reply, if any.
    pub fn dispatch(
        &self,
        connection: &Connection,
        frame: Frame,
    ) -> Result<Option<BytesMut>, ProtocolError> {
        connection.record_request();
        let op = frame.op_code();
        let request_id = frame.request_id();

        let timer = self.metrics.as_ref().map(|m| {
            m.requests_total.with_label_values(&[op.name()]).inc();
            m.request_duration
                .with_label_values(&[op.name()])
                .start_timer()
        });

        let reply = match RequestMessage::parse(&frame, &self.decoder, self.strategy) {
            Ok(message) => self.handle(connection, message),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "[{}] Failed to parse {} frame (id={}): {}",
                    connection.remote_addr(),
                    op,
                    request_id,
                    e
                );
                if let Some(ref metrics) = self.metrics {
                    metrics.decode_failures_total.inc();
                }
                self.fail(connection, op, e.to_wire_error())
            }
        };
        drop(timer);

        match reply {
            Some(reply) => self.encode_reply(&reply, request_id).map(Some),
            None => Ok(None),
        }
    }

    fn handle(&self, connection: &Connection, message: RequestMessage) -> Option<ReplyMessage> {
        let op = message.op_code();
        let client = connection.remote_addr();
        let request = |database: &str| Request::new(database, client);

        let result = match message {
            RequestMessage::Query(query) if query.is_command() => {
                return Some(self.handle_command(connection, &query));
            }
            RequestMessage::Query(query) => {
                let request =
                    request(&query.namespace.database).with_slave_ok(query.options.is_slave_ok());
                self.processor
                    .query(connection, &request, &query)
                    .map(Some)
            }
            RequestMessage::GetMore(get_more) => {
                // A cursor may be drained from any member it was opened on.
                let request = request(&get_more.namespace.database).with_slave_ok(true);
                self.processor
                    .get_more(connection, &request, &get_more)
                    .map(Some)
            }
            RequestMessage::Insert(insert) => {
                let request = request(&insert.namespace.database);
                self.processor
                    .insert(connection, &request, &insert)
                    .map(|_| None)
            }
            RequestMessage::Update(update) => {
                let request = request(&update.namespace.database);
                self.processor
                    .update(connection, &request, &update)
                    .map(|_| None)
            }
            RequestMessage::Delete(delete) => {
                let request = request(&delete.namespace.database);
                self.processor
                    .delete(connection, &request, &delete)
                    .map(|_| None)
            }
            RequestMessage::KillCursors(kill) => {
                self.processor.kill_cursors(connection, &kill).map(|_| None)
            }
        };

        match result {
            Ok(reply) => {
                if !op.can_reply() {
                    connection.clear_last_error();
                }
                reply
            }
            Err(e) => self.fail(connection, op, e),
        }
    }

    /// Turns a failed request into a query-failure reply, or hands it to the
    /// processor when the opcode gets no reply.
    fn fail(&self, connection: &Connection, op: OpCode, error: WireError) -> Option<ReplyMessage> {
        self.count_error(&error);
        if op.can_reply() {
            Some(ReplyMessage::failure(translate_error(&error)))
        } else {
            tracing::warn!(
                "[{}] {} failed: {}",
                connection.remote_addr(),
                op,
                error
            );
            self.processor.record_error(connection, &error);
            None
        }
    }

    fn handle_command(&self, connection: &Connection, query: &QueryMessage) -> ReplyMessage {
        let request = Request::new(query.namespace.database.as_str(), connection.remote_addr())
            .with_slave_ok(query.options.is_slave_ok());
        ReplyMessage::single(self.execute_command(connection, &request, &query.query))
    }

    /// Runs a command document and returns the reply document.
    pub fn execute_command(
        &self,
        connection: &Connection,
        request: &Request,
        command: &Document,
    ) -> Document {
        match self.run_command(connection, request, command) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(
                    "[{}] Command on {} failed: {}",
                    connection.remote_addr(),
                    request.database,
                    e
                );
                self.count_error(&e);
                translate_error(&e)
            }
        }
    }

    fn run_command(
        &self,
        connection: &Connection,
        request: &Request,
        command: &Document,
    ) -> Result<Document, WireError> {
        let (descriptor, alias) = self.registry.resolve(command)?;
        if let Some(ref metrics) = self.metrics {
            metrics
                .commands_total
                .with_label_values(&[descriptor.name()])
                .inc();
        }

        if descriptor.is_admin_only() && !request.is_admin() {
            return Err(WireError::unauthorized(format!(
                "{} may only be run against the admin database.",
                descriptor.name()
            )));
        }

        let argument = descriptor.unmarshal_arg(command, alias)?;
        tracing::debug!(
            "[{}] Executing {} on {}",
            connection.remote_addr(),
            descriptor.name(),
            request.database
        );
        let result = self
            .processor
            .execute(connection, request, descriptor, argument)?;
        let reply = descriptor.marshal_result(result)?;
        Ok(with_ok(reply))
    }

    fn count_error(&self, error: &WireError) {
        if let Some(ref metrics) = self.metrics {
            metrics
                .errors_total
                .with_label_values(&[error.code.name()])
                .inc();
        }
    }

    /// Encodes a reply. If the reply itself cannot be encoded, the client
    /// gets an error reply describing why.
    fn encode_reply(
        &self,
        reply: &ReplyMessage,
        response_to: i32,
    ) -> Result<BytesMut, ProtocolError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        match reply.encode(request_id, response_to) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!("Failed to encode reply to {}: {}", response_to, e);
                let error = WireError::internal(format!("failed to encode reply: {}", e));
                self.count_error(&error);
                ReplyMessage::failure(translate_error(&error)).encode(request_id, response_to)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::CommandExecutors;
    use crate::registry::{Command, CommandArgument, CommandDescriptor, CommandResult};
    use bytes::Bytes;
    use docwire_bson::{reader, Value};
    use docwire_protocol::{
        DeleteMessage, ErrorCode, GetMoreMessage, InsertMessage, KillCursorsMessage, Namespace,
        ReplyFlags, UpdateMessage,
    };
    use std::net::SocketAddr;

    struct Hello;

    impl Command for Hello {
        type Arg = String;
        type Result = String;

        fn name(&self) -> &'static str {
            "hello"
        }

        fn unmarshal_arg(&self, command: &Document, _: &str) -> Result<String, WireError> {
            Ok(reader::get_str(command, "who")?.to_string())
        }

        fn marshal_result(&self, greeting: String) -> Result<Document, WireError> {
            Ok(Document::builder().append("greeting", greeting).build())
        }
    }

    struct Reset;

    impl Command for Reset {
        type Arg = ();
        type Result = ();

        fn name(&self) -> &'static str {
            "reset"
        }

        fn admin_only(&self) -> bool {
            true
        }

        fn unmarshal_arg(&self, command: &Document, _: &str) -> Result<(), WireError> {
            reader::check_only_has_fields("reset", command, &["reset"])?;
            Ok(())
        }

        fn marshal_result(&self, _: ()) -> Result<Document, WireError> {
            Ok(Document::new())
        }
    }

    struct BadMarshal;

    impl Command for BadMarshal {
        type Arg = ();
        type Result = ();

        fn name(&self) -> &'static str {
            "badMarshal"
        }

        fn unmarshal_arg(&self, _: &Document, _: &str) -> Result<(), WireError> {
            Ok(())
        }

        fn marshal_result(&self, _: ()) -> Result<Document, WireError> {
            Err(WireError::internal("cannot marshal"))
        }
    }

    struct WrongResult;

    impl Command for WrongResult {
        type Arg = ();
        type Result = ();

        fn name(&self) -> &'static str {
            "wrongResult"
        }

        fn unmarshal_arg(&self, _: &Document, _: &str) -> Result<(), WireError> {
            Ok(())
        }

        fn marshal_result(&self, _: ()) -> Result<Document, WireError> {
            Ok(Document::new())
        }
    }

    struct TestProcessor {
        executors: CommandExecutors,
    }

    impl TestProcessor {
        fn new() -> Self {
            let executors = CommandExecutors::new()
                .with(&Hello, |_, request, who| {
                    if who.is_empty() {
                        return Err(WireError::bad_value("who must not be empty"));
                    }
                    Ok(format!("hello {} from {}", who, request.database))
                })
                .with(&Reset, |_, _, _| Ok(()))
                .with(&BadMarshal, |_, _, _| Ok(()));
            Self { executors }
        }
    }

    impl RequestProcessor for TestProcessor {
        fn execute(
            &self,
            connection: &Connection,
            request: &Request,
            command: &CommandDescriptor,
            argument: CommandArgument,
        ) -> Result<CommandResult, WireError> {
            if command.name() == "wrongResult" {
                return Ok(Box::new(0u8));
            }
            self.executors.execute(connection, request, command, argument)
        }

        fn query(
            &self,
            _: &Connection,
            _: &Request,
            message: &QueryMessage,
        ) -> Result<ReplyMessage, WireError> {
            if message.namespace.collection == "missing" {
                return Err(WireError::namespace_not_found("ns not found"));
            }
            Ok(ReplyMessage::single(message.query.clone()).with_cursor(0, 0))
        }

        fn get_more(
            &self,
            _: &Connection,
            request: &Request,
            message: &GetMoreMessage,
        ) -> Result<ReplyMessage, WireError> {
            if message.cursor_id != 1 {
                return Err(WireError::command_not_supported("getMore is not supported"));
            }
            Ok(ReplyMessage::single(
                Document::builder()
                    .append("slaveOk", request.slave_ok)
                    .build(),
            ))
        }

        fn insert(
            &self,
            _: &Connection,
            _: &Request,
            message: &InsertMessage,
        ) -> Result<(), WireError> {
            if message.namespace.collection == "readonly" {
                return Err(WireError::new(ErrorCode::IllegalOperation, "read only"));
            }
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = CommandRegistry::new()
            .with(Hello)
            .unwrap()
            .with(Reset)
            .unwrap()
            .with(BadMarshal)
            .unwrap()
            .with(WrongResult)
            .unwrap();
        Dispatcher::new(Arc::new(registry), Arc::new(TestProcessor::new()))
            .with_metrics(Arc::new(Metrics::new().unwrap()))
    }

    fn connection() -> Connection {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        Connection::new(addr)
    }

    fn frame_of(message: &RequestMessage, request_id: i32) -> Frame {
        let mut bytes = message.encode(request_id).unwrap();
        Frame::decode(&mut bytes).unwrap().unwrap()
    }

    fn reply_of(bytes: BytesMut) -> (Frame, ReplyMessage) {
        let mut bytes = bytes;
        let frame = Frame::decode(&mut bytes).unwrap().unwrap();
        let reply =
            ReplyMessage::parse(&frame, &DocumentDecoder::default(), AllocationStrategy::Copy)
                .unwrap();
        (frame, reply)
    }

    fn run_command(db: &str, command: Document) -> ReplyMessage {
        let message = RequestMessage::Query(QueryMessage::command(db, command));
        let bytes = dispatcher()
            .dispatch(&connection(), frame_of(&message, 11))
            .unwrap()
            .unwrap();
        let (frame, reply) = reply_of(bytes);
        assert_eq!(frame.header.response_to, 11);
        assert_eq!(frame.op_code(), OpCode::Reply);
        reply
    }

    fn code_of(doc: &Document) -> Option<i32> {
        reader::get_i32(doc, "code").ok()
    }

    #[test]
    fn test_command_success_appends_ok() {
        let reply = run_command(
            "test",
            Document::builder()
                .append("hello", 1)
                .append("who", "world")
                .build(),
        );
        assert_eq!(reply.documents.len(), 1);
        assert_eq!(reply.cursor_id, 0);
        assert!(!reply.flags.is_query_failure());

        let doc = &reply.documents[0];
        let keys: Vec<&str> = doc.keys().collect();
        assert_eq!(keys, vec!["greeting", "ok"]);
        assert_eq!(
            doc.get("greeting").and_then(|v| v.as_str()),
            Some("hello world from test")
        );
        assert_eq!(doc.get("ok"), Some(&Value::Double(1.0)));
    }

    #[test]
    fn test_empty_command_document() {
        let reply = run_command("test", Document::new());
        let doc = &reply.documents[0];
        assert_eq!(code_of(doc), Some(59));
        assert_eq!(
            doc.get("errmsg").and_then(|v| v.as_str()),
            Some("no such command: empty document query")
        );
        assert_eq!(doc.get("ok"), Some(&Value::Double(0.0)));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_unknown_command_names_key() {
        let reply = run_command("test", Document::builder().append("bogus", 1).build());
        let doc = &reply.documents[0];
        assert_eq!(code_of(doc), Some(59));
        assert!(doc
            .get("errmsg")
            .and_then(|v| v.as_str())
            .unwrap()
            .contains("bogus"));
    }

    #[test]
    fn test_admin_only_rejected_outside_admin() {
        let reply = run_command("test", Document::builder().append("reset", 1).build());
        let doc = &reply.documents[0];
        assert_eq!(code_of(doc), Some(13));
        assert_eq!(
            doc.get("errmsg").and_then(|v| v.as_str()),
            Some("reset may only be run against the admin database.")
        );
    }

    #[test]
    fn test_admin_only_reaches_unmarshalling_on_admin() {
        // The extra field fails unmarshalling, which proves authorization passed.
        let reply = run_command(
            "admin",
            Document::builder()
                .append("reset", 1)
                .append("extra", true)
                .build(),
        );
        let doc = &reply.documents[0];
        assert_eq!(code_of(doc), Some(ErrorCode::BadValue.code()));

        let reply = run_command("admin", Document::builder().append("reset", 1).build());
        assert_eq!(reply.documents[0].get("ok"), Some(&Value::Double(1.0)));
    }

    #[test]
    fn test_unmarshal_failure() {
        let reply = run_command("test", Document::builder().append("hello", 1).build());
        let doc = &reply.documents[0];
        assert_eq!(code_of(doc), Some(ErrorCode::NoSuchKey.code()));
    }

    #[test]
    fn test_execution_failure_passes_through() {
        let reply = run_command(
            "test",
            Document::builder()
                .append("hello", 1)
                .append("who", "")
                .build(),
        );
        let doc = &reply.documents[0];
        assert_eq!(code_of(doc), Some(ErrorCode::BadValue.code()));
        assert_eq!(
            doc.get("errmsg").and_then(|v| v.as_str()),
            Some("who must not be empty")
        );
        // Command failures are ordinary replies, not query failures.
        assert!(!reply.flags.is_query_failure());
    }

    #[test]
    fn test_marshal_failure_is_failed_to_parse() {
        let reply = run_command("test", Document::builder().append("badMarshal", 1).build());
        assert_eq!(
            code_of(&reply.documents[0]),
            Some(ErrorCode::FailedToParse.code())
        );
    }

    #[test]
    fn test_result_of_wrong_type_is_internal_error() {
        let reply = run_command("test", Document::builder().append("wrongResult", 1).build());
        let doc = &reply.documents[0];
        assert_eq!(code_of(doc), Some(ErrorCode::InternalError.code()));
        assert_eq!(
            doc.get("errmsg").and_then(|v| v.as_str()),
            Some("wrongResult was executed with a result of the wrong type")
        );
    }

    #[test]
    fn test_generic_query_and_failure() {
        let dispatcher = dispatcher();
        let conn = connection();
        let query = |coll: &str| {
            RequestMessage::Query(QueryMessage {
                namespace: Namespace::new("db", coll),
                options: Default::default(),
                number_to_skip: 0,
                number_to_return: 0,
                query: Document::builder().append("x", 1).build(),
                projection: None,
            })
        };

        let bytes = dispatcher
            .dispatch(&conn, frame_of(&query("items"), 1))
            .unwrap()
            .unwrap();
        let (_, reply) = reply_of(bytes);
        assert!(!reply.flags.is_query_failure());
        assert_eq!(reply.documents[0].get("x"), Some(&Value::Int32(1)));

        let bytes = dispatcher
            .dispatch(&conn, frame_of(&query("missing"), 2))
            .unwrap()
            .unwrap();
        let (_, reply) = reply_of(bytes);
        assert_eq!(reply.flags, ReplyFlags::new().with_query_failure());
        assert_eq!(
            code_of(&reply.documents[0]),
            Some(ErrorCode::NamespaceNotFound.code())
        );
        assert_eq!(conn.request_count(), 2);
    }

    #[test]
    fn test_get_more_unsupported_gets_failure_reply() {
        let message = RequestMessage::GetMore(GetMoreMessage {
            namespace: Namespace::new("db", "items"),
            number_to_return: 10,
            cursor_id: 77,
        });
        let bytes = dispatcher()
            .dispatch(&connection(), frame_of(&message, 3))
            .unwrap()
            .unwrap();
        let (_, reply) = reply_of(bytes);
        assert!(reply.flags.is_query_failure());
        assert_eq!(
            code_of(&reply.documents[0]),
            Some(ErrorCode::CommandNotSupported.code())
        );
    }

    #[test]
    fn test_get_more_is_slave_ok() {
        let message = RequestMessage::GetMore(GetMoreMessage {
            namespace: Namespace::new("db", "items"),
            number_to_return: 10,
            cursor_id: 1,
        });
        let bytes = dispatcher()
            .dispatch(&connection(), frame_of(&message, 4))
            .unwrap()
            .unwrap();
        let (_, reply) = reply_of(bytes);
        assert!(!reply.flags.is_query_failure());
        assert_eq!(reply.documents[0].get("slaveOk"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_fire_and_forget_never_replies() {
        let dispatcher = dispatcher();
        let conn = connection();

        let insert = |coll: &str| {
            RequestMessage::Insert(InsertMessage {
                namespace: Namespace::new("db", coll),
                continue_on_error: false,
                documents: vec![Document::builder().append("a", 1).build()],
            })
        };
        let update = RequestMessage::Update(UpdateMessage {
            namespace: Namespace::new("db", "items"),
            upsert: false,
            multi_update: false,
            selector: Document::new(),
            update: Document::new(),
        });
        let delete = RequestMessage::Delete(DeleteMessage {
            namespace: Namespace::new("db", "items"),
            single_remove: true,
            selector: Document::new(),
        });
        let kill = RequestMessage::KillCursors(KillCursorsMessage {
            cursor_ids: vec![1],
        });

        assert!(dispatcher
            .dispatch(&conn, frame_of(&insert("items"), 1))
            .unwrap()
            .is_none());
        assert!(conn.last_error().is_none());

        assert!(dispatcher
            .dispatch(&conn, frame_of(&insert("readonly"), 2))
            .unwrap()
            .is_none());
        assert_eq!(
            conn.last_error().map(|e| e.code),
            Some(ErrorCode::IllegalOperation)
        );

        // Unsupported by the processor: still silent, still recorded.
        for message in [&update, &delete, &kill] {
            assert!(dispatcher
                .dispatch(&conn, frame_of(message, 3))
                .unwrap()
                .is_none());
            assert_eq!(
                conn.last_error().map(|e| e.code),
                Some(ErrorCode::CommandNotSupported)
            );
        }

        // A later successful write clears the recorded error.
        dispatcher
            .dispatch(&conn, frame_of(&insert("items"), 4))
            .unwrap();
        assert!(conn.last_error().is_none());
    }

    #[test]
    fn test_malformed_query_body_gets_failure_reply() {
        // Namespace without a dot.
        let mut body = BytesMut::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(b"nodot\0");
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&1i32.to_le_bytes());
        let frame = Frame::new(8, 0, OpCode::Query, body.freeze());

        let dispatcher = dispatcher();
        let bytes = dispatcher.dispatch(&connection(), frame).unwrap().unwrap();
        let (frame, reply) = reply_of(bytes);
        assert_eq!(frame.header.response_to, 8);
        assert!(reply.flags.is_query_failure());
        assert_eq!(
            code_of(&reply.documents[0]),
            Some(ErrorCode::InvalidNamespace.code())
        );
    }

    #[test]
    fn test_malformed_insert_body_is_recorded() {
        let frame = Frame::new(9, 0, OpCode::Insert, Bytes::from_static(b"\0\0"));
        let conn = connection();
        assert!(dispatcher().dispatch(&conn, frame).unwrap().is_none());
        assert_eq!(
            conn.last_error().map(|e| e.code),
            Some(ErrorCode::FailedToParse)
        );
    }

    #[test]
    fn test_command_metrics() {
        let dispatcher = dispatcher();
        let conn = connection();
        let message = RequestMessage::Query(QueryMessage::command(
            "test",
            Document::builder().append("bogus", 1).build(),
        ));
        dispatcher.dispatch(&conn, frame_of(&message, 1)).unwrap();
        let message = RequestMessage::Query(QueryMessage::command(
            "test",
            Document::builder()
                .append("hello", 1)
                .append("who", "me")
                .build(),
        ));
        dispatcher.dispatch(&conn, frame_of(&message, 2)).unwrap();
        dispatcher.update_gauge_metrics();

        let metrics = dispatcher.metrics.as_ref().unwrap();
        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("docwire_requests_total{opcode=\"query\"} 2"));
        assert!(text.contains("docwire_commands_total{command=\"hello\"} 1"));
        assert!(text.contains("docwire_errors_total{code=\"CommandNotFound\"} 1"));
    }

    #[test]
    fn test_execute_command_directly() {
        let dispatcher = dispatcher();
        let conn = connection();
        let request = Request::new("admin", conn.remote_addr());
        let doc = dispatcher.execute_command(
            &conn,
            &request,
            &Document::builder().append("reset", 1).build(),
        );
        assert_eq!(doc.get("ok"), Some(&Value::Double(1.0)));
    }
}
