//! Reply documents.
//!
//! Every command reply carries a numeric `ok` field. Failures add `code` and
//! `errmsg` and nothing else.

use docwire_bson::{Document, DocumentBuilder};
use docwire_protocol::WireError;

pub const OK_FIELD: &str = "ok";
pub const CODE_FIELD: &str = "code";
pub const ERRMSG_FIELD: &str = "errmsg";

/// Value of `ok` in a successful reply.
pub const OK: f64 = 1.0;
/// Value of `ok` in a failed reply.
pub const KO: f64 = 0.0;

/// Builds the reply document for a failure.
pub fn translate_error(error: &WireError) -> Document {
    Document::builder()
        .append(CODE_FIELD, error.code.code())
        .append(ERRMSG_FIELD, error.message.as_str())
        .append(OK_FIELD, KO)
        .build()
}

/// Appends `ok: 1.0` unless the result already declares an `ok` field.
pub fn with_ok(result: Document) -> Document {
    if result.contains_key(OK_FIELD) {
        return result;
    }
    let mut builder = DocumentBuilder::from_document(&result);
    builder.insert(OK_FIELD, OK);
    builder.build()
}

/// Returns whether a reply document reports success.
pub fn is_ok(reply: &Document) -> bool {
    reply
        .get(OK_FIELD)
        .and_then(|v| v.to_f64().ok())
        .map_or(false, |ok| ok == OK)
}
