//! Schema-validated structured messages.
//!
//! A structured message is one anonymous TLV structure whose members carry
//! context tags described by a [`Schema`] table. The generic machinery
//! lives in three pieces:
//!
//! - [`schema`]: static tables describing fields (tag, kind, required),
//! - [`parser`]: [`StructParser`]/[`ArrayParser`] cursors that validate a
//!   payload against its table before any field is trusted,
//! - [`builder`]: [`MessageBuilder`]/[`StructBuilder`]/[`ArrayBuilder`]
//!   that can only emit encodings the matching parser accepts.
//!
//! [`defs`] holds the concrete message catalog (write responses, status
//! reports) as plain data structs with `encode`/`decode` going through the
//! generic layer.
//!
//! # Validation contract
//!
//! Validation walks a *clone* of the caller's cursor, so a rejected
//! message costs nothing but the scan:
//!
//! - every member must carry a context tag,
//! - a tag the schema knows must match the declared kind and appear at
//!   most once,
//! - a tag the schema does not know is skipped (newer peers may extend
//!   messages),
//! - once the container ends, every `required` field must have been seen,
//!   otherwise the error names the message type.
//!
//! Root messages additionally accept a trailing revision element; see
//! [`REVISION_TAG`].

pub mod builder;
pub mod defs;
pub mod parser;
pub mod schema;

pub use builder::{ArrayBuilder, MessageBuilder, StructBuilder};
pub use parser::{ArrayParser, StructParser};
pub use schema::{Field, FieldKind, Schema, SchemaKind};

/// Context tag carrying the protocol revision on root messages.
///
/// Reserved: no schema may claim it, and duplicate-tag tracking ignores
/// it. Unknown (newer) revisions still parse; negotiating behavior from
/// the revision is the application's business.
pub const REVISION_TAG: u8 = 0xFF;

/// Revision this crate emits on every root message it builds.
pub const PROTOCOL_REVISION: u8 = 1;
