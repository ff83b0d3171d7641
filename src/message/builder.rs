//! Generic schema-driven build cursors.
//!
//! Builders lean on the writer's sticky error: a bad tag or kind poisons
//! the writer and every later call no-ops, so call sites chain without
//! intermediate checks and collect one error at [`MessageBuilder::build`].
//! Nested containers are closure-scoped, which keeps open/close balanced
//! by construction.

use super::schema::{FieldKind, Schema, SchemaKind};
use super::{PROTOCOL_REVISION, REVISION_TAG};
use crate::error::{Result, WeaveError};
use crate::tlv::{Tag, TlvWriter};

/// Builder for one whole root message.
///
/// Owns the writer; [`build`](Self::build) appends the protocol revision,
/// closes the root structure, and yields the encoding.
#[derive(Debug)]
pub struct MessageBuilder {
    writer: TlvWriter,
    schema: &'static Schema,
}

impl MessageBuilder {
    /// Start an anonymous root structure for the given schema.
    pub fn new(schema: &'static Schema) -> Self {
        let mut writer = TlvWriter::new();
        if !schema.is_root() {
            writer.fail(WeaveError::WrongElementType);
        }
        writer.start_structure(Tag::Anonymous);
        Self { writer, schema }
    }

    /// Builder for the root structure's members.
    pub fn body(&mut self) -> StructBuilder<'_> {
        StructBuilder {
            writer: &mut self.writer,
            schema: self.schema,
        }
    }

    /// Append the revision element, close the root, return the encoding.
    pub fn build(mut self) -> Result<Vec<u8>> {
        self.writer
            .put_uint(Tag::Context(REVISION_TAG), u64::from(PROTOCOL_REVISION));
        self.writer.end_container();
        self.writer.finalize()
    }
}

/// Builder for the members of one structure.
pub struct StructBuilder<'w> {
    writer: &'w mut TlvWriter,
    schema: &'static Schema,
}

impl StructBuilder<'_> {
    /// Append an unsigned-integer member.
    pub fn put_uint(&mut self, tag: u8, value: u64) -> &mut Self {
        if self.check_kind(tag, |k| matches!(k, FieldKind::UnsignedInt)) {
            self.writer.put_uint(Tag::Context(tag), value);
        }
        self
    }

    /// Append a boolean member.
    pub fn put_bool(&mut self, tag: u8, value: bool) -> &mut Self {
        if self.check_kind(tag, |k| matches!(k, FieldKind::Boolean)) {
            self.writer.put_bool(Tag::Context(tag), value);
        }
        self
    }

    /// Append a nested structure member, built inside the closure.
    pub fn put_struct(
        &mut self,
        tag: u8,
        f: impl FnOnce(&mut StructBuilder<'_>),
    ) -> &mut Self {
        let Some(nested) = self.nested_schema(tag, false) else {
            return self;
        };
        self.writer.start_structure(Tag::Context(tag));
        f(&mut StructBuilder {
            writer: self.writer,
            schema: nested,
        });
        self.writer.end_container();
        self
    }

    /// Append a nested array member, built inside the closure.
    pub fn put_array(&mut self, tag: u8, f: impl FnOnce(&mut ArrayBuilder<'_>)) -> &mut Self {
        let Some(nested) = self.nested_schema(tag, true) else {
            return self;
        };
        self.writer.start_array(Tag::Context(tag));
        f(&mut ArrayBuilder {
            writer: self.writer,
            schema: nested,
        });
        self.writer.end_container();
        self
    }

    /// True when the tag exists with a matching kind; poisons otherwise.
    fn check_kind(&mut self, tag: u8, ok: impl Fn(&FieldKind) -> bool) -> bool {
        match self.schema.field(tag) {
            None => {
                self.writer.fail(WeaveError::InvalidTag);
                false
            }
            Some(field) if !ok(&field.kind) => {
                self.writer.fail(WeaveError::WrongElementType);
                false
            }
            Some(_) => true,
        }
    }

    fn nested_schema(&mut self, tag: u8, want_array: bool) -> Option<&'static Schema> {
        match self.schema.field(tag) {
            None => {
                self.writer.fail(WeaveError::InvalidTag);
                None
            }
            Some(field) => match (&field.kind, want_array) {
                (FieldKind::Structure(s), false) | (FieldKind::Array(s), true) => Some(s),
                _ => {
                    self.writer.fail(WeaveError::WrongElementType);
                    None
                }
            },
        }
    }
}

/// Builder for the anonymous entries of one array.
pub struct ArrayBuilder<'w> {
    writer: &'w mut TlvWriter,
    schema: &'static Schema,
}

impl ArrayBuilder<'_> {
    /// Append one entry structure, built inside the closure.
    pub fn put_entry(&mut self, f: impl FnOnce(&mut StructBuilder<'_>)) -> &mut Self {
        let SchemaKind::Array { entry } = self.schema.kind else {
            self.writer.fail(WeaveError::WrongElementType);
            return self;
        };
        self.writer.start_structure(Tag::Anonymous);
        f(&mut StructBuilder {
            writer: self.writer,
            schema: entry,
        });
        self.writer.end_container();
        self
    }
}
