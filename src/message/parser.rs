//! Generic schema-driven parse cursors.

use tracing::debug;

use super::schema::{FieldKind, Schema, SchemaKind};
use super::{PROTOCOL_REVISION, REVISION_TAG};
use crate::error::{Result, WeaveError};
use crate::tlv::{ElementType, Tag, TlvReader};

/// Read cursor bound to a structure element and its schema.
///
/// The bound cursor never moves after `init`; every accessor searches on
/// a clone, so fields can be read in any order and any number of times.
#[derive(Debug, Clone)]
pub struct StructParser<'a> {
    reader: TlvReader<'a>,
    schema: &'static Schema,
}

impl<'a> StructParser<'a> {
    /// Bind to the structure element `reader` is positioned on.
    pub fn init(reader: &TlvReader<'a>, schema: &'static Schema) -> Result<Self> {
        reader.expect_element(ElementType::Structure)?;
        let SchemaKind::Structure { .. } = schema.kind else {
            return Err(WeaveError::WrongElementType);
        };
        let mut inner = reader.clone();
        inner.enter_container()?;
        Ok(Self {
            reader: inner,
            schema,
        })
    }

    /// Bind to a whole message: one anonymous root structure in `buf`.
    pub fn root(buf: &'a [u8], schema: &'static Schema) -> Result<Self> {
        let mut reader = TlvReader::new(buf);
        reader.next()?;
        if reader.tag() != Tag::Anonymous {
            return Err(WeaveError::InvalidTag);
        }
        Self::init(&reader, schema)
    }

    /// Validate the bound payload against the schema.
    ///
    /// Walks a clone of the cursor end to end: rejects non-context and
    /// duplicate tags, type-checks and recurses into every known member,
    /// skips unknown ones, and finally verifies that all required members
    /// were present. Nothing is consumed on either outcome.
    pub fn check_schema_validity(&self) -> Result<()> {
        let SchemaKind::Structure { fields, root } = self.schema.kind else {
            return Err(WeaveError::WrongElementType);
        };
        let mut seen: u32 = 0;
        let mut cursor = self.reader.clone();
        loop {
            match cursor.next() {
                Ok(()) => {}
                Err(WeaveError::EndOfContainer) => break,
                Err(e) => return Err(e),
            }
            let Tag::Context(tag) = cursor.tag() else {
                return Err(WeaveError::InvalidTag);
            };
            if root && tag == REVISION_TAG {
                cursor.expect_element(ElementType::UnsignedInt)?;
                let revision = cursor.get_u64()?;
                if revision > u64::from(PROTOCOL_REVISION) {
                    debug!(
                        message = self.schema.name,
                        revision, "message carries a newer protocol revision"
                    );
                }
                continue;
            }
            let Some(field) = self.schema.field(tag) else {
                // Unknown tags are tolerated for forward compatibility;
                // next() already proved the element is skippable.
                continue;
            };
            // Presence tracking needs the tag to fit the u32 mask; a
            // schema declaring a tag of 32 or more is itself invalid.
            let bit = 1u32
                .checked_shl(u32::from(field.tag))
                .ok_or(WeaveError::InvalidTag)?;
            if seen & bit != 0 {
                return Err(WeaveError::InvalidTag);
            }
            seen |= bit;
            match field.kind {
                FieldKind::UnsignedInt => cursor.expect_element(ElementType::UnsignedInt)?,
                FieldKind::Boolean => cursor.expect_element(ElementType::Boolean)?,
                FieldKind::Structure(nested) => {
                    StructParser::init(&cursor, nested)?.check_schema_validity()?;
                }
                FieldKind::Array(nested) => {
                    ArrayParser::init(&cursor, nested)?.check_schema_validity()?;
                }
            }
        }
        for field in fields {
            let bit = 1u32.checked_shl(u32::from(field.tag)).unwrap_or(0);
            if field.required && seen & bit == 0 {
                return Err(WeaveError::Malformed(self.schema.name));
            }
        }
        Ok(())
    }

    /// Cursor positioned on the member with the given tag.
    pub fn get_field(&self, tag: u8) -> Result<TlvReader<'a>> {
        self.reader.find_context_tag(tag)
    }

    /// Unsigned member value, widened to `u64`.
    pub fn get_uint(&self, tag: u8) -> Result<u64> {
        self.get_field(tag)?.get_u64()
    }

    /// Unsigned member value narrowed to `u32`.
    pub fn get_u32(&self, tag: u8) -> Result<u32> {
        self.get_field(tag)?.get_u32()
    }

    /// Unsigned member value narrowed to `u16`.
    pub fn get_u16(&self, tag: u8) -> Result<u16> {
        self.get_field(tag)?.get_u16()
    }

    /// Unsigned member value narrowed to `u8`.
    pub fn get_u8(&self, tag: u8) -> Result<u8> {
        self.get_field(tag)?.get_u8()
    }

    /// Boolean member value.
    pub fn get_bool(&self, tag: u8) -> Result<bool> {
        self.get_field(tag)?.get_bool()
    }

    /// Parser bound to a nested structure member.
    pub fn get_struct(&self, tag: u8) -> Result<StructParser<'a>> {
        let Some(field) = self.schema.field(tag) else {
            return Err(WeaveError::InvalidTag);
        };
        let FieldKind::Structure(nested) = field.kind else {
            return Err(WeaveError::WrongElementType);
        };
        StructParser::init(&self.get_field(tag)?, nested)
    }

    /// Parser bound to a nested array member.
    pub fn get_array(&self, tag: u8) -> Result<ArrayParser<'a>> {
        let Some(field) = self.schema.field(tag) else {
            return Err(WeaveError::InvalidTag);
        };
        let FieldKind::Array(nested) = field.kind else {
            return Err(WeaveError::WrongElementType);
        };
        ArrayParser::init(&self.get_field(tag)?, nested)
    }

    /// Protocol revision attached to a root message.
    pub fn get_revision(&self) -> Result<u8> {
        if !self.schema.is_root() {
            return Err(WeaveError::NotFound);
        }
        self.get_field(REVISION_TAG)?.get_u8()
    }

    /// Name of the bound message type.
    pub fn type_name(&self) -> &'static str {
        self.schema.name
    }
}

/// Read cursor iterating the anonymous structure entries of an array.
#[derive(Debug, Clone)]
pub struct ArrayParser<'a> {
    reader: TlvReader<'a>,
    entry: &'static Schema,
}

impl<'a> ArrayParser<'a> {
    /// Bind to the array element `reader` is positioned on.
    pub fn init(reader: &TlvReader<'a>, schema: &'static Schema) -> Result<Self> {
        reader.expect_element(ElementType::Array)?;
        let SchemaKind::Array { entry } = schema.kind else {
            return Err(WeaveError::WrongElementType);
        };
        let mut inner = reader.clone();
        inner.enter_container()?;
        Ok(Self {
            reader: inner,
            entry,
        })
    }

    /// Advance to the next entry, or `None` at the end of the array.
    ///
    /// An empty array is valid and yields `None` immediately.
    pub fn next_entry(&mut self) -> Result<Option<StructParser<'a>>> {
        match self.reader.next() {
            Ok(()) => {}
            Err(WeaveError::EndOfContainer) => return Ok(None),
            Err(e) => return Err(e),
        }
        if self.reader.tag() != Tag::Anonymous {
            return Err(WeaveError::InvalidTag);
        }
        StructParser::init(&self.reader, self.entry).map(Some)
    }

    /// Validate every entry against the entry schema.
    pub fn check_schema_validity(&self) -> Result<()> {
        let mut cursor = self.clone();
        while let Some(entry) = cursor.next_entry()? {
            entry.check_schema_validity()?;
        }
        Ok(())
    }
}
