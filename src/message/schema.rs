//! Static schema tables driving the generic parser and builder.
//!
//! One `static` [`Schema`] per message or sub-structure; tables reference
//! each other for nesting. Context tags must stay below 32 so presence
//! tracking fits in a `u32` bitmask.

/// Description of one message type or sub-structure.
#[derive(Debug)]
pub struct Schema {
    /// Human-readable type name, quoted in malformed-message errors.
    pub name: &'static str,
    /// Shape of the element this schema describes.
    pub kind: SchemaKind,
}

/// Shape of a schema element.
#[derive(Debug)]
pub enum SchemaKind {
    /// Structure with tagged members.
    Structure {
        /// Member descriptions, in tag order by convention.
        fields: &'static [Field],
        /// Root messages accept a trailing revision element.
        root: bool,
    },
    /// Array of anonymous entries, each matching `entry`.
    Array {
        /// Schema every entry must satisfy.
        entry: &'static Schema,
    },
}

/// One member of a structure schema.
#[derive(Debug)]
pub struct Field {
    /// Context tag, unique within the structure and below 32.
    pub tag: u8,
    /// Wire kind the member must carry.
    pub kind: FieldKind,
    /// Required members missing at end-of-container fail validation.
    pub required: bool,
}

/// Wire kind of a structure member.
#[derive(Debug)]
pub enum FieldKind {
    /// Unsigned integer of any encoded width.
    UnsignedInt,
    /// Boolean.
    Boolean,
    /// Nested structure validated against the given schema.
    Structure(&'static Schema),
    /// Nested array validated against the given schema.
    Array(&'static Schema),
}

impl Schema {
    /// Look up the field description for a context tag.
    pub fn field(&self, tag: u8) -> Option<&'static Field> {
        match self.kind {
            SchemaKind::Structure { fields, .. } => fields.iter().find(|f| f.tag == tag),
            SchemaKind::Array { .. } => None,
        }
    }

    /// True when this schema describes a root message.
    pub fn is_root(&self) -> bool {
        matches!(self.kind, SchemaKind::Structure { root: true, .. })
    }
}
