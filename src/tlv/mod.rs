//! Tagged binary (TLV) cursor primitives.
//!
//! Self-describing tag-length-value encoding used by every structured
//! message. Elements are addressed by small context tags that are unique
//! within their enclosing container; wire order is insignificant.
//!
//! # Wire Format
//!
//! Every element starts with a control byte: the high three bits select the
//! tag form, the low five bits the element type.
//!
//! ```text
//! control = tag_control | element_type
//!
//! tag_control:  0x00 anonymous (no tag byte)
//!               0x20 context   (one tag byte follows)
//! ```
//!
//! | Element type      | Code  | Value bytes          |
//! |-------------------|-------|----------------------|
//! | Unsigned int (u8) | 0x04  | 1, little-endian     |
//! | Unsigned int (u16)| 0x05  | 2, little-endian     |
//! | Unsigned int (u32)| 0x06  | 4, little-endian     |
//! | Unsigned int (u64)| 0x07  | 8, little-endian     |
//! | Boolean false     | 0x08  | none                 |
//! | Boolean true      | 0x09  | none                 |
//! | Structure         | 0x15  | elements until 0x18  |
//! | Array             | 0x16  | elements until 0x18  |
//! | List              | 0x17  | elements until 0x18  |
//! | End of container  | 0x18  | none                 |
//!
//! Writers pick the smallest unsigned-int width that holds the value;
//! readers widen freely and reject narrowing that would lose bits.
//!
//! # Cursors
//!
//! [`TlvReader`] is a forward-only cursor over a borrowed byte slice.
//! Cloning it is cheap and is the supported way to look ahead without
//! disturbing the caller's position; schema validation and lookup-by-tag
//! both run on clones.
//!
//! [`TlvWriter`] appends to an owned buffer and carries a sticky error:
//! the first failure short-circuits all later operations and surfaces from
//! [`TlvWriter::finalize`]. Builders layered on top never need per-call
//! error checks.

mod reader;
mod writer;

pub use reader::TlvReader;
pub use writer::TlvWriter;

use crate::error::{Result, WeaveError};

/// Tag attached to a TLV element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// No tag; used for array entries and root elements.
    Anonymous,
    /// Context tag: unique within the immediately enclosing container.
    Context(u8),
}

/// Decoded type of a TLV element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// Unsigned integer of any encoded width.
    UnsignedInt,
    /// Boolean.
    Boolean,
    /// Structure container (tagged members).
    Structure,
    /// Array container (anonymous entries).
    Array,
    /// List container (mixed tagged entries).
    List,
}

impl ElementType {
    /// True for the three container types.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Structure | Self::Array | Self::List)
    }

    pub(crate) fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            elem::U8 | elem::U16 | elem::U32 | elem::U64 => Ok(Self::UnsignedInt),
            elem::BOOL_FALSE | elem::BOOL_TRUE => Ok(Self::Boolean),
            elem::STRUCTURE => Ok(Self::Structure),
            elem::ARRAY => Ok(Self::Array),
            elem::LIST => Ok(Self::List),
            _ => Err(WeaveError::WrongElementType),
        }
    }
}

/// Raw element-type codes (low five bits of the control byte).
pub(crate) mod elem {
    pub const U8: u8 = 0x04;
    pub const U16: u8 = 0x05;
    pub const U32: u8 = 0x06;
    pub const U64: u8 = 0x07;
    pub const BOOL_FALSE: u8 = 0x08;
    pub const BOOL_TRUE: u8 = 0x09;
    pub const STRUCTURE: u8 = 0x15;
    pub const ARRAY: u8 = 0x16;
    pub const LIST: u8 = 0x17;
    pub const END_OF_CONTAINER: u8 = 0x18;

    pub const TYPE_MASK: u8 = 0x1F;
}

/// Tag-control codes (high three bits of the control byte).
pub(crate) mod tagctl {
    pub const ANONYMOUS: u8 = 0x00;
    pub const CONTEXT: u8 = 0x20;

    pub const MASK: u8 = 0xE0;
}

/// Byte length of a primitive element's value, `None` for containers.
pub(crate) fn primitive_len(raw: u8) -> Option<usize> {
    match raw {
        elem::U8 => Some(1),
        elem::U16 => Some(2),
        elem::U32 => Some(4),
        elem::U64 => Some(8),
        elem::BOOL_FALSE | elem::BOOL_TRUE => Some(0),
        _ => None,
    }
}
