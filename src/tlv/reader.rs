//! Forward-only TLV read cursor.

use tracing::trace;

use super::{elem, primitive_len, tagctl, ElementType, Tag};
use crate::error::{Result, WeaveError};

/// Header of the element the cursor is positioned on.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Element {
    tag: Tag,
    raw_type: u8,
    /// Offset of the first value byte (for containers, the first member).
    value_pos: usize,
}

/// Forward-only cursor over a TLV-encoded byte slice.
///
/// A fresh reader is positioned *before* the first element; [`next`]
/// advances onto an element, after which the tag/type/value accessors
/// apply. `Clone` copies the cursor position and is the supported way to
/// look ahead without disturbing the original.
///
/// [`next`]: TlvReader::next
#[derive(Debug, Clone, PartialEq)]
pub struct TlvReader<'a> {
    buf: &'a [u8],
    pos: usize,
    current: Option<Element>,
    depth: usize,
}

impl<'a> TlvReader<'a> {
    /// Create a reader positioned before the first element of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            current: None,
            depth: 0,
        }
    }

    /// Advance to the next element at the current nesting level.
    ///
    /// Returns [`WeaveError::EndOfContainer`] when the current container
    /// (or, at depth zero, the input) has no more elements. The cursor
    /// does not move past the terminator; [`exit_container`] consumes it.
    ///
    /// [`exit_container`]: TlvReader::exit_container
    pub fn next(&mut self) -> Result<()> {
        if let Some(el) = self.current.take() {
            self.pos = self.end_of_element(el)?;
        }
        if self.pos >= self.buf.len() {
            // Truncated input if a container is still open.
            return if self.depth == 0 {
                Err(WeaveError::EndOfContainer)
            } else {
                Err(WeaveError::UnexpectedEnd)
            };
        }
        if self.buf[self.pos] == elem::END_OF_CONTAINER {
            return Err(WeaveError::EndOfContainer);
        }
        self.current = Some(parse_header(self.buf, self.pos)?);
        Ok(())
    }

    /// Tag of the current element (anonymous if not on an element).
    pub fn tag(&self) -> Tag {
        self.current.map_or(Tag::Anonymous, |el| el.tag)
    }

    /// Decoded type of the current element.
    pub fn element_type(&self) -> Result<ElementType> {
        let el = self.current.ok_or(WeaveError::WrongElementType)?;
        ElementType::from_raw(el.raw_type)
    }

    /// Error unless the current element has the given type.
    pub fn expect_element(&self, expected: ElementType) -> Result<()> {
        if self.element_type()? == expected {
            Ok(())
        } else {
            Err(WeaveError::WrongElementType)
        }
    }

    /// Descend into the container the cursor is positioned on.
    ///
    /// The cursor ends up before the container's first member.
    pub fn enter_container(&mut self) -> Result<()> {
        let el = self.current.ok_or(WeaveError::WrongElementType)?;
        if !ElementType::from_raw(el.raw_type)?.is_container() {
            return Err(WeaveError::WrongElementType);
        }
        self.pos = el.value_pos;
        self.current = None;
        self.depth += 1;
        Ok(())
    }

    /// Skip any remaining members and move past the container terminator.
    pub fn exit_container(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(WeaveError::ContainerMismatch);
        }
        loop {
            match self.next() {
                Ok(()) => {}
                Err(WeaveError::EndOfContainer) => break,
                Err(e) => return Err(e),
            }
        }
        // next() left us on the 0x18 byte.
        self.pos += 1;
        self.depth -= 1;
        self.current = None;
        Ok(())
    }

    /// Search forward for a context tag, returning a cursor positioned on
    /// the matching element. The original cursor is untouched.
    pub fn find_context_tag(&self, tag_num: u8) -> Result<TlvReader<'a>> {
        let mut cursor = self.clone();
        loop {
            match cursor.next() {
                Ok(()) => {
                    if cursor.tag() == Tag::Context(tag_num) {
                        return Ok(cursor);
                    }
                }
                Err(WeaveError::EndOfContainer) => {
                    trace!(tag = tag_num, "context tag not present");
                    return Err(WeaveError::NotFound);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Value of the current element as an unsigned integer, widened.
    pub fn get_u64(&self) -> Result<u64> {
        let el = self.current.ok_or(WeaveError::WrongElementType)?;
        let width = match el.raw_type {
            elem::U8 => 1,
            elem::U16 => 2,
            elem::U32 => 4,
            elem::U64 => 8,
            _ => return Err(WeaveError::WrongElementType),
        };
        // Value bounds were checked when the header was parsed.
        let mut value = 0u64;
        for (i, b) in self.buf[el.value_pos..el.value_pos + width]
            .iter()
            .enumerate()
        {
            value |= u64::from(*b) << (8 * i);
        }
        Ok(value)
    }

    /// Unsigned value narrowed to `u32`; errors if bits would be lost.
    pub fn get_u32(&self) -> Result<u32> {
        u32::try_from(self.get_u64()?).map_err(|_| WeaveError::WrongElementType)
    }

    /// Unsigned value narrowed to `u16`; errors if bits would be lost.
    pub fn get_u16(&self) -> Result<u16> {
        u16::try_from(self.get_u64()?).map_err(|_| WeaveError::WrongElementType)
    }

    /// Unsigned value narrowed to `u8`; errors if bits would be lost.
    pub fn get_u8(&self) -> Result<u8> {
        u8::try_from(self.get_u64()?).map_err(|_| WeaveError::WrongElementType)
    }

    /// Boolean value of the current element.
    pub fn get_bool(&self) -> Result<bool> {
        let el = self.current.ok_or(WeaveError::WrongElementType)?;
        match el.raw_type {
            elem::BOOL_FALSE => Ok(false),
            elem::BOOL_TRUE => Ok(true),
            _ => Err(WeaveError::WrongElementType),
        }
    }

    /// Offset just past the current element (subtree included).
    fn end_of_element(&self, el: Element) -> Result<usize> {
        match primitive_len(el.raw_type) {
            Some(n) => Ok(el.value_pos + n),
            None => self.skip_container_body(el.value_pos),
        }
    }

    /// Scan past a container body starting at its first member, returning
    /// the offset just past the matching terminator.
    fn skip_container_body(&self, mut pos: usize) -> Result<usize> {
        let mut open = 1usize;
        while open > 0 {
            if pos >= self.buf.len() {
                return Err(WeaveError::UnexpectedEnd);
            }
            if self.buf[pos] == elem::END_OF_CONTAINER {
                open -= 1;
                pos += 1;
                continue;
            }
            let el = parse_header(self.buf, pos)?;
            match primitive_len(el.raw_type) {
                Some(n) => pos = el.value_pos + n,
                None => {
                    open += 1;
                    pos = el.value_pos;
                }
            }
        }
        Ok(pos)
    }
}

/// Decode the element header at `pos`, bounds-checking primitive values.
fn parse_header(buf: &[u8], pos: usize) -> Result<Element> {
    let control = buf[pos];
    let raw_type = control & elem::TYPE_MASK;
    // Validates the type code up front so skipping never sees unknowns.
    ElementType::from_raw(raw_type)?;

    let mut value_pos = pos + 1;
    let tag = match control & tagctl::MASK {
        tagctl::ANONYMOUS => Tag::Anonymous,
        tagctl::CONTEXT => {
            if value_pos >= buf.len() {
                return Err(WeaveError::UnexpectedEnd);
            }
            let num = buf[value_pos];
            value_pos += 1;
            Tag::Context(num)
        }
        _ => return Err(WeaveError::InvalidTag),
    };

    if let Some(n) = primitive_len(raw_type) {
        if value_pos + n > buf.len() {
            return Err(WeaveError::UnexpectedEnd);
        }
    }
    Ok(Element {
        tag,
        raw_type,
        value_pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_read_primitives() {
        // ctx(1)=0x2A (u8), ctx(2)=0x1234 (u16), anonymous true
        let buf = hex!("24 01 2a 25 02 34 12 09");
        let mut r = TlvReader::new(&buf);

        r.next().unwrap();
        assert_eq!(r.tag(), Tag::Context(1));
        assert_eq!(r.element_type().unwrap(), ElementType::UnsignedInt);
        assert_eq!(r.get_u8().unwrap(), 0x2a);
        assert_eq!(r.get_u64().unwrap(), 0x2a);

        r.next().unwrap();
        assert_eq!(r.tag(), Tag::Context(2));
        assert_eq!(r.get_u16().unwrap(), 0x1234);

        r.next().unwrap();
        assert_eq!(r.tag(), Tag::Anonymous);
        assert!(r.get_bool().unwrap());

        assert_eq!(r.next(), Err(WeaveError::EndOfContainer));
    }

    #[test]
    fn test_widening_and_narrowing() {
        // ctx(0) = 0x0100 as u16
        let buf = hex!("25 00 00 01");
        let mut r = TlvReader::new(&buf);
        r.next().unwrap();
        assert_eq!(r.get_u32().unwrap(), 0x100);
        assert_eq!(r.get_u64().unwrap(), 0x100);
        assert_eq!(r.get_u8(), Err(WeaveError::WrongElementType));
    }

    #[test]
    fn test_enter_exit_container() {
        // struct { ctx(0)=1, ctx(1)=2 }, then ctx(5)=9 after it
        let buf = hex!("15 24 00 01 24 01 02 18 24 05 09");
        let mut r = TlvReader::new(&buf);
        r.next().unwrap();
        assert_eq!(r.element_type().unwrap(), ElementType::Structure);
        r.enter_container().unwrap();

        r.next().unwrap();
        assert_eq!(r.tag(), Tag::Context(0));
        // Exit without reading the second member.
        r.exit_container().unwrap();

        r.next().unwrap();
        assert_eq!(r.tag(), Tag::Context(5));
        assert_eq!(r.get_u8().unwrap(), 9);
    }

    #[test]
    fn test_skip_nested_container() {
        // ctx(0) = struct { ctx(0) = array { 1, 2 } }, then ctx(7)=3
        let buf = hex!("35 00 36 00 04 01 04 02 18 18 24 07 03");
        let mut r = TlvReader::new(&buf);
        r.next().unwrap();
        assert_eq!(r.element_type().unwrap(), ElementType::Structure);
        // next() must skip the whole subtree.
        r.next().unwrap();
        assert_eq!(r.tag(), Tag::Context(7));
        assert_eq!(r.get_u8().unwrap(), 3);
    }

    #[test]
    fn test_find_context_tag() {
        let buf = hex!("24 00 01 24 02 05 24 01 03");
        let r = TlvReader::new(&buf);

        let hit = r.find_context_tag(2).unwrap();
        assert_eq!(hit.get_u8().unwrap(), 5);
        assert_eq!(r.find_context_tag(9), Err(WeaveError::NotFound));

        // Original cursor untouched.
        let mut r = r;
        r.next().unwrap();
        assert_eq!(r.tag(), Tag::Context(0));
    }

    #[test]
    fn test_truncated_value() {
        // u32 header claims 4 value bytes, only 2 present
        let buf = hex!("26 00 aa bb");
        let mut r = TlvReader::new(&buf);
        assert_eq!(r.next(), Err(WeaveError::UnexpectedEnd));
    }

    #[test]
    fn test_unterminated_container() {
        let buf = hex!("15 24 00 01");
        let mut r = TlvReader::new(&buf);
        r.next().unwrap();
        r.enter_container().unwrap();
        r.next().unwrap();
        assert_eq!(r.next(), Err(WeaveError::UnexpectedEnd));
    }

    #[test]
    fn test_unknown_tag_control_rejected() {
        // tag control 0x40 is not a form this codec accepts
        let buf = hex!("44 00 01");
        let mut r = TlvReader::new(&buf);
        assert_eq!(r.next(), Err(WeaveError::InvalidTag));
    }

    #[test]
    fn test_exit_at_top_level_is_mismatch() {
        let buf = hex!("04 01");
        let mut r = TlvReader::new(&buf);
        r.next().unwrap();
        assert_eq!(r.exit_container(), Err(WeaveError::ContainerMismatch));
    }
}
