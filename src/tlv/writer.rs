//! Append-only TLV write cursor with sticky error state.

use super::{elem, tagctl, Tag};
use crate::error::{Result, WeaveError};

/// Append-only TLV encoder.
///
/// The writer records the first failure it sees and ignores every
/// subsequent operation; the recorded error (or an unbalanced-container
/// error) surfaces from [`finalize`]. Builders can therefore chain calls
/// without checking each one.
///
/// [`finalize`]: TlvWriter::finalize
#[derive(Debug, Default)]
pub struct TlvWriter {
    buf: Vec<u8>,
    open: usize,
    error: Option<WeaveError>,
}

impl TlvWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unsigned integer, using the smallest width that fits.
    pub fn put_uint(&mut self, tag: Tag, value: u64) {
        if self.error.is_some() {
            return;
        }
        let (raw, width) = if value <= u64::from(u8::MAX) {
            (elem::U8, 1)
        } else if value <= u64::from(u16::MAX) {
            (elem::U16, 2)
        } else if value <= u64::from(u32::MAX) {
            (elem::U32, 4)
        } else {
            (elem::U64, 8)
        };
        self.put_header(tag, raw);
        self.buf.extend_from_slice(&value.to_le_bytes()[..width]);
    }

    /// Append a boolean (the value lives in the type code).
    pub fn put_bool(&mut self, tag: Tag, value: bool) {
        if self.error.is_some() {
            return;
        }
        let raw = if value { elem::BOOL_TRUE } else { elem::BOOL_FALSE };
        self.put_header(tag, raw);
    }

    /// Open a structure container.
    pub fn start_structure(&mut self, tag: Tag) {
        self.start_container(tag, elem::STRUCTURE);
    }

    /// Open an array container.
    pub fn start_array(&mut self, tag: Tag) {
        self.start_container(tag, elem::ARRAY);
    }

    /// Open a list container.
    pub fn start_list(&mut self, tag: Tag) {
        self.start_container(tag, elem::LIST);
    }

    /// Terminate the innermost open container.
    pub fn end_container(&mut self) {
        if self.error.is_some() {
            return;
        }
        if self.open == 0 {
            self.fail(WeaveError::ContainerMismatch);
            return;
        }
        self.buf.push(elem::END_OF_CONTAINER);
        self.open -= 1;
    }

    /// Record a failure; the first one wins and all later writes no-op.
    pub fn fail(&mut self, err: WeaveError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// The recorded failure, if any.
    pub fn first_error(&self) -> Option<&WeaveError> {
        self.error.as_ref()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer, yielding the encoding or the first failure.
    pub fn finalize(self) -> Result<Vec<u8>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.open != 0 {
            return Err(WeaveError::ContainerMismatch);
        }
        Ok(self.buf)
    }

    fn start_container(&mut self, tag: Tag, raw: u8) {
        if self.error.is_some() {
            return;
        }
        self.put_header(tag, raw);
        self.open += 1;
    }

    fn put_header(&mut self, tag: Tag, raw: u8) {
        match tag {
            Tag::Anonymous => self.buf.push(tagctl::ANONYMOUS | raw),
            Tag::Context(num) => {
                self.buf.push(tagctl::CONTEXT | raw);
                self.buf.push(num);
            }
        }
    }
}
