use std::fmt::{self, Write as _};

use crate::error::{Result, XmlError};
use crate::xml::Rendered;

/// Capacity-bounded fragment writer.
///
/// Each fragment is formatted into a scratch string and copied into the
/// output buffer only if it fits whole. Once a fragment has been dropped
/// nothing more is copied, so the written bytes are always a prefix of the
/// unbounded output made of complete fragments. The logical length keeps
/// growing regardless.
#[derive(Debug)]
pub struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
    len: usize,
    truncated: bool,
    scratch: String,
}

impl<'a> BoundedWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            written: 0,
            len: 0,
            truncated: false,
            scratch: String::new(),
        }
    }

    /// Format and append one fragment.
    pub fn emit(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let formatted = scratch.write_fmt(args);
        if formatted.is_ok() {
            self.push(&scratch);
        }
        self.scratch = scratch;
        formatted.map_err(|_| XmlError::Format)
    }

    /// Append a literal fragment.
    pub fn push(&mut self, fragment: &str) {
        let bytes = fragment.as_bytes();
        self.len += bytes.len();
        if self.truncated {
            return;
        }

        let room = self.buf.len() - self.written;
        if bytes.len() <= room {
            self.buf[self.written..self.written + bytes.len()].copy_from_slice(bytes);
            self.written += bytes.len();
        } else {
            self.truncated = true;
        }
    }

    /// Total length of everything emitted so far, written or not.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes actually copied into the buffer.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn finish(self) -> Rendered {
        Rendered {
            len: self.len,
            written: self.written,
        }
    }
}
