use bytes::{BufMut, BytesMut};

use crate::error::{AttrError, Result};
use crate::header::{align, NfGenHeader, NlMsgHeader, NLMSG_HDRLEN};
use crate::table::{ATTR_HDRLEN, NLA_F_NESTED};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Marks an open nested attribute; pass it back to [`AttrWriter::end_nested`].
#[derive(Debug)]
#[must_use = "a nested attribute must be closed with end_nested"]
pub struct NestToken(usize);

/// Appends 4-byte aligned attributes to a buffer.
///
/// Integer helpers write big-endian payloads, which is what every NFLOG
/// attribute uses.
#[derive(Debug, Default)]
pub struct AttrWriter {
    buf: BytesMut,
}

impl AttrWriter {
    pub fn new() -> Self {
        Self::with_buffer(BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY))
    }

    /// Continue writing at the end of an existing buffer.
    pub fn with_buffer(buf: BytesMut) -> Self {
        Self { buf }
    }

    /// Append one attribute with a raw payload.
    pub fn put_attr(&mut self, kind: u16, payload: &[u8]) -> Result<&mut Self> {
        let len = ATTR_HDRLEN + payload.len();
        let wire_len = u16::try_from(len).map_err(|_| AttrError::TooLarge {
            len,
            max: u16::MAX as usize,
        })?;

        self.buf.reserve(align(len));
        self.buf.put_u16_ne(wire_len);
        self.buf.put_u16_ne(kind);
        self.buf.put_slice(payload);
        self.pad();
        Ok(self)
    }

    pub fn put_u8(&mut self, kind: u16, value: u8) -> Result<&mut Self> {
        self.put_attr(kind, &[value])
    }

    pub fn put_u16(&mut self, kind: u16, value: u16) -> Result<&mut Self> {
        self.put_attr(kind, &value.to_be_bytes())
    }

    pub fn put_u32(&mut self, kind: u16, value: u32) -> Result<&mut Self> {
        self.put_attr(kind, &value.to_be_bytes())
    }

    pub fn put_u64(&mut self, kind: u16, value: u64) -> Result<&mut Self> {
        self.put_attr(kind, &value.to_be_bytes())
    }

    /// Append a NUL-terminated string attribute.
    pub fn put_str(&mut self, kind: u16, value: &str) -> Result<&mut Self> {
        let mut payload = Vec::with_capacity(value.len() + 1);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        self.put_attr(kind, &payload)
    }

    /// Open a nested attribute; everything written until the matching
    /// [`end_nested`](Self::end_nested) becomes its payload.
    pub fn begin_nested(&mut self, kind: u16) -> NestToken {
        let start = self.buf.len();
        self.buf.put_u16_ne(0);
        self.buf.put_u16_ne(kind | NLA_F_NESTED);
        NestToken(start)
    }

    /// Close a nested attribute and patch its length.
    pub fn end_nested(&mut self, token: NestToken) -> Result<&mut Self> {
        let start = token.0;
        let len = self.buf.len() - start;
        let wire_len = u16::try_from(len).map_err(|_| AttrError::TooLarge {
            len,
            max: u16::MAX as usize,
        })?;
        self.buf[start..start + 2].copy_from_slice(&wire_len.to_ne_bytes());
        Ok(self)
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }

    fn pad(&mut self) {
        let padded = align(self.buf.len());
        self.buf.resize(padded, 0);
    }
}

/// Builds one complete netlink message: header, nfnetlink header, attributes.
///
/// The sequence number is left at zero; the transport stamps it on send.
#[derive(Debug)]
pub struct MessageBuilder {
    writer: AttrWriter,
}

impl MessageBuilder {
    /// Start a message of netlink type `kind` carrying `nfgen`.
    pub fn new(kind: u16, flags: u16, nfgen: NfGenHeader) -> Self {
        let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
        NlMsgHeader {
            len: 0,
            kind,
            flags,
            seq: 0,
            pid: 0,
        }
        .encode(&mut buf);
        nfgen.encode(&mut buf);
        Self {
            writer: AttrWriter::with_buffer(buf),
        }
    }

    /// Attribute section of the message.
    pub fn attrs(&mut self) -> &mut AttrWriter {
        &mut self.writer
    }

    /// Patch the total length and return the encoded message.
    pub fn finish(self) -> Result<BytesMut> {
        let mut buf = self.writer.into_inner();
        let len = buf.len();
        let wire_len = u32::try_from(len).map_err(|_| AttrError::TooLarge {
            len,
            max: u32::MAX as usize,
        })?;
        buf[..4].copy_from_slice(&wire_len.to_ne_bytes());
        debug_assert!(len >= NLMSG_HDRLEN);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{NFGEN_HDRLEN, NLM_F_ACK, NLM_F_REQUEST};
    use crate::table::AttrTable;

    #[test]
    fn attributes_are_padded_to_four_bytes() {
        let mut writer = AttrWriter::new();
        writer.put_u8(1, 0xff).unwrap();
        assert_eq!(writer.as_bytes().len(), 8);
        assert_eq!(&writer.as_bytes()[4..], &[0xff, 0, 0, 0]);

        writer.put_u16(2, 0x0800).unwrap();
        assert_eq!(writer.as_bytes().len(), 16);
        assert_eq!(&writer.as_bytes()[12..14], &[0x08, 0x00]);
    }

    #[test]
    fn oversized_attribute_is_rejected() {
        let mut writer = AttrWriter::new();
        let payload = vec![0u8; u16::MAX as usize];
        assert!(matches!(
            writer.put_attr(1, &payload),
            Err(AttrError::TooLarge { .. })
        ));
    }

    #[test]
    fn nested_length_covers_children() {
        let mut writer = AttrWriter::new();
        let nest = writer.begin_nested(18);
        writer.put_u32(12, 5).unwrap();
        writer.end_nested(nest).unwrap();

        let bytes = writer.as_bytes();
        assert_eq!(u16::from_ne_bytes([bytes[0], bytes[1]]), 12);
        assert_eq!(
            u16::from_ne_bytes([bytes[2], bytes[3]]),
            18 | NLA_F_NESTED
        );
    }

    #[test]
    fn message_builder_sets_total_length() {
        let mut builder = MessageBuilder::new(
            (4 << 8) | 1,
            NLM_F_REQUEST | NLM_F_ACK,
            NfGenHeader::new(0, 100),
        );
        builder.attrs().put_u8(1, 1).unwrap();
        let msg = builder.finish().unwrap();

        assert_eq!(msg.len(), NLMSG_HDRLEN + NFGEN_HDRLEN + 8);
        let header = NlMsgHeader::decode(&msg).unwrap();
        assert_eq!(header.len as usize, msg.len());
        assert_eq!(header.flags, NLM_F_REQUEST | NLM_F_ACK);

        let nfgen = NfGenHeader::decode(&msg[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(nfgen.group, 100);

        let table = AttrTable::parse(&msg[NLMSG_HDRLEN + NFGEN_HDRLEN..], 6).unwrap();
        assert_eq!(table.get_u8(1).unwrap(), Some(1));
    }
}
