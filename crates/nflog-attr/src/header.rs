use bytes::{Buf, BufMut, BytesMut};

use crate::error::{AttrError, Result};

/// Netlink header: len (4) + type (2) + flags (2) + seq (4) + pid (4) = 16 bytes.
pub const NLMSG_HDRLEN: usize = 16;

/// nfnetlink header: family (1) + version (1) + res_id (2) = 4 bytes.
pub const NFGEN_HDRLEN: usize = 4;

/// The only nfnetlink protocol version.
pub const NFNETLINK_V0: u8 = 0;

/// Request flag; must be set on every userspace-originated message.
pub const NLM_F_REQUEST: u16 = 0x1;
/// Ask the kernel to acknowledge the request.
pub const NLM_F_ACK: u16 = 0x4;

/// No-op message, to be skipped.
pub const NLMSG_NOOP: u16 = 0x1;
/// Error or acknowledgement.
pub const NLMSG_ERROR: u16 = 0x2;
/// End of a multipart sequence.
pub const NLMSG_DONE: u16 = 0x3;

/// Round `len` up to the 4-byte netlink alignment.
pub const fn align(len: usize) -> usize {
    (len + 3) & !3
}

/// The fixed netlink message header.
///
/// Wire format (host byte order):
/// ```text
/// ┌────────────┬───────────┬───────────┬────────────┬────────────┐
/// │ Length     │ Type      │ Flags     │ Sequence   │ Port id    │
/// │ (4B)       │ (2B)      │ (2B)      │ (4B)       │ (4B)       │
/// └────────────┴───────────┴───────────┴────────────┴────────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NlMsgHeader {
    /// Total message length including this header.
    pub len: u32,
    /// Message type; for nfnetlink this is `(subsystem << 8) | message`.
    pub kind: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
}

impl NlMsgHeader {
    /// Decode a header from the start of `src`.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < NLMSG_HDRLEN {
            return Err(AttrError::TruncatedMessage {
                needed: NLMSG_HDRLEN,
                available: src.len(),
            });
        }
        let mut buf = &src[..NLMSG_HDRLEN];
        Ok(Self {
            len: buf.get_u32_ne(),
            kind: buf.get_u16_ne(),
            flags: buf.get_u16_ne(),
            seq: buf.get_u32_ne(),
            pid: buf.get_u32_ne(),
        })
    }

    /// Append the encoded header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(NLMSG_HDRLEN);
        dst.put_u32_ne(self.len);
        dst.put_u16_ne(self.kind);
        dst.put_u16_ne(self.flags);
        dst.put_u32_ne(self.seq);
        dst.put_u32_ne(self.pid);
    }

    /// nfnetlink subsystem id carried in the high byte of the type.
    pub fn subsystem(&self) -> u8 {
        (self.kind >> 8) as u8
    }

    /// nfnetlink message id carried in the low byte of the type.
    pub fn message(&self) -> u8 {
        (self.kind & 0xff) as u8
    }

    /// Overwrite the sequence number of an encoded message in place.
    pub fn stamp_seq(message: &mut [u8], seq: u32) -> Result<()> {
        if message.len() < NLMSG_HDRLEN {
            return Err(AttrError::TruncatedMessage {
                needed: NLMSG_HDRLEN,
                available: message.len(),
            });
        }
        message[8..12].copy_from_slice(&seq.to_ne_bytes());
        Ok(())
    }
}

/// The nfnetlink header that follows every netlink header in this protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NfGenHeader {
    /// Protocol family (AF_INET, AF_INET6, ...), or 0 for unspecified.
    pub family: u8,
    pub version: u8,
    /// Group id; big-endian on the wire, host order here.
    pub group: u16,
}

impl NfGenHeader {
    /// Header for `family` and `group` at the current protocol version.
    pub fn new(family: u8, group: u16) -> Self {
        Self {
            family,
            version: NFNETLINK_V0,
            group,
        }
    }

    /// Decode a header from the start of `src`.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < NFGEN_HDRLEN {
            return Err(AttrError::TruncatedMessage {
                needed: NFGEN_HDRLEN,
                available: src.len(),
            });
        }
        let mut buf = &src[..NFGEN_HDRLEN];
        Ok(Self {
            family: buf.get_u8(),
            version: buf.get_u8(),
            group: buf.get_u16(),
        })
    }

    /// Append the encoded header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(NFGEN_HDRLEN);
        dst.put_u8(self.family);
        dst.put_u8(self.version);
        dst.put_u16(self.group);
    }
}
