use crate::error::{AttrError, Result};
use crate::header::{align, NfGenHeader, NlMsgHeader, NFGEN_HDRLEN, NLMSG_ERROR, NLMSG_HDRLEN};

/// One netlink message borrowed from a receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    pub header: NlMsgHeader,
    /// Everything after the netlink header, up to the declared length.
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// Parse exactly one message from the start of `buf`.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let header = NlMsgHeader::decode(buf)?;
        let len = header.len as usize;
        if len < NLMSG_HDRLEN || len > buf.len() {
            return Err(AttrError::TruncatedMessage {
                needed: len.max(NLMSG_HDRLEN),
                available: buf.len(),
            });
        }
        Ok(Self {
            header,
            payload: &buf[NLMSG_HDRLEN..len],
        })
    }

    /// Split the payload into the nfnetlink header and the attribute section.
    pub fn nfgen(&self) -> Result<(NfGenHeader, &'a [u8])> {
        let nfgen = NfGenHeader::decode(self.payload)?;
        Ok((nfgen, &self.payload[NFGEN_HDRLEN..]))
    }

    /// For an `NLMSG_ERROR` message, the error code: 0 is an
    /// acknowledgement, a negative errno is a rejection.
    pub fn error_code(&self) -> Result<Option<i32>> {
        if self.header.kind != NLMSG_ERROR {
            return Ok(None);
        }
        let code: [u8; 4] = self
            .payload
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(AttrError::TruncatedMessage {
                needed: 4,
                available: self.payload.len(),
            })?;
        Ok(Some(i32::from_ne_bytes(code)))
    }

    /// Sequence number of the request an `NLMSG_ERROR` answers.
    ///
    /// The kernel echoes the original header after the error code.
    pub fn acked_seq(&self) -> Option<u32> {
        let original = self.payload.get(4..)?;
        NlMsgHeader::decode(original).ok().map(|h| h.seq)
    }
}

/// Iterator over the netlink messages packed into one receive buffer.
#[derive(Debug, Clone)]
pub struct Messages<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

/// Split `buf` into netlink messages.
pub fn messages(buf: &[u8]) -> Messages<'_> {
    Messages {
        buf,
        offset: 0,
        done: false,
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = Result<Message<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buf.len() {
            return None;
        }

        match Message::parse(&self.buf[self.offset..]) {
            Ok(msg) => {
                let remaining = self.buf.len() - self.offset;
                self.offset += align(msg.header.len as usize).min(remaining);
                Some(Ok(msg))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
