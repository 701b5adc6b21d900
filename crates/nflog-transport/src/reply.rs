use nflog_attr::Message;

use crate::error::{Result, TransportError};

/// How a received datagram relates to an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// The kernel acknowledged the request.
    Ack,
    /// The kernel rejected the request with this (positive) errno.
    Rejected(i32),
    /// An acknowledgement for some other request.
    Stale { seq: u32 },
    /// Not an acknowledgement; log records or other traffic.
    Unrelated,
}

/// Classify a received datagram while waiting for the ack of `seq`.
///
/// The kernel sends acknowledgements in their own datagram, so only the
/// first message is inspected.
pub fn classify_reply(datagram: &[u8], seq: u32) -> Result<Reply> {
    let msg = Message::parse(datagram)?;
    let Some(code) = msg.error_code()? else {
        return Ok(Reply::Unrelated);
    };

    match msg.acked_seq() {
        Some(acked) if acked == seq => {}
        Some(acked) => return Ok(Reply::Stale { seq: acked }),
        None => {
            return Err(TransportError::Malformed(
                nflog_attr::AttrError::TruncatedMessage {
                    needed: 4 + nflog_attr::NLMSG_HDRLEN,
                    available: msg.payload.len(),
                },
            ))
        }
    }

    if code == 0 {
        Ok(Reply::Ack)
    } else {
        Ok(Reply::Rejected(code.saturating_neg()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use nflog_attr::{MessageBuilder, NfGenHeader, NlMsgHeader, NLMSG_ERROR, NLMSG_HDRLEN};

    const EBUSY: i32 = 16;

    fn error_reply(code: i32, seq: u32) -> BytesMut {
        let mut buf = BytesMut::new();
        NlMsgHeader {
            len: (NLMSG_HDRLEN * 2 + 4) as u32,
            kind: NLMSG_ERROR,
            ..NlMsgHeader::default()
        }
        .encode(&mut buf);
        buf.put_i32_ne(code);
        NlMsgHeader {
            len: 24,
            seq,
            ..NlMsgHeader::default()
        }
        .encode(&mut buf);
        buf
    }

    #[test]
    fn zero_code_is_ack() {
        assert_eq!(classify_reply(&error_reply(0, 5), 5).unwrap(), Reply::Ack);
    }

    #[test]
    fn negative_code_is_rejection() {
        assert_eq!(
            classify_reply(&error_reply(-EBUSY, 5), 5).unwrap(),
            Reply::Rejected(EBUSY)
        );
    }

    #[test]
    fn ack_for_other_request_is_stale() {
        assert_eq!(
            classify_reply(&error_reply(0, 4), 5).unwrap(),
            Reply::Stale { seq: 4 }
        );
    }

    #[test]
    fn log_records_are_unrelated() {
        let mut builder = MessageBuilder::new(4 << 8, 0, NfGenHeader::new(2, 0));
        builder.attrs().put_u32(2, 1).unwrap();
        let msg = builder.finish().unwrap();
        assert_eq!(classify_reply(&msg, 5).unwrap(), Reply::Unrelated);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            classify_reply(&[1, 2, 3], 5),
            Err(TransportError::Malformed(_))
        ));
    }
}
