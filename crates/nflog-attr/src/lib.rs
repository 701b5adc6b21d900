//! Netlink message framing and typed attribute tables.
//!
//! Everything the NFLOG client puts on or takes off the wire passes through
//! this crate:
//! - a 16-byte netlink header (host byte order)
//! - a 4-byte nfnetlink header carrying the protocol family and group id
//! - a sequence of length-prefixed, type-tagged attributes, 4-byte aligned
//!
//! Parsed tables borrow the receive buffer; nothing is copied.

pub mod builder;
pub mod error;
pub mod header;
pub mod message;
pub mod table;

pub use builder::{AttrWriter, MessageBuilder, NestToken};
pub use error::{AttrError, Result};
pub use header::{
    align, NfGenHeader, NlMsgHeader, NFGEN_HDRLEN, NFNETLINK_V0, NLMSG_DONE, NLMSG_ERROR,
    NLMSG_HDRLEN, NLMSG_NOOP, NLM_F_ACK, NLM_F_REQUEST,
};
pub use message::{messages, Message, Messages};
pub use table::{
    Attr, AttrIter, AttrTable, ATTR_HDRLEN, MAX_NESTING_DEPTH, NLA_F_NESTED, NLA_F_NET_BYTEORDER,
    NLA_TYPE_MASK,
};
