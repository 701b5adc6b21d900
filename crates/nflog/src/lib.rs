//! Userspace client for the Linux NFLOG packet logging subsystem.
//!
//! # Crate Structure
//!
//! - [`attr`]: netlink headers and the typed attribute table
//! - [`record`]: log record accessors and XML rendering
//! - [`session`]: group registry, configuration commands, dispatch
//! - [`transport`]: the kernel channel and its `NETLINK_NETFILTER` socket

/// Re-export attribute table types.
pub mod attr {
    pub use nflog_attr::*;
}

/// Re-export record types.
pub mod record {
    pub use nflog_record::*;
}

/// Re-export session types.
pub mod session {
    pub use nflog_session::*;
}

/// Re-export transport types.
pub mod transport {
    pub use nflog_transport::*;
}

pub use nflog_record::{LogRecord, XmlFlags};
pub use nflog_session::{GroupConfig, GroupHandle, LogHandler, Session, SessionError};

/// Open a netfilter netlink socket and start a session on it.
#[cfg(target_os = "linux")]
pub fn open_session() -> nflog_transport::Result<Session<nflog_transport::NetlinkSocket>> {
    open_session_with_config(nflog_transport::SocketConfig::default())
}

/// [`open_session`] with explicit socket configuration.
#[cfg(target_os = "linux")]
pub fn open_session_with_config(
    config: nflog_transport::SocketConfig,
) -> nflog_transport::Result<Session<nflog_transport::NetlinkSocket>> {
    nflog_transport::NetlinkSocket::open_with_config(config).map(Session::new)
}
