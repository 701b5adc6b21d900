//! Kernel control-channel transport.
//!
//! The NFLOG core only needs three things from a transport: send one framed
//! command and wait for the kernel's acknowledgement, hand back one received
//! buffer, and resize the receive buffer. [`Transport`] captures exactly
//! that; [`NetlinkSocket`] implements it over a `NETLINK_NETFILTER` socket.

pub mod config;
pub mod error;
pub mod reply;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod netlink;

pub use config::{SocketConfig, DEFAULT_MAX_MESSAGE_SIZE, MAX_BATCH_SIZE};
pub use error::{Result, TransportError};
pub use reply::{classify_reply, Reply};
pub use traits::Transport;

#[cfg(target_os = "linux")]
pub use netlink::NetlinkSocket;
