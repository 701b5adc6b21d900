//! NFLOG session management.
//!
//! A [`Session`] owns a kernel [`Transport`](nflog_transport::Transport) and
//! the registry of groups bound on it. It sends configuration commands,
//! and routes every inbound log record to the handler registered for the
//! record's group.

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod session;

pub use command::{decode_command, encode_command, Command, DecodedCommand, AF_UNSPEC};
pub use config::{GroupConfig, LogFlags};
pub use error::{Result, SessionError};
pub use handler::{handler_fn, LogHandler};
pub use registry::{GroupEntry, GroupHandle, GroupRegistry};
pub use session::{Delivery, Session};
