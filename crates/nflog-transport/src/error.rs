/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The kernel socket could not be created or bound.
    #[error("failed to open netlink socket: {0}")]
    Open(std::io::Error),

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The kernel answered a request with a negative acknowledgement.
    /// `code` is the positive errno.
    #[error("request rejected by kernel: {}", std::io::Error::from_raw_os_error(*code))]
    Rejected { code: i32 },

    /// Traffic on the socket could not be framed.
    #[error("malformed netlink traffic: {0}")]
    Malformed(#[from] nflog_attr::AttrError),

    /// No traffic arrived within the configured receive timeout.
    #[error("receive timed out")]
    TimedOut,

    /// The kernel dropped records because the receive buffer was full.
    #[error("receive buffer overrun, records were lost")]
    Overrun,

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// True for conditions after which the transport can keep receiving.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::TimedOut | TransportError::Overrun)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
