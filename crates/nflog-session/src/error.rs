use nflog_attr::AttrError;
use nflog_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A message or attribute could not be decoded.
    #[error("attribute error: {0}")]
    Attr(#[from] AttrError),

    /// Transport-level failure other than a kernel rejection.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The kernel declined a command. `code` is the positive errno.
    #[error("command rejected by kernel: {}", std::io::Error::from_raw_os_error(*code))]
    Rejected { code: i32 },

    /// The group is already bound in this session.
    #[error("group {group} is already bound")]
    Conflict { group: u16 },

    /// A log record arrived for a group nobody bound.
    #[error("no subscriber for group {group}")]
    NoSubscriber { group: u16 },

    /// A log record arrived for a bound group without a handler.
    #[error("group {group} has no handler")]
    NoCallback { group: u16 },

    /// The handle was issued by another session.
    #[error("group handle belongs to another session")]
    StaleHandle,

    /// The handle's group is no longer bound.
    #[error("group {group} is not bound")]
    UnknownGroup { group: u16 },

    /// A message of a type the session does not handle.
    #[error("unexpected message type {kind:#06x}")]
    UnexpectedMessage { kind: u16 },

    /// A configuration message did not carry a recognisable command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl SessionError {
    /// True for dispatch misses that are routine on a shared socket.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::NoSubscriber { .. } | SessionError::NoCallback { .. }
        )
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected { code } => SessionError::Rejected { code },
            TransportError::Malformed(err) => SessionError::Attr(err),
            other => SessionError::Transport(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_lifted_out_of_transport() {
        let err = SessionError::from(TransportError::Rejected { code: 16 });
        assert!(matches!(err, SessionError::Rejected { code: 16 }));
    }

    #[test]
    fn closed_stays_a_transport_error() {
        let err = SessionError::from(TransportError::Closed);
        assert!(matches!(err, SessionError::Transport(TransportError::Closed)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn dispatch_misses_are_recoverable() {
        assert!(SessionError::NoSubscriber { group: 1 }.is_recoverable());
        assert!(SessionError::NoCallback { group: 1 }.is_recoverable());
        assert!(!SessionError::Conflict { group: 1 }.is_recoverable());
    }
}
