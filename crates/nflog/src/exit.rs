use std::fmt;
use std::io;

use nflog_record::XmlError;
use nflog_session::SessionError;
use nflog_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

const EPERM: i32 = 1;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

fn rejected(context: &str, code: i32) -> CliError {
    let exit = if code == EPERM {
        PERMISSION_DENIED
    } else {
        FAILURE
    };
    CliError::new(
        exit,
        format!(
            "{context}: kernel rejected the request: {}",
            io::Error::from_raw_os_error(code)
        ),
    )
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open(source) | TransportError::Io(source) => io_error(context, source),
        TransportError::Rejected { code } => rejected(context, code),
        TransportError::Malformed(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Rejected { code } => rejected(context, code),
        SessionError::Attr(_) | SessionError::UnexpectedMessage { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::Conflict { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn xml_error(context: &str, err: XmlError) -> CliError {
    match err {
        XmlError::Attr(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        XmlError::UnknownFlag(_) => CliError::new(USAGE, format!("{context}: {err}")),
        XmlError::Format => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eperm_rejection_maps_to_permission_denied() {
        let err = session_error("bind failed", SessionError::Rejected { code: EPERM });
        assert_eq!(err.code, PERMISSION_DENIED);
        assert!(err.message.starts_with("bind failed: kernel rejected"));
    }

    #[test]
    fn open_permission_error_maps_to_permission_denied() {
        let err = transport_error(
            "open failed",
            TransportError::Open(io::Error::from(io::ErrorKind::PermissionDenied)),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn conflict_is_a_usage_error() {
        let err = session_error("bind failed", SessionError::Conflict { group: 1 });
        assert_eq!(err.code, USAGE);
    }
}
