use nflog_attr::AttrError;

/// Errors that abort XML rendering.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// A field selected for output could not be decoded.
    #[error("record attribute error: {0}")]
    Attr(#[from] AttrError),

    /// A fragment could not be formatted.
    #[error("failed to format xml fragment")]
    Format,

    /// An output flag name was not recognised.
    #[error("unknown xml flag: {0}")]
    UnknownFlag(String),
}

pub type Result<T> = std::result::Result<T, XmlError>;
