use thiserror::Error;

/// Result type for shareclip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shareclip error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported protocol version {0:#06x}")]
    UnsupportedVersion(u16),

    #[error("peer rejected format {0:?}")]
    UnsupportedFormat(String),

    #[error("peer rejected size {0}")]
    UnsupportedSize(i64),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("invalid DIB: {0}")]
    InvalidDib(String),

    #[error("unsafe path {0:?} in file drop")]
    UnsafePath(String),

    #[error("unexpected end of stream")]
    EndOfStream,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid UTF-8 data")]
    InvalidUtf8,

    #[error("invalid UTF-16 data")]
    InvalidUtf16,

    #[error("invalid ASCII data")]
    InvalidAscii,

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Cancellation is routine and must never reach the error dialog.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if this error indicates a format or encoding issue
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::InvalidUtf8
                | Self::InvalidUtf16
                | Self::InvalidAscii
                | Self::InvalidDib(_)
        )
    }
}
