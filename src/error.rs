use std::io;

use thiserror::Error;

/// Specialized [`Result`] type for the crate's public operations.
pub type RescResult<T> = core::result::Result<T, RescError>;

/// Errors surfaced by `SrrWriter`, `SrsProfiler`/`SrsWriter` and
/// `SrrReconstructor`.
#[derive(Debug, Error)]
pub enum RescError {
    /// An input file, stored file or spliced source file could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A container or RAR block stream violated a structural invariant
    /// (missing marker, a size field that runs past the end of its region,
    /// a VINT wider than 8 bytes).
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The input uses a feature the crate does not implement (unknown
    /// container magic, a non-Store method with compressed input disallowed).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The host's cancellation token was observed set at a check point.
    #[error("operation cancelled")]
    Cancelled,

    /// An underlying read or write failed for a reason unrelated to the
    /// framing itself.
    #[error(transparent)]
    Io(io::Error),

    /// A source stream ran out before the declared number of bytes could be
    /// copied.
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

impl From<io::Error> for RescError {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Io(value),
        }
    }
}
