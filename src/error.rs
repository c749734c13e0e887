use std::io;

/// Specialized Result type for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// General errors for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied value or the stream state cannot support the request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The container or its sample encoding is not one this crate can decode.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Malformed container header.
    #[error("Invalid WAVE file: {0}")]
    InvalidData(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The destination cannot be reached from the current position.
    #[error("Cannot seek from byte {from} to byte {to}")]
    SeekRange { from: u64, to: u64 },
    #[error("Failed to allocate a read buffer of {0} bytes")]
    Allocation(usize),
}
