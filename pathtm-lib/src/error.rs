#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input bytes insufficient for a declared header or record.
    #[error("short buffer: got {actual} bytes, want at least {minimum}")]
    ShortBuffer { actual: usize, minimum: usize },

    /// CCSDS version bits were non-zero.
    #[error("unknown CCSDS version {0}")]
    UnknownVersion(u8),

    /// Marshal requested for a packet without payload bytes.
    #[error("no data")]
    EmptyPayload,

    /// A record that cannot be framed, e.g. the truncated tail of an archive
    /// file.
    #[error("invalid record")]
    Invalid,

    /// Invalid archive path format string.
    #[error("invalid path format: {0}")]
    Format(String),

    /// System clock unavailable for wall-clock promotion.
    #[error("wall clock unavailable")]
    Clock,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
