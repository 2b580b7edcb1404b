//! Error types shared by both halves of the bus.
//!
//! Only [`TransportError`] is allowed to travel past the function that
//! produced it (and only as far as the controller tick). The other types are
//! returned by validating functions whose callers turn them into
//! "drop and log".

use std::fmt;

/// A contribution or index that does not address a valid target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    /// Column outside `0..TARGET_COUNT`.
    ColumnOutOfRange(i32),
    /// Row outside `0..ROW_COUNT`.
    RowOutOfRange(i32),
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnOutOfRange(col) => write!(f, "column {col} out of range"),
            Self::RowOutOfRange(row) => write!(f, "row {row} out of range"),
        }
    }
}

impl std::error::Error for MappingError {}

/// A malformed packet on the offsets channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WireError {
    /// The datagram could not be decoded at all.
    Decode(String),
    /// The message was sent to an address other than the offsets channel.
    WrongAddress(String),
    /// Arguments did not form whole `(index, offset)` pairs.
    OddArgumentCount(usize),
    /// More pairs than there are targets.
    TooManyPairs(usize),
    /// An argument at the given position had the wrong type tag.
    WrongType {
        /// Argument position in the message.
        position: usize,
        /// Type tag that was expected there.
        expected: &'static str,
    },
    /// An index outside the target range.
    IndexOutOfRange(i32),
    /// Indices were not strictly ascending.
    Unsorted {
        /// Position of the offending pair.
        pair: usize,
    },
    /// Encoding an outbound packet failed.
    Encode(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(msg) => write!(f, "packet decode failed: {msg}"),
            Self::WrongAddress(addr) => write!(f, "unexpected address {addr:?}"),
            Self::OddArgumentCount(n) => write!(f, "odd argument count {n}"),
            Self::TooManyPairs(n) => write!(f, "{n} pairs exceeds target count"),
            Self::WrongType { position, expected } => {
                write!(f, "argument {position} is not {expected}")
            }
            Self::IndexOutOfRange(index) => write!(f, "index {index} out of range"),
            Self::Unsorted { pair } => write!(f, "pair {pair} is not in ascending index order"),
            Self::Encode(msg) => write!(f, "packet encode failed: {msg}"),
        }
    }
}

impl std::error::Error for WireError {}

/// Failure to construct a sender or to transmit through it.
#[derive(Debug)]
pub enum TransportError {
    /// The link dropped between the state check and sender construction.
    NotConnected,
    /// The underlying socket call failed.
    Io(std::io::Error),
    /// The payload could not be encoded.
    Encode(WireError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "transport not connected"),
            Self::Io(err) => write!(f, "transport I/O error: {err}"),
            Self::Encode(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotConnected => None,
            Self::Io(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<WireError> for TransportError {
    fn from(err: WireError) -> Self {
        Self::Encode(err)
    }
}

/// Configuration could not be loaded or is invalid.
#[derive(Debug)]
pub enum ConfigError {
    /// Reading the file failed.
    Io(std::io::Error),
    /// The file is not valid TOML for the expected shape.
    Parse(String),
    /// A value is present but unusable.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(msg) => write!(f, "failed to parse config: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;
