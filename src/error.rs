use std::fmt::Display;

/// WormDB errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A record was added at or below the previous record, or an update would
    /// reorder a record relative to its neighbours.
    OutOfOrder(String),
    /// A record length outside 1..=255.
    BadSize(usize),
    /// A write was attempted on a finalized (or failed) builder.
    Finalized,
    /// The query is shorter than the candidate block's shared prefix and
    /// cannot be resolved within that block.
    QueryTooShort,
    /// A block failed to decode; carries the block index.
    BadBlock(usize),
    /// The data or index file magic did not match.
    BadMagic,
    /// An update replacement whose length differs from the stored record.
    LengthMismatch,
    /// The index file checksum did not match its payload.
    Checksum,
    /// Invalid configuration, typically block size or offset constraints.
    Config(String),
    /// An IO error.
    IO(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::OutOfOrder(msg) => write!(f, "out of order: {msg}"),
            Error::BadSize(len) => write!(f, "record length {len} outside 1..=255"),
            Error::Finalized => write!(f, "write attempted on a finalized builder"),
            Error::QueryTooShort => write!(f, "query too short for exact matching"),
            Error::BadBlock(block) => write!(f, "malformed block {block}"),
            Error::BadMagic => write!(f, "file magic mismatch"),
            Error::LengthMismatch => write!(f, "replacement length must match the stored record"),
            Error::Checksum => write!(f, "index checksum mismatch"),
            Error::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Error::IO(msg) => write!(f, "io error: {msg}"),
        }
    }
}

/// A WormDB Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        Error::IO(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::IO(err.to_string())
    }
}
