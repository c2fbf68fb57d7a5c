use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The key's type has no stable hash (e.g. a mutable list).
    #[error("unhashable key")]
    UnhashableKey,
    #[error("key not found")]
    KeyNotFound,
    /// A table needs at least one bucket.
    #[error("invalid capacity {0}: a table needs at least one bucket")]
    InvalidCapacity(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
