#![doc = include_str!("../README.md")]

pub mod error;
pub mod key;
pub mod polymur;
pub mod table;

pub use error::{Error, Result};
pub use key::{KeyHash, Value};
pub use polymur::{PolymurHash, PolymurHasher, PolymurState};
pub use table::{ChainedHashTable, Lookup, TableBuilder, DEFAULT_CAPACITY};
