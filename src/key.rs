//! Key hashing.
//!
//! Statically typed keys hash through `Hash` and can never fail. [`Value`]
//! is a dynamically typed key where some variants have no stable hash;
//! hashing those reports [`Error::UnhashableKey`] instead of producing an
//! index.

use core::fmt;
use core::hash::{Hash, Hasher};

use crate::error::{Error, Result};

/// A key that can be fed to a `Hasher`, or refuse to be.
pub trait KeyHash {
    fn try_hash<H: Hasher>(&self, state: &mut H) -> Result<()>;
}

impl<T: Hash + ?Sized> KeyHash for T {
    #[inline]
    fn try_hash<H: Hasher>(&self, state: &mut H) -> Result<()> {
        self.hash(state);
        Ok(())
    }
}

/// Dynamically typed value, usable as a key or as a stored value.
///
/// `List` is mutable in spirit and therefore unhashable; a `Tuple` hashes
/// only if all of its elements do. Floats compare and hash by bit pattern,
/// so `NaN == NaN` and `0.0 != -0.0`.
#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
}

impl Value {
    /// Whether `try_hash` succeeds for this value.
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::List(_) => false,
            Value::Tuple(items) => items.iter().all(Value::is_hashable),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl KeyHash for Value {
    fn try_hash<H: Hasher>(&self, state: &mut H) -> Result<()> {
        match self {
            Value::None => state.write_u8(0),
            Value::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Value::Int(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            Value::Float(f) => {
                state.write_u8(3);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Value::Tuple(items) => {
                state.write_u8(5);
                state.write_usize(items.len());
                for item in items {
                    item.try_hash(state)?;
                }
            }
            Value::List(_) => return Err(Error::UnhashableKey),
        }
        Ok(())
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_seq(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
