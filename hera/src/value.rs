//! Statement parameter value.
use bytes::Bytes;
use std::fmt;

use crate::{common::ByteStr, ext::FmtExt};

/// A parameter value.
///
/// Only [`Int`][Value::Int], [`Bytes`][Value::Bytes] and [`Text`][Value::Text]
/// can be sent to the proxy, other variants fail with [`UnsupportedParameterType`].
#[derive(Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Bytes),
    Text(ByteStr),
}

impl Value {
    /// Returns the variant name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
        }
    }

    /// Encode into bind value payload.
    ///
    /// `position` is the 1-based parameter position, used for error reporting.
    pub fn encode(self, position: usize) -> Result<Bytes, UnsupportedParameterType> {
        match self {
            Self::Int(int) => Ok(Bytes::copy_from_slice(itoa::Buffer::new().format(int).as_bytes())),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Null | Self::Float(_) | Self::Bool(_) => Err(UnsupportedParameterType {
                position,
                type_name: self.type_name(),
            }),
        }
    }
}

macro_rules! from {
    (<$($ty:ty),*>$pat:pat => $body:expr) => {
        $(
            impl From<$ty> for Value {
                fn from($pat: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

from!(<i8, i16, i32, i64, u8, u16, u32>v => Self::Int(v.into()));
from!(<isize>v => Self::Int(v as i64));
from!(<f32>v => Self::Float(v.into()));
from!(<f64>v => Self::Float(v));
from!(<bool>v => Self::Bool(v));
from!(<&str>v => Self::Text(ByteStr::copy_from_str(v)));
from!(<String>v => Self::Text(v.into()));
from!(<ByteStr>v => Self::Text(v));
from!(<&[u8]>v => Self::Bytes(Bytes::copy_from_slice(v)));
from!(<Vec<u8>>v => Self::Bytes(v.into()));
from!(<Bytes>v => Self::Bytes(v));

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Self::Null,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "b\"{}\"", v.truncated()),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// A parameter with an optional bind name.
#[derive(Debug, Clone)]
pub struct Param {
    pub(crate) name: Option<ByteStr>,
    pub(crate) value: Value,
}

impl Param {
    /// Positional parameter, named `p<N>` when bound.
    pub fn positional(value: impl Into<Value>) -> Self {
        Self { name: None, value: value.into() }
    }

    /// Named parameter.
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { name: Some(ByteStr::from(name.into())), value: value.into() }
    }
}

/// Parameter value type cannot be sent to the proxy.
pub struct UnsupportedParameterType {
    position: usize,
    type_name: &'static str,
}

impl UnsupportedParameterType {
    /// Returns the 1-based parameter position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the offending value type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::error::Error for UnsupportedParameterType { }

impl fmt::Display for UnsupportedParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported parameter type {} at position {}", self.type_name, self.position)
    }
}

impl fmt::Debug for UnsupportedParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(Value::from(-42i32).encode(1).unwrap(), &b"-42"[..]);
        assert_eq!(Value::from("foo").encode(1).unwrap(), &b"foo"[..]);
        assert_eq!(Value::from(&b"\x00\xff"[..]).encode(1).unwrap(), &b"\x00\xff"[..]);
        assert_eq!(Value::from(u32::MAX).encode(1).unwrap(), &b"4294967295"[..]);
    }

    #[test]
    fn test_unsupported() {
        let err = Value::from(1.5f64).encode(2).unwrap_err();
        assert_eq!(err.position(), 2);
        assert_eq!(err.type_name(), "float");

        let err = Value::from(None::<i32>).encode(3).unwrap_err();
        assert_eq!(err.type_name(), "null");
        assert_eq!(err.to_string(), "unsupported parameter type null at position 3");
    }
}
