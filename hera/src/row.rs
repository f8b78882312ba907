//! Row operation.
//!
//! - [`Row`]
//! - [`Column`]
//! - [`FromRow`]
//! - [`Decode`]
//! - [`DecodeError`]
use bytes::Bytes;
use std::{
    fmt,
    num::{ParseFloatError, ParseIntError},
    str::Utf8Error,
    string::FromUtf8Error,
};

use crate::{common::ByteStr, ext::FmtExt};

/// One row of column values.
///
/// Values are raw bytes as sent by the proxy.
#[derive(Clone, PartialEq)]
pub struct Row {
    values: Vec<Bytes>,
}

impl Row {
    pub(crate) fn new(values: Vec<Bytes>) -> Self {
        Self { values }
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns the raw value at `index`.
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.values.get(index)
    }

    /// Try get and decode column.
    pub fn try_get<R: Decode>(&self, index: usize) -> Result<R, DecodeError> {
        match self.values.get(index) {
            Some(value) => R::decode(Column { index, value: value.clone() }),
            None => Err(DecodeError::IndexOutOfBounds(index)),
        }
    }

    /// Try decode type using [`FromRow`] implementation.
    pub fn decode<D: FromRow>(self) -> Result<D, DecodeError> {
        D::from_row(self)
    }

    /// Consume self into raw values.
    pub fn into_values(self) -> Vec<Bytes> {
        self.values
    }
}

impl IntoIterator for Row {
    type Item = Column;

    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { values: self.values.into_iter().enumerate() }
    }
}

/// [`IntoIterator`] implementation from [`Row`].
#[derive(Debug)]
pub struct IntoIter {
    values: std::iter::Enumerate<std::vec::IntoIter<Bytes>>,
}

impl Iterator for IntoIter {
    type Item = Column;

    fn next(&mut self) -> Option<Self::Item> {
        self.values.next().map(|(index, value)| Column { index, value })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_list();
        for value in &self.values {
            dbg.entry(&format_args!("{}", value.truncated()));
        }
        dbg.finish()
    }
}

/// A single column value.
#[derive(Debug, Clone)]
pub struct Column {
    index: usize,
    value: Bytes,
}

impl Column {
    /// Returns the column position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return `true` if value is empty, which is how the proxy sends `NULL`.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.value
    }

    /// Consume self into the inner [`Bytes`].
    pub fn into_value(self) -> Bytes {
        self.value
    }

    /// Try decode type using [`Decode`] implementation.
    pub fn decode<D: Decode>(self) -> Result<D, DecodeError> {
        D::decode(self)
    }

    fn as_str(&self) -> Result<&str, DecodeError> {
        Ok(std::str::from_utf8(&self.value)?)
    }
}

// ===== Traits =====

/// Type that can be constructed from a row.
pub trait FromRow: Sized {
    /// Construct self from row.
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRow for ($($t),*,)
        where
            $($t: Decode),*
        {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                Ok((
                    $(row.try_get($i)?),*,
                ))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5);

/// A type that can be constructed from [`Column`].
pub trait Decode: Sized {
    /// Try decode self from column.
    fn decode(column: Column) -> Result<Self, DecodeError>;
}

impl Decode for Column {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column)
    }
}

/// Empty value decodes as `None`.
impl<T: Decode> Decode for Option<T> {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.is_empty() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

impl Decode for () {
    fn decode(_: Column) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl Decode for Bytes {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column.value)
    }
}

impl Decode for Vec<u8> {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column.value.into())
    }
}

impl Decode for String {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(String::from_utf8(column.value.into())?)
    }
}

impl Decode for ByteStr {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(ByteStr::from_utf8(column.value)?)
    }
}

/// `0` is `false`, `1` is `true`.
impl Decode for bool {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.as_slice() {
            b"0" => Ok(false),
            b"1" => Ok(true),
            _ => Err(DecodeError::Invalid("bool")),
        }
    }
}

macro_rules! decode_parse {
    ($($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn decode(column: Column) -> Result<Self, DecodeError> {
                    Ok(column.as_str()?.trim().parse()?)
                }
            }
        )*
    };
}

decode_parse!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64);

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for DecodeError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

/// An error when decoding row value.
pub enum DecodeError {
    /// Proxy returned non utf8 string.
    Utf8(Utf8Error),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Value is not a valid integer.
    ParseInt(ParseIntError),
    /// Value is not a valid float.
    ParseFloat(ParseFloatError),
    /// Value is not valid for the requested type.
    Invalid(&'static str),
    /// Failed to deserialize using `serde_json`.
    #[cfg(feature = "json")]
    Json(serde_json::error::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::ParseInt(e) => write!(f, "{e}"),
            Self::ParseFloat(e) => write!(f, "{e}"),
            Self::Invalid(ty) => write!(f, "invalid {ty} value"),
            #[cfg(feature = "json")]
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

from!(<Utf8Error>e => Self::Utf8(e));
from!(<FromUtf8Error>e => Self::Utf8(e.utf8_error()));
from!(<ParseIntError>e => Self::ParseInt(e));
from!(<ParseFloatError>e => Self::ParseFloat(e));
#[cfg(feature = "json")]
from!(<serde_json::error::Error>e => Self::Json(e));

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
