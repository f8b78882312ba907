use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Decode, DecodeError,
    row::Column,
    value::Value,
};

/// Decode a json column value, or bind a value as json text.
#[derive(Debug)]
pub struct Json<T>(pub T);

impl<T> Decode for Json<T>
where
    T: DeserializeOwned,
{
    fn decode(column: Column) -> Result<Self, DecodeError> {
        serde_json::from_slice(column.as_slice()).map(Json).map_err(Into::into)
    }
}

impl<T: Serialize> Json<T> {
    /// Serialize into a text parameter value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_string(&self.0).map(Value::from)
    }
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}
