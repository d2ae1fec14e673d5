//! Conversion of successful payloads into typed responses.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Build a typed response from a parsed JSON payload.
///
/// Returning `None` makes the request fail with `NetworkError::Parsing`.
/// Text payloads (an empty DELETE body) arrive as `Value::String`.
pub trait FromJson: Sized {
    fn from_json(value: &Value) -> Option<Self>;
}

impl FromJson for Value {
    fn from_json(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromJson for String {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

/// Accepts any payload; for endpoints whose body is irrelevant.
impl FromJson for () {
    fn from_json(_: &Value) -> Option<Self> {
        Some(())
    }
}

/// Decodes through serde.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> FromJson for Json<T> {
    fn from_json(value: &Value) -> Option<Self> {
        T::deserialize(value).ok().map(Json)
    }
}

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}
