/// Typed view over parsed JSON objects exchanged with the ACME server
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::crypto::encoding::base64url_decode;
use crate::error::{AcmeError, Result};
use crate::problem::Problem;
use crate::types::{Identifier, Status, parse_timestamp};

/// A parsed JSON object with typed accessors.
///
/// `get` never fails: absent keys yield a [`Value`] that reports the
/// absence when a coercion is attempted. Claims are serializable so
/// applications can persist fetched resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims {
    values: Map<String, JsonValue>,
}

impl Claims {
    /// Create an empty claims object
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a claims object from raw JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|err| AcmeError::protocol(format!("invalid JSON body: {err}")))
    }

    /// Build a claims object from a parsed JSON value, which must be an
    /// object
    pub fn from_value(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(values) => Ok(Self { values }),
            other => Err(AcmeError::protocol(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Access a field. Absent keys still return a [`Value`].
    pub fn get<'a>(&'a self, key: &str) -> Value<'a> {
        Value {
            path: key.to_owned(),
            value: self.values.get(key),
        }
    }

    /// `true` if the field is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over the field names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if there are no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert back into a `serde_json::Value`
    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.values.clone())
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// A single field of a [`Claims`] object, possibly absent
#[derive(Debug, Clone)]
pub struct Value<'a> {
    path: String,
    value: Option<&'a JsonValue>,
}

impl<'a> Value<'a> {
    pub(crate) fn of(path: String, value: &'a JsonValue) -> Self {
        Self {
            path,
            value: Some(value),
        }
    }

    /// `true` if the field is present and not JSON `null`
    pub fn exists(&self) -> bool {
        matches!(self.value, Some(v) if !v.is_null())
    }

    /// Fail with a protocol error if the field is absent
    pub fn required(self) -> Result<Value<'a>> {
        if self.exists() {
            Ok(self)
        } else {
            Err(AcmeError::protocol(format!(
                "required field {:?} is missing",
                self.path
            )))
        }
    }

    /// `Some(self)` if the field is present, `None` otherwise
    pub fn optional(self) -> Option<Value<'a>> {
        if self.exists() { Some(self) } else { None }
    }

    fn expect(&self) -> Result<&'a JsonValue> {
        match self.value {
            Some(v) if !v.is_null() => Ok(v),
            _ => Err(AcmeError::protocol(format!(
                "required field {:?} is missing",
                self.path
            ))),
        }
    }

    fn mismatch(&self, expected: &str, found: &JsonValue) -> AcmeError {
        AcmeError::protocol(format!(
            "field {:?}: expected {expected}, found {}",
            self.path,
            json_kind(found)
        ))
    }

    /// Coerce to a string slice
    pub fn as_str(&self) -> Result<&'a str> {
        let v = self.expect()?;
        v.as_str().ok_or_else(|| self.mismatch("a string", v))
    }

    /// Coerce to an owned string
    pub fn as_string(&self) -> Result<String> {
        self.as_str().map(str::to_owned)
    }

    /// Coerce to an integer
    pub fn as_int(&self) -> Result<i64> {
        let v = self.expect()?;
        v.as_i64().ok_or_else(|| self.mismatch("an integer", v))
    }

    /// Coerce to a boolean
    pub fn as_bool(&self) -> Result<bool> {
        let v = self.expect()?;
        v.as_bool().ok_or_else(|| self.mismatch("a boolean", v))
    }

    /// Coerce to a URI (e.g. a `mailto:` contact)
    pub fn as_uri(&self) -> Result<Url> {
        let s = self.as_str()?;
        Url::parse(s).map_err(|err| {
            AcmeError::protocol(format!("field {:?}: invalid URI {s:?}: {err}", self.path))
        })
    }

    /// Coerce to an absolute URL
    pub fn as_url(&self) -> Result<Url> {
        self.as_uri()
    }

    /// Coerce to an instant via RFC 3339 parsing
    pub fn as_instant(&self) -> Result<Timestamp> {
        parse_timestamp(self.as_str()?)
    }

    /// Coerce to a resource status
    pub fn as_status(&self) -> Result<Status> {
        Ok(Status::parse(self.as_str()?))
    }

    /// Coerce to binary data encoded as unpadded base64url
    pub fn as_binary(&self) -> Result<Vec<u8>> {
        base64url_decode(self.as_str()?)
    }

    /// Coerce to a nested claims object
    pub fn as_object(&self) -> Result<Claims> {
        let v = self.expect()?;
        match v {
            JsonValue::Object(values) => Ok(Claims {
                values: values.clone(),
            }),
            other => Err(self.mismatch("an object", other)),
        }
    }

    /// Coerce to an array of values
    pub fn as_array(&self) -> Result<Array<'a>> {
        let v = self.expect()?;
        match v {
            JsonValue::Array(items) => Ok(Array {
                path: self.path.clone(),
                items,
            }),
            other => Err(self.mismatch("an array", other)),
        }
    }

    /// Coerce to a problem document
    pub fn as_problem(&self) -> Result<Problem> {
        serde_json::from_value(self.expect()?.clone()).map_err(|err| {
            AcmeError::protocol(format!("field {:?}: invalid problem: {err}", self.path))
        })
    }

    /// Coerce to an identifier
    pub fn as_identifier(&self) -> Result<Identifier> {
        serde_json::from_value(self.expect()?.clone()).map_err(|err| {
            AcmeError::protocol(format!("field {:?}: invalid identifier: {err}", self.path))
        })
    }
}

/// A JSON array of a [`Claims`] object
#[derive(Debug, Clone)]
pub struct Array<'a> {
    path: String,
    items: &'a Vec<JsonValue>,
}

impl<'a> Array<'a> {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if the array is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Access an element; out-of-range indexes behave like absent fields
    pub fn get(&self, index: usize) -> Value<'a> {
        Value {
            path: format!("{}[{index}]", self.path),
            value: self.items.get(index),
        }
    }

    /// Iterate over the elements lazily
    pub fn iter(&self) -> impl Iterator<Item = Value<'a>> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(i, v)| Value::of(format!("{}[{i}]", self.path), v))
    }
}
