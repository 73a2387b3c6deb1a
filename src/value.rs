//! Dynamic values carried through the compact codec

use std::collections::BTreeMap;
use std::fmt;

use crate::error::CodecError;

/// Field name to value map of a decoded struct
pub type Fields = BTreeMap<String, Value>;

/// A value in the shape of some resolved type.
///
/// Decoding always produces the canonical variant for a type (`Uint` for
/// unsigned kinds, `Int` for signed kinds and dates, `String` for enum keys and
/// addresses). Encoding is lenient where it is lossless, so `Int(5)` is a valid
/// `uint`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    BigInt(i128),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Struct(Fields),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Presence test used for optional fields.
    pub fn is_present(&self) -> bool {
        !self.is_null()
    }

    /// Truth test used for bool fields.
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Uint(_) => "uint",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Json(_) => "json",
        }
    }

    pub fn as_u64(&self) -> Result<u64, CodecError> {
        match self {
            Value::Uint(n) => Ok(*n),
            Value::Int(n) => u64::try_from(*n).map_err(|_| out_of_range("uint", n)),
            Value::BigInt(n) => u64::try_from(*n).map_err(|_| out_of_range("uint", n)),
            other => Err(invalid("unsigned integer", other)),
        }
    }

    pub fn as_i64(&self) -> Result<i64, CodecError> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Uint(n) => i64::try_from(*n).map_err(|_| out_of_range("int", n)),
            Value::BigInt(n) => i64::try_from(*n).map_err(|_| out_of_range("int", n)),
            other => Err(invalid("integer", other)),
        }
    }

    pub fn as_i128(&self) -> Result<i128, CodecError> {
        match self {
            Value::BigInt(n) => Ok(*n),
            Value::Int(n) => Ok(i128::from(*n)),
            Value::Uint(n) => Ok(i128::from(*n)),
            other => Err(invalid("big integer", other)),
        }
    }

    pub fn as_f64(&self) -> Result<f64, CodecError> {
        match self {
            Value::Float(n) => Ok(*n),
            Value::Uint(n) => Ok(*n as f64),
            Value::Int(n) => Ok(*n as f64),
            other => Err(invalid("number", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, CodecError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(invalid("bool", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, CodecError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(invalid("string", other)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], CodecError> {
        match self {
            Value::Bytes(b) => Ok(b),
            other => Err(invalid("bytes", other)),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], CodecError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(invalid("array", other)),
        }
    }

    pub fn as_fields(&self) -> Result<&Fields, CodecError> {
        match self {
            Value::Struct(fields) => Ok(fields),
            other => Err(invalid("struct", other)),
        }
    }

    /// Converts the value into plain JSON, the representation used by the
    /// `json` primitive.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Uint(n) => Json::from(*n),
            Value::Int(n) => Json::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::BigInt(n) => Json::String(n.to_string()),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::Array(b.iter().map(|x| Json::from(*x)).collect()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Struct(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Json(json) => json.clone(),
        }
    }
}

fn invalid(expected: &'static str, found: &Value) -> CodecError {
    CodecError::InvalidValue {
        expected,
        found: found.kind().to_string(),
    }
}

fn out_of_range(kind: &'static str, value: &dyn fmt::Display) -> CodecError {
    CodecError::OutOfRange {
        kind,
        value: value.to_string(),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Struct(fields)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(json)
    }
}

/// Builds a `Value::Struct` from `name => value` pairs.
#[macro_export]
macro_rules! fields {
    () => { $crate::Value::Struct($crate::Fields::new()) };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $( fields.insert(::std::string::String::from($name), $crate::Value::from($value)); )+
        $crate::Value::Struct(fields)
    }};
}
