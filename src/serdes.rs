//! Payload encoding for the durable process SDK.
//!
//! Two conversions cross the wire boundary:
//!
//! - [`ObjectEncoder`] turns state inputs, queue messages, and local
//!   attributes into an [`EncodedObject`] and back. [`JsonObjectEncoder`] is
//!   the default and writes plain JSON tagged with [`JSON_ENCODING`].
//! - [`DbConverter`] turns global attribute values into the query strings the
//!   server writes into database columns and back. [`BasicDbConverter`] is the
//!   default.
//!
//! Both traits are object safe so they can be shared as `Arc<dyn ...>` inside
//! [`WorkerOptions`](crate::worker::WorkerOptions) and
//! [`ClientOptions`](crate::client::ClientOptions). Typed helpers live on the
//! trait objects.
//!
//! # Example
//!
//! ```rust
//! use durable_process_sdk::serdes::{JsonObjectEncoder, ObjectEncoder};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Order {
//!     id: String,
//!     amount: u32,
//! }
//!
//! let encoder: &dyn ObjectEncoder = &JsonObjectEncoder;
//! let order = Order { id: "o-1".to_string(), amount: 42 };
//!
//! let encoded = encoder.encode(&order).unwrap();
//! let decoded: Option<Order> = encoder.decode(&encoded).unwrap();
//! assert_eq!(decoded, Some(order));
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::api::EncodedObject;

/// Encoding tag written by [`JsonObjectEncoder`].
pub const JSON_ENCODING: &str = "rustJson";

/// Encoding tags [`JsonObjectEncoder`] is able to decode.
///
/// Other SDKs in the ecosystem also write plain JSON under their own tag.
pub const COMPATIBLE_JSON_ENCODINGS: &[&str] = &[JSON_ENCODING, "golangJson"];

/// Error type for serialization/deserialization failures.
#[derive(Debug, Clone)]
pub struct SerDesError {
    /// The kind of error (serialization or deserialization)
    pub kind: SerDesErrorKind,
    /// Descriptive error message
    pub message: String,
}

/// The kind of SerDes error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerDesErrorKind {
    /// Error during serialization
    Serialization,
    /// Error during deserialization
    Deserialization,
}

impl SerDesError {
    /// Creates a new serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self {
            kind: SerDesErrorKind::Serialization,
            message: message.into(),
        }
    }

    /// Creates a new deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self {
            kind: SerDesErrorKind::Deserialization,
            message: message.into(),
        }
    }
}

impl fmt::Display for SerDesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SerDesErrorKind::Serialization => write!(f, "Serialization error: {}", self.message),
            SerDesErrorKind::Deserialization => {
                write!(f, "Deserialization error: {}", self.message)
            }
        }
    }
}

impl std::error::Error for SerDesError {}

/// Converts payloads to and from the [`EncodedObject`] wire envelope.
///
/// Implementations work on [`serde_json::Value`] so that the trait stays
/// object safe; use the typed [`encode`](trait.ObjectEncoder.html#method.encode)
/// and [`decode`](trait.ObjectEncoder.html#method.decode) helpers on
/// `dyn ObjectEncoder` from application code.
pub trait ObjectEncoder: Send + Sync {
    /// Returns the encoding tag this encoder writes.
    fn encoding(&self) -> &str;

    /// Encodes a value.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to encode. `Value::Null` must produce an empty
    ///   [`EncodedObject`].
    fn encode_value(&self, value: &Value) -> Result<EncodedObject, SerDesError>;

    /// Decodes an encoded object.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the object carries no data, the decoded value
    /// otherwise, or a [`SerDesError`] if the tag is not understood or the
    /// data is malformed.
    fn decode_value(&self, object: &EncodedObject) -> Result<Option<Value>, SerDesError>;
}

impl dyn ObjectEncoder {
    /// Encodes any serializable value.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<EncodedObject, SerDesError> {
        let value = serde_json::to_value(value)
            .map_err(|e| SerDesError::serialization(e.to_string()))?;
        self.encode_value(&value)
    }

    /// Decodes into any deserializable type, `Ok(None)` for an empty object.
    pub fn decode<T: DeserializeOwned>(&self, object: &EncodedObject) -> Result<Option<T>, SerDesError> {
        match self.decode_value(object)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SerDesError::deserialization(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Shared handle to an object encoder.
pub type SharedObjectEncoder = Arc<dyn ObjectEncoder>;

/// Default JSON object encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectEncoder;

impl JsonObjectEncoder {
    /// Returns the default encoder as a shared handle.
    pub fn shared() -> SharedObjectEncoder {
        Arc::new(Self)
    }
}

impl ObjectEncoder for JsonObjectEncoder {
    fn encoding(&self) -> &str {
        JSON_ENCODING
    }

    fn encode_value(&self, value: &Value) -> Result<EncodedObject, SerDesError> {
        if value.is_null() {
            return Ok(EncodedObject::default());
        }
        let data =
            serde_json::to_string(value).map_err(|e| SerDesError::serialization(e.to_string()))?;
        Ok(EncodedObject::new(JSON_ENCODING, data))
    }

    fn decode_value(&self, object: &EncodedObject) -> Result<Option<Value>, SerDesError> {
        if object.data.is_empty() {
            return Ok(None);
        }
        if !COMPATIBLE_JSON_ENCODINGS.contains(&object.encoding.as_str()) {
            return Err(SerDesError::deserialization(format!(
                "unsupported encoding '{}', expected one of {:?}",
                object.encoding, COMPATIBLE_JSON_ENCODINGS
            )));
        }
        serde_json::from_str(&object.data)
            .map(Some)
            .map_err(|e| SerDesError::deserialization(e.to_string()))
    }
}

/// A hint attached to a database column, passed through to the [`DbConverter`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbHint(pub String);

impl DbHint {
    /// Creates a new hint.
    pub fn new(hint: impl Into<String>) -> Self {
        Self(hint.into())
    }
}

/// Converts global attribute values to and from database query values.
pub trait DbConverter: Send + Sync {
    /// Converts a value to the string the server uses in its DB query.
    fn to_db_value(&self, value: &Value, hint: Option<&DbHint>) -> Result<String, SerDesError>;

    /// Converts a DB query value back into candidate JSON values.
    ///
    /// Candidates are tried in order against the caller's target type; the
    /// first one that deserializes wins. An empty list means "no value".
    fn from_db_value(&self, db_value: &str, hint: Option<&DbHint>)
        -> Result<Vec<Value>, SerDesError>;
}

impl dyn DbConverter {
    /// Converts any serializable value to a DB query value.
    pub fn to_db<T: Serialize + ?Sized>(
        &self,
        value: &T,
        hint: Option<&DbHint>,
    ) -> Result<String, SerDesError> {
        let value = serde_json::to_value(value)
            .map_err(|e| SerDesError::serialization(e.to_string()))?;
        self.to_db_value(&value, hint)
    }

    /// Converts a DB query value into the target type, `Ok(None)` for no value.
    pub fn from_db<T: DeserializeOwned>(
        &self,
        db_value: &str,
        hint: Option<&DbHint>,
    ) -> Result<Option<T>, SerDesError> {
        let candidates = self.from_db_value(db_value, hint)?;
        if candidates.is_empty() {
            return Ok(None);
        }
        let mut last_error = None;
        for candidate in candidates {
            match serde_json::from_value::<T>(candidate) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => last_error = Some(e),
            }
        }
        Err(SerDesError::deserialization(format!(
            "cannot convert db value '{}': {}",
            db_value,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

/// Shared handle to a DB converter.
pub type SharedDbConverter = Arc<dyn DbConverter>;

/// Default DB converter.
///
/// Values are JSON encoded with the surrounding quotes of string values
/// stripped, so `"abc"` is stored as `abc` and `12` as `12`. Reading tries the
/// raw text as JSON first and then as a plain string.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicDbConverter;

impl BasicDbConverter {
    /// Returns the default converter as a shared handle.
    pub fn shared() -> SharedDbConverter {
        Arc::new(Self)
    }
}

impl DbConverter for BasicDbConverter {
    fn to_db_value(&self, value: &Value, _hint: Option<&DbHint>) -> Result<String, SerDesError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => serde_json::to_string(other)
                .map_err(|e| SerDesError::serialization(e.to_string())),
        }
    }

    fn from_db_value(
        &self,
        db_value: &str,
        _hint: Option<&DbHint>,
    ) -> Result<Vec<Value>, SerDesError> {
        if db_value.is_empty() {
            return Ok(Vec::new());
        }
        let mut candidates = Vec::with_capacity(2);
        if let Ok(parsed) = serde_json::from_str::<Value>(db_value) {
            candidates.push(parsed);
        }
        candidates.push(Value::String(db_value.to_string()));
        Ok(candidates)
    }
}
