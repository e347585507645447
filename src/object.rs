//! Lazily decoded payloads.

use serde::de::DeserializeOwned;

use crate::api::EncodedObject;
use crate::error::ProcessResult;
use crate::serdes::SharedObjectEncoder;

/// An encoded payload together with the encoder able to read it.
///
/// State inputs and local queue messages reach user code as `Object`s and are
/// decoded only when asked for.
#[derive(Clone)]
pub struct Object {
    encoded: EncodedObject,
    encoder: SharedObjectEncoder,
}

impl Object {
    /// Wraps an encoded object.
    pub fn new(encoded: EncodedObject, encoder: SharedObjectEncoder) -> Self {
        Self { encoded, encoder }
    }

    /// Wraps an optional encoded object, treating `None` as an empty payload.
    pub fn from_optional(encoded: Option<EncodedObject>, encoder: SharedObjectEncoder) -> Self {
        Self::new(encoded.unwrap_or_default(), encoder)
    }

    /// Decodes the payload, `Ok(None)` when it is empty.
    pub fn get<T: DeserializeOwned>(&self) -> ProcessResult<Option<T>> {
        Ok(self.encoder.decode(&self.encoded)?)
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// Returns the raw encoded object.
    pub fn encoded(&self) -> &EncodedObject {
        &self.encoded
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("encoded", &self.encoded)
            .field("encoding", &self.encoder.encoding())
            .finish()
    }
}
