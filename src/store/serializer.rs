//! Value Serialization
//!
//! The serializer collaborator used by stores that turn values into bytes,
//! and the codec rule shared by those stores: strings are stored verbatim,
//! everything else goes through the serializer.

use crate::error::{Result, StoreError};
use crate::store::{Value, ValueType};

// == Serializer ==
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8], ty: ValueType) -> Result<Value>;
}

/// JSON serializer over the value's document form.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        let document = value.to_document()?;
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            serde_json::to_vec(&document)?
        };
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8], ty: ValueType) -> Result<Value> {
        let document: serde_json::Value = serde_json::from_slice(bytes)?;
        ty.from_document(document)
    }
}

// == Codec ==
/// Encodes a value for storage.
pub fn encode_value(serializer: &dyn Serializer, value: &Value) -> Result<Vec<u8>> {
    match value.as_str() {
        Some(text) => Ok(text.as_bytes().to_vec()),
        None => serializer.serialize(value),
    }
}

/// Decodes stored bytes as `ty`.
pub fn decode_value(serializer: &dyn Serializer, bytes: &[u8], ty: ValueType) -> Result<Value> {
    if ty.is_string() {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        return Ok(Value::new(text));
    }
    serializer.deserialize(bytes, ty)
}
