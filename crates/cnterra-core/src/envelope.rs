//! Node data envelope as published on the bus.
//!
//! Tolerant reader: unknown fields are ignored, and missing or `null` fields
//! take their zero value, so an envelope without a `payload` forwards nothing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// One message of node output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    /// Originating node. Informational; not checked against the routing key.
    #[serde(rename = "nodeid", deserialize_with = "null_as_default")]
    pub node_id: i64,
    /// Opaque data tag.
    #[serde(deserialize_with = "null_as_default")]
    pub data: String,
    /// Standard-alphabet base64 of the raw bytes to forward.
    #[serde(deserialize_with = "null_as_default")]
    pub payload: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Envelope {
    /// Build an envelope carrying `bytes`.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new(node_id: i64, data: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            node_id,
            data: data.into(),
            payload: STANDARD.encode(bytes),
        }
    }

    /// Parse an envelope from a raw bus message body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Decode the payload into the bytes to forward.
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.payload.as_bytes())?)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
