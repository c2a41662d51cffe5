//! JSON Codec using `serde_json`
//!
//! This is the wire format of the remote tier: every [`CacheValue`](crate::CacheValue)
//! is stored as its JSON text, so counters written by `INCRBY` (bare integers)
//! decode as integers.

use crate::traits::CacheCodec;
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// JSON Codec using `serde_json`
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl CacheCodec for JsonCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).context("Failed to encode cache value as JSON")
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).context("Failed to decode cache value from JSON")
    }

    fn name(&self) -> &'static str {
        "serde_json"
    }
}
