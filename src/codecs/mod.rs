//! Cache Codec Implementations
//!
//! Built-in implementations of the [`CacheCodec`](crate::traits::CacheCodec)
//! trait, plus the decoding rule remote backends apply to stored payloads.

mod json;
pub use json::JsonCodec;

use crate::traits::CacheCodec;
use crate::value::CacheValue;

/// Decode a stored payload, falling back to the raw text.
///
/// Payloads written by other producers (plain strings, hand-set keys) are not
/// an error: they surface as [`CacheValue::String`] with lossy UTF-8.
pub fn decode_or_raw<C: CacheCodec + ?Sized>(codec: &C, bytes: &[u8]) -> CacheValue {
    codec
        .deserialize::<CacheValue>(bytes)
        .unwrap_or_else(|_| CacheValue::String(String::from_utf8_lossy(bytes).into_owned()))
}
