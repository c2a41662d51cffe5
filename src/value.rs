//! Cache Values
//!
//! [`CacheValue`] is the single value type every backend stores. Using one
//! tagged type everywhere keeps a value's representation stable across tiers:
//! an integer written to Redis reads back as [`CacheValue::Int`], not as a float.
//!
//! # JSON mapping
//!
//! | Variant      | JSON                         |
//! |--------------|------------------------------|
//! | `Null`       | `null`                       |
//! | `Bool`       | `true` / `false`             |
//! | `Int`        | integer number               |
//! | `Float`      | number with a fractional part|
//! | `String`     | string                       |
//! | `Bytes`      | `{"$bytes": [1, 2, 3]}`      |
//! | `Document`   | array or object              |
//!
//! A document object whose only key is `$bytes` or `$document` is written
//! as `{"$document": <object>}` so it reads back as the same document.

use bytes::Bytes;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as Json;

/// Object key marking an encoded byte string
const BYTES_TAG: &str = "$bytes";
/// Object key wrapping a document that would otherwise read as a tag
const DOCUMENT_TAG: &str = "$document";

/// Single-key objects keyed by one of the tags
fn looks_tagged(doc: &Json) -> bool {
    match doc {
        Json::Object(map) if map.len() == 1 => {
            map.contains_key(BYTES_TAG) || map.contains_key(DOCUMENT_TAG)
        }
        _ => false,
    }
}

/// A value held by a cache backend
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    /// JSON array or object. Scalars always use the dedicated variants.
    Document(Json),
}

impl CacheValue {
    /// Integer payload, if this is an `Int`
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric payload as `f64` (`Int` or `Float`)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Starting point for counter arithmetic on an in-process store.
    ///
    /// `Int` is used as is and `Float` is truncated toward zero. Every other
    /// variant has no numeric reading.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_counter(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`. Documents come back verbatim, without
    /// the `$document` wrapper used on the wire.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Bool(v) => Json::Bool(*v),
            Self::Int(v) => Json::from(*v),
            Self::Float(v) => Json::from(*v),
            Self::String(v) => Json::String(v.clone()),
            Self::Bytes(v) => {
                let mut map = serde_json::Map::with_capacity(1);
                map.insert(
                    BYTES_TAG.to_string(),
                    Json::Array(v.iter().map(|b| Json::from(*b)).collect()),
                );
                Json::Object(map)
            }
            Self::Document(v) => v.clone(),
        }
    }

    /// Wrap plain JSON without reading tags: objects and arrays always
    /// become documents
    #[must_use]
    pub fn from_untagged(json: Json) -> Self {
        match json {
            doc @ (Json::Object(_) | Json::Array(_)) => Self::Document(doc),
            other => Self::from(other),
        }
    }

    fn bytes_from_tagged(map: &serde_json::Map<String, Json>) -> Option<Bytes> {
        if map.len() != 1 {
            return None;
        }
        let Json::Array(items) = map.get(BYTES_TAG)? else {
            return None;
        };
        items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(Bytes::from)
    }
}

impl From<Json> for CacheValue {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(v) => Self::Bool(v),
            Json::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Self::Int(v)
                } else if let Some(v) = n.as_f64() {
                    Self::Float(v)
                } else {
                    Self::Document(Json::Number(n))
                }
            }
            Json::String(v) => Self::String(v),
            Json::Object(mut map) => {
                if let Some(bytes) = Self::bytes_from_tagged(&map) {
                    return Self::Bytes(bytes);
                }
                if map.len() == 1 && matches!(map.get(DOCUMENT_TAG), Some(Json::Object(_))) {
                    if let Some(inner) = map.remove(DOCUMENT_TAG) {
                        return Self::Document(inner);
                    }
                }
                Self::Document(Json::Object(map))
            }
            array @ Json::Array(_) => Self::Document(array),
        }
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for CacheValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for CacheValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for CacheValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for CacheValue {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl Serialize for CacheValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Bytes(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BYTES_TAG, &v[..])?;
                map.end()
            }
            Self::Document(v) if looks_tagged(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DOCUMENT_TAG, v)?;
                map.end()
            }
            Self::Document(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CacheValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Json::deserialize(deserializer).map(Self::from)
    }
}
