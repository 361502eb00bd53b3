use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// SHA-256 (hex) over the canonical JSON form of a record payload.
/// Object keys are emitted in sorted order at every depth.
pub fn row_hash<T: Serialize>(payload: &T) -> Result<String> {
    let canonical = canonical_json(&serde_json::to_value(payload)?)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&Sorted(value))?)
}

struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Sorted<'_>> =
                    map.iter().map(|(k, v)| (k, Sorted(v))).collect();
                sorted.serialize(serializer)
            }
            Value::Array(items) => {
                let items: Vec<Sorted<'_>> = items.iter().map(Sorted).collect();
                items.serialize(serializer)
            }
            other => other.serialize(serializer),
        }
    }
}
