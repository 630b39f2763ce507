use serde_json::Value;

use crate::types::Values;

/// Turns a raw log entry into the values handed downstream. Returning
/// `None` marks the entry as undeserializable; the log consumer commits
/// past it so a poison pill cannot wedge the stream.
pub trait Deserializer: Send + Sync {
    fn deserialize(
        &self,
        namespace: &str,
        partition: i32,
        offset: i64,
        key: Option<&[u8]>,
        payload: Option<&[u8]>,
    ) -> Option<Values>;
}

/// Parses the payload as a single JSON document.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDeserializer;

impl JsonDeserializer {
    pub fn new() -> Self {
        Self
    }
}

impl Deserializer for JsonDeserializer {
    fn deserialize(
        &self,
        _namespace: &str,
        _partition: i32,
        _offset: i64,
        _key: Option<&[u8]>,
        payload: Option<&[u8]>,
    ) -> Option<Values> {
        let payload = payload?;
        serde_json::from_slice::<Value>(payload)
            .ok()
            .map(|value| vec![value])
    }
}

/// Emits key and payload as UTF-8 strings, key first. A missing key
/// becomes null; an invalid payload rejects the record.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8StringDeserializer;

impl Utf8StringDeserializer {
    pub fn new() -> Self {
        Self
    }
}

impl Deserializer for Utf8StringDeserializer {
    fn deserialize(
        &self,
        _namespace: &str,
        _partition: i32,
        _offset: i64,
        key: Option<&[u8]>,
        payload: Option<&[u8]>,
    ) -> Option<Values> {
        let payload = std::str::from_utf8(payload?).ok()?;
        let key = match key {
            Some(key) => Value::String(std::str::from_utf8(key).ok()?.to_owned()),
            None => Value::Null,
        };
        Some(vec![key, Value::String(payload.to_owned())])
    }
}
