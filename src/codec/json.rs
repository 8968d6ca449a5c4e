//! `0x01 JSON` codec.
//!
//! The wire format has no way to distinguish "no value" from "explicit
//! null" other than the bytes actually sent, so handlers that want to send
//! a literal JSON `null` (as opposed to simply returning nothing) construct
//! [`JsonPayload::Null`] rather than relying on an application-language
//! `None`, which the handler API also uses for "absent" (spec.md §4.2).

use bytes::Bytes;
use serde_json::Value;

use crate::error::CodecError;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonPayload {
    Null,
    Value(Value),
}

impl JsonPayload {
    pub fn into_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Value(v) => v,
        }
    }
}

impl From<Value> for JsonPayload {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            other => Self::Value(other),
        }
    }
}

pub fn encode(payload: &JsonPayload) -> Result<Bytes, CodecError> {
    let value = match payload {
        JsonPayload::Null => Value::Null,
        JsonPayload::Value(v) => v.clone(),
    };
    Ok(Bytes::from(serde_json::to_vec(&value)?))
}

pub fn decode(data: &[u8]) -> Result<JsonPayload, CodecError> {
    let value: Value = serde_json::from_slice(data)?;
    Ok(JsonPayload::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_explicit_null() {
        let bytes = encode(&JsonPayload::Null).unwrap();
        assert_eq!(&bytes[..], b"null");
    }

    #[test]
    fn roundtrips_object() {
        let payload = JsonPayload::Value(json!({"a": 1, "b": [true, null]}));
        let bytes = encode(&payload).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn decoding_literal_null_yields_null_variant() {
        assert_eq!(decode(b"null").unwrap(), JsonPayload::Null);
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(decode(b"{not json").is_err());
    }
}
