//! `0x00 BINARY` codec: raw bytes pass through untouched (spec.md §4.2).

use bytes::Bytes;

pub fn encode(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(data)
}

pub fn decode(payload: Bytes) -> Bytes {
    payload
}
