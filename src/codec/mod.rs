//! Payload codecs keyed by `data_type`, plus the compression layer applied
//! on top of them (spec.md §4.2).

pub mod binary;
pub mod compression;
pub mod files;
pub mod json;

pub use compression::{compress, decompress};
pub use files::{DecodedFile, FileSource};
pub use json::JsonPayload;
