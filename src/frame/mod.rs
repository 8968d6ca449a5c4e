//! Bit-exact wire framing: fixed headers, streamed chunks, rate-limited
//! writes (spec.md ยง4.1, ยง6).

pub mod reader;
pub mod types;
pub mod writer;

pub use reader::FrameReader;
pub use types::{
    write_fixed_frame, write_input_request_frame, write_ping, write_stream_frame, Compression,
    DataType, FileEntry, FrameType, InboundFrame, InputRequestFrame, MessageHeaders, RequestFrame,
};
pub use writer::{FrameWriter, MAX_DOWNLOAD_SPEED, MIN_DOWNLOAD_SPEED};
