//! The five(+one) wire frame families (spec.md ยง3) and their fixed headers.

use std::io::Read;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ProtocolError;
use crate::frame::reader::FrameReader;
use crate::frame::writer::{FrameWriter, MAX_DOWNLOAD_SPEED, MIN_DOWNLOAD_SPEED};

/// One-byte frame type tag, read first on every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Request = 0x00,
    StreamRequest = 0x01,
    InputRequest = 0x02,
    DownloadSpeed = 0x05,
    CancelInput = 0x06,
    Ping = 0xFF,
}

impl FrameType {
    pub fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        match v {
            0x00 => Ok(Self::Request),
            0x01 => Ok(Self::StreamRequest),
            0x02 => Ok(Self::InputRequest),
            0x05 => Ok(Self::DownloadSpeed),
            0x06 => Ok(Self::CancelInput),
            0xFF => Ok(Self::Ping),
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }
}

/// Registered payload content types (spec.md ยง4.2, ยง6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    Binary = 0x00,
    Json = 0x01,
    Files = 0x02,
}

impl DataType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::Binary),
            0x01 => Some(Self::Json),
            0x02 => Some(Self::Files),
            _ => None,
        }
    }
}

/// Registered compression ids (spec.md ยง4.2, ยง6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0x00,
    Gzip = 0x01,
}

impl Compression {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Gzip),
            _ => None,
        }
    }
}

/// Per-file metadata carried in the `Files` message header (spec.md ยง3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileEntry {
    pub key: String,
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// The JSON object carried between the fixed binary header and the payload,
/// terminated by `\x00\x00` (GLOSSARY "Message header").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageHeaders(Map<String, Value>);

impl MessageHeaders {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn offset(&self) -> Option<i64> {
        self.0.get("Offset").and_then(Value::as_i64)
    }

    pub fn set_offset(&mut self, offset: i64) {
        self.0.insert("Offset".into(), Value::from(offset));
    }

    pub fn status(&self) -> u16 {
        self.0
            .get("Status")
            .and_then(Value::as_u64)
            .map(|v| v as u16)
            .unwrap_or(200)
    }

    pub fn set_status(&mut self, status: u16) {
        self.0.insert("Status".into(), Value::from(status));
    }

    pub fn files(&self) -> Result<Option<Vec<FileEntry>>, ProtocolError> {
        match self.0.get("Files") {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|_| ProtocolError::HeaderNotJsonObject),
        }
    }

    pub fn set_files(&mut self, files: &[FileEntry]) {
        self.0.insert(
            "Files".into(),
            serde_json::to_value(files).expect("FileEntry always serializes"),
        );
    }

    /// Parses the raw bytes between the fixed header and the `\x00\x00`
    /// separator. Rejects non-UTF8, non-object JSON, and (GLOSSARY note (b))
    /// any blob containing a raw NUL byte.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.contains(&0u8) {
            return Err(ProtocolError::HeaderContainsNul);
        }
        let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::HeaderNotUtf8)?;
        let value: Value =
            serde_json::from_str(text).map_err(|_| ProtocolError::HeaderNotJsonObject)?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ProtocolError::HeaderNotJsonObject),
        }
    }

    /// Serializes to bytes, rejecting (by construction) any raw NUL byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&Value::Object(self.0.clone())).expect("map always serializes")
    }
}

/// A decoded `Request` frame (type_id 0x00).
#[derive(Debug, Clone)]
pub struct RequestFrame {
    pub handler_id: u16,
    pub message_id: u16,
    pub send_time: u64,
    pub data_type: DataType,
    pub compression: Compression,
    pub headers: MessageHeaders,
    pub payload: Bytes,
}

/// A decoded `InputRequest` frame (type_id 0x02).
#[derive(Debug, Clone)]
pub struct InputRequestFrame {
    pub message_id: u16,
    pub data_type: DataType,
    pub compression: Compression,
    pub headers: MessageHeaders,
    pub payload: Bytes,
}

/// Every frame the reactor can receive, fully materialized.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    Request(RequestFrame),
    /// A StreamRequest, fully reassembled by the chunk loop (spec.md ยง4.1).
    StreamRequest(RequestFrame),
    InputRequest(InputRequestFrame),
    DownloadSpeed(u32),
    CancelInput(u16),
    Ping(u64),
}

const MAX_HEADER_SCAN: usize = 1 << 20;

/// Reads one fixed-length body: headers up to `\x00\x00`, then the
/// remaining declared payload bytes (spec.md ยง4.1 "For fixed-length
/// payloads").
///
/// Bodies over `max_plain_data_size` are rejected outright unless
/// `data_type` is `Files`, in which case the copy is spooled to a temp
/// file instead of buffered whole in memory.
pub async fn read_fixed_body<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    data_length: u32,
    data_type: DataType,
    max_plain_data_size: u64,
) -> Result<(MessageHeaders, Bytes), ProtocolError> {
    let cap = (data_length as usize).min(MAX_HEADER_SCAN);
    let raw_headers = reader
        .read_until(b"\x00\x00", cap)
        .await?;
    let consumed = raw_headers.len() + 2;
    let body_len = (data_length as usize)
        .checked_sub(consumed)
        .ok_or(ProtocolError::DataLengthMismatch {
            declared: data_length,
            actual: consumed as u32,
        })?;

    let payload = if body_len as u64 > max_plain_data_size {
        if data_type != DataType::Files {
            return Err(ProtocolError::OversizeFrame);
        }
        let spooled = crate::spool::Spooled::spool_copy(reader, body_len)
            .await
            .map_err(|_| ProtocolError::DataLengthMismatch {
                declared: data_length,
                actual: consumed as u32,
            })?;
        spooled
            .into_bytes()
            .await
            .map_err(|_| ProtocolError::DataLengthMismatch {
                declared: data_length,
                actual: consumed as u32,
            })?
    } else {
        Bytes::from(reader.read_exact(body_len).await.map_err(|_| {
            ProtocolError::DataLengthMismatch {
                declared: data_length,
                actual: consumed as u32,
            }
        })?)
    };

    let headers = MessageHeaders::parse(&raw_headers)?;
    Ok((headers, payload))
}

impl RequestFrame {
    /// Receives the fixed header + body of a `Request` frame (type_id 0x00).
    pub async fn receive<R: AsyncRead + Unpin>(
        reader: &mut FrameReader<R>,
        max_plain_data_size: u64,
    ) -> Result<Self, ProtocolError> {
        let handler_id = reader.read_u16().await.map_err(io_to_protocol)?;
        let message_id = reader.read_u16().await.map_err(io_to_protocol)?;
        let send_time = reader.read_u64().await.map_err(io_to_protocol)?;
        let data_type = reader.read_u8().await.map_err(io_to_protocol)?;
        let compression = reader.read_u8().await.map_err(io_to_protocol)?;
        let data_length = reader.read_u32().await.map_err(io_to_protocol)?;

        let data_type =
            DataType::from_u8(data_type).ok_or(ProtocolError::UnknownDataType(data_type))?;
        let compression = Compression::from_u8(compression)
            .ok_or(ProtocolError::UnknownCompression(compression))?;

        let (headers, payload) =
            read_fixed_body(reader, data_length, data_type, max_plain_data_size).await?;
        Ok(Self {
            handler_id,
            message_id,
            send_time,
            data_type,
            compression,
            headers,
            payload,
        })
    }
}

impl InputRequestFrame {
    /// Receives the fixed header + body of an `InputRequest` frame
    /// (type_id 0x02): message_id, data_type, compression, data_length,
    /// headers, payload. No `handler_id`, and unlike `Request` no
    /// `send_time` on the wire either.
    pub async fn receive<R: AsyncRead + Unpin>(
        reader: &mut FrameReader<R>,
        max_plain_data_size: u64,
    ) -> Result<Self, ProtocolError> {
        let message_id = reader.read_u16().await.map_err(io_to_protocol)?;
        let data_type = reader.read_u8().await.map_err(io_to_protocol)?;
        let compression = reader.read_u8().await.map_err(io_to_protocol)?;
        let data_length = reader.read_u32().await.map_err(io_to_protocol)?;

        let data_type =
            DataType::from_u8(data_type).ok_or(ProtocolError::UnknownDataType(data_type))?;
        let compression = Compression::from_u8(compression)
            .ok_or(ProtocolError::UnknownCompression(compression))?;

        let (headers, payload) =
            read_fixed_body(reader, data_length, data_type, max_plain_data_size).await?;
        Ok(Self {
            message_id,
            data_type,
            compression,
            headers,
            payload,
        })
    }
}

/// Reads a streamed body: length-prefixed chunks terminated by a
/// zero-length chunk. Compression applies per chunk, not to the header
/// bytes; the first chunk is `headers ∥ \x00\x00 ∥ compress(chunk0)`
/// (spec.md §4.1, §8 scenario 5).
async fn read_stream_body<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    compression: Compression,
) -> Result<(MessageHeaders, Bytes), ProtocolError> {
    let mut payload = Vec::new();
    let mut headers: Option<MessageHeaders> = None;
    loop {
        let len = reader.read_u32().await.map_err(io_to_protocol)? as usize;
        if len == 0 {
            break;
        }
        let raw = reader.read_exact(len).await.map_err(io_to_protocol)?;
        if headers.is_none() {
            let sep = find_subslice(&raw, b"\x00\x00")
                .ok_or(ProtocolError::HeaderSeparatorNotFound { max: raw.len() })?;
            let (header_bytes, rest) = raw.split_at(sep);
            headers = Some(MessageHeaders::parse(header_bytes)?);
            payload.extend_from_slice(&decompress_chunk(&rest[2..], compression)?);
        } else {
            payload.extend_from_slice(&decompress_chunk(&raw, compression)?);
        }
    }
    Ok((headers.unwrap_or_default(), Bytes::from(payload)))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decompress_chunk(data: &[u8], compression: Compression) -> Result<Vec<u8>, ProtocolError> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(ProtocolError::StreamGzip)?;
            Ok(out)
        }
    }
}

fn compress_chunk(data: &[u8], compression: Compression) -> Vec<u8> {
    match compression {
        Compression::None => data.to_vec(),
        Compression::Gzip => {
            use std::io::Write;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).expect("gzip encode into Vec cannot fail");
            encoder.finish().expect("gzip encode into Vec cannot fail")
        }
    }
}

impl RequestFrame {
    /// Receives the header + reassembled body of a `StreamRequest` frame
    /// (type_id 0x01): same fixed header as `Request` minus `data_length`.
    pub async fn receive_stream<R: AsyncRead + Unpin>(
        reader: &mut FrameReader<R>,
    ) -> Result<Self, ProtocolError> {
        // StreamRequest's body is chunk-bounded by `read_stream_body`, not
        // a single declared `data_length`, so there's no fixed-body cap to
        // enforce here.
        let handler_id = reader.read_u16().await.map_err(io_to_protocol)?;
        let message_id = reader.read_u16().await.map_err(io_to_protocol)?;
        let send_time = reader.read_u64().await.map_err(io_to_protocol)?;
        let data_type = reader.read_u8().await.map_err(io_to_protocol)?;
        let compression = reader.read_u8().await.map_err(io_to_protocol)?;

        let data_type =
            DataType::from_u8(data_type).ok_or(ProtocolError::UnknownDataType(data_type))?;
        let compression = Compression::from_u8(compression)
            .ok_or(ProtocolError::UnknownCompression(compression))?;

        let (headers, payload) = read_stream_body(reader, compression).await?;
        Ok(Self {
            handler_id,
            message_id,
            send_time,
            data_type,
            compression,
            headers,
            payload,
        })
    }
}

impl InboundFrame {
    /// Reads the one-byte type tag and dispatches to the matching frame
    /// family's receive procedure (spec.md §2 "Data flow").
    pub async fn read<R: AsyncRead + Unpin>(
        reader: &mut FrameReader<R>,
        max_plain_data_size: u64,
    ) -> Result<Self, ProtocolError> {
        let type_byte = reader.read_u8().await.map_err(io_to_protocol)?;
        match FrameType::from_u8(type_byte)? {
            FrameType::Request => Ok(Self::Request(
                RequestFrame::receive(reader, max_plain_data_size).await?,
            )),
            FrameType::StreamRequest => Ok(Self::StreamRequest(
                RequestFrame::receive_stream(reader).await?,
            )),
            FrameType::InputRequest => Ok(Self::InputRequest(
                InputRequestFrame::receive(reader, max_plain_data_size).await?,
            )),
            FrameType::DownloadSpeed => {
                let speed = reader.read_u32().await.map_err(io_to_protocol)?;
                if speed != 0 && !(MIN_DOWNLOAD_SPEED..=MAX_DOWNLOAD_SPEED).contains(&speed) {
                    return Err(ProtocolError::InvalidDownloadSpeed(speed));
                }
                Ok(Self::DownloadSpeed(speed))
            }
            FrameType::CancelInput => Ok(Self::CancelInput(
                reader.read_u16().await.map_err(io_to_protocol)?,
            )),
            FrameType::Ping => Ok(Self::Ping(reader.read_u64().await.map_err(io_to_protocol)?)),
        }
    }
}

/// Writes a `Request` frame (type_id 0x00): handler_id, message_id,
/// send_time, data_type, compression, data_length, headers, payload.
pub async fn write_fixed_frame<W: AsyncWrite + Unpin>(
    writer: &mut FrameWriter<W>,
    frame_type: FrameType,
    handler_id: u16,
    message_id: u16,
    send_time: u64,
    data_type: DataType,
    compression: Compression,
    headers: &MessageHeaders,
    payload: &[u8],
) -> std::io::Result<()> {
    writer.write_u8(frame_type as u8).await?;
    writer.write_u16(handler_id).await?;
    writer.write_u16(message_id).await?;
    writer.write_u64(send_time).await?;
    writer.write_u8(data_type as u8).await?;
    writer.write_u8(compression as u8).await?;
    let header_bytes = headers.to_bytes();
    let data_length = (header_bytes.len() + 2 + payload.len()) as u32;
    writer.write_u32(data_length).await?;
    writer.write_all(&header_bytes).await?;
    writer.write_all(b"\x00\x00").await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Writes an `InputRequest` prompt frame (type_id 0x02): message_id,
/// data_type, compression, data_length, headers, payload. No `handler_id`
/// and, unlike `Request`, no `send_time` on the wire (spec.md §3).
pub async fn write_input_request_frame<W: AsyncWrite + Unpin>(
    writer: &mut FrameWriter<W>,
    message_id: u16,
    data_type: DataType,
    compression: Compression,
    headers: &MessageHeaders,
    payload: &[u8],
) -> std::io::Result<()> {
    writer.write_u8(FrameType::InputRequest as u8).await?;
    writer.write_u16(message_id).await?;
    writer.write_u8(data_type as u8).await?;
    writer.write_u8(compression as u8).await?;
    let header_bytes = headers.to_bytes();
    let data_length = (header_bytes.len() + 2 + payload.len()) as u32;
    writer.write_u32(data_length).await?;
    writer.write_all(&header_bytes).await?;
    writer.write_all(b"\x00\x00").await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Writes a streamed body: the first chunk carries `headers ∥ \x00\x00 ∥
/// compress(chunk0)`; later chunks carry `compress(chunk_i)`; a
/// zero-length chunk terminates (spec.md §8 scenario 5).
pub async fn write_stream_frame<W: AsyncWrite + Unpin>(
    writer: &mut FrameWriter<W>,
    handler_id: Option<u16>,
    message_id: u16,
    send_time: u64,
    data_type: DataType,
    compression: Compression,
    headers: &MessageHeaders,
    mut chunks: impl futures_util::Stream<Item = Bytes> + Unpin,
) -> std::io::Result<()> {
    use futures_util::StreamExt;

    writer.write_u8(FrameType::StreamRequest as u8).await?;
    if let Some(handler_id) = handler_id {
        writer.write_u16(handler_id).await?;
    }
    writer.write_u16(message_id).await?;
    writer.write_u64(send_time).await?;
    writer.write_u8(data_type as u8).await?;
    writer.write_u8(compression as u8).await?;

    let header_bytes = headers.to_bytes();
    let mut wrote_header = false;
    while let Some(chunk) = chunks.next().await {
        let mut raw = Vec::new();
        if !wrote_header {
            raw.extend_from_slice(&header_bytes);
            raw.extend_from_slice(b"\x00\x00");
            wrote_header = true;
        }
        raw.extend_from_slice(&compress_chunk(&chunk, compression));
        writer.write_u32(raw.len() as u32).await?;
        writer.write_all(&raw).await?;
    }
    if !wrote_header {
        let mut raw = header_bytes;
        raw.extend_from_slice(b"\x00\x00");
        writer.write_u32(raw.len() as u32).await?;
        writer.write_all(&raw).await?;
    }
    writer.write_u32(0).await?;
    writer.flush().await
}

pub async fn write_ping<W: AsyncWrite + Unpin>(
    writer: &mut FrameWriter<W>,
    timestamp: u64,
) -> std::io::Result<()> {
    writer.write_u8(FrameType::Ping as u8).await?;
    writer.write_u64(timestamp).await?;
    writer.flush().await
}

fn io_to_protocol(_e: std::io::Error) -> ProtocolError {
    ProtocolError::ConnectionClosed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_headers_with_raw_nul() {
        let raw = b"{\"a\":1}\x00extra";
        assert!(matches!(
            MessageHeaders::parse(raw),
            Err(ProtocolError::HeaderContainsNul)
        ));
    }

    #[test]
    fn offset_and_status_roundtrip() {
        let mut h = MessageHeaders::new();
        h.set_offset(42);
        h.set_status(404);
        assert_eq!(h.offset(), Some(42));
        assert_eq!(h.status(), 404);
    }

    #[test]
    fn status_defaults_to_200() {
        let h = MessageHeaders::new();
        assert_eq!(h.status(), 200);
    }

    #[tokio::test]
    async fn reads_json_echo_scenario() {
        // spec.md ยง8 scenario 1, without the fixed 10-byte frame-type/len
        // preamble (that belongs to the connection read loop).
        let mut wire = Vec::new();
        wire.extend_from_slice(&0u16.to_be_bytes()); // handler_id
        wire.extend_from_slice(&513u16.to_be_bytes()); // message_id
        wire.extend_from_slice(&1608552317314u64.to_be_bytes()); // send_time
        wire.push(1); // data_type = JSON
        wire.push(0); // compression = none
        let body = b"{}\x00\x00{\"access_token\":\"abcdef\"}";
        wire.extend_from_slice(&(body.len() as u32).to_be_bytes());
        wire.extend_from_slice(body);

        let mut reader = FrameReader::new(&wire[..]);
        let frame = RequestFrame::receive(&mut reader, 16 * 1024 * 1024).await.unwrap();
        assert_eq!(frame.handler_id, 0);
        assert_eq!(frame.message_id, 513);
        assert_eq!(frame.data_type, DataType::Json);
        assert_eq!(&frame.payload[..], b"{\"access_token\":\"abcdef\"}");
    }

    #[tokio::test]
    async fn write_fixed_frame_matches_json_echo_response_shape() {
        // spec.md §8 scenario 1's reply.
        let mut buf = Vec::new();
        {
            let mut writer = crate::frame::writer::FrameWriter::new(&mut buf);
            let headers = MessageHeaders::new();
            write_fixed_frame(
                &mut writer,
                FrameType::Request,
                0,
                513,
                1_608_552_317_914,
                DataType::Json,
                Compression::None,
                &headers,
                b"{\"success\":true}",
            )
            .await
            .unwrap();
        }
        assert_eq!(buf[0], 0x00);
        assert_eq!(u16::from_be_bytes([buf[1], buf[2]]), 0);
        assert_eq!(u16::from_be_bytes([buf[3], buf[4]]), 513);
        assert_eq!(&buf[buf.len() - 17..], b"{\"success\":true}");
    }

    #[tokio::test]
    async fn stream_roundtrip_with_gzip() {
        use futures_util::stream;

        let mut buf = Vec::new();
        let headers = MessageHeaders::new();
        {
            let mut writer = crate::frame::writer::FrameWriter::new(&mut buf);
            let chunks = stream::iter(
                vec!["hel", "lo wo", "rld!"]
                    .into_iter()
                    .map(|s| Bytes::from_static(s.as_bytes())),
            );
            write_stream_frame(
                &mut writer,
                Some(1),
                2,
                0,
                DataType::Binary,
                Compression::Gzip,
                &headers,
                chunks,
            )
            .await
            .unwrap();
        }

        let mut reader = FrameReader::new(&buf[..]);
        let frame_type = reader.read_u8().await.unwrap();
        assert_eq!(frame_type, FrameType::StreamRequest as u8);
        let frame = RequestFrame::receive_stream(&mut reader).await.unwrap();
        assert_eq!(frame.handler_id, 1);
        assert_eq!(frame.message_id, 2);
        assert_eq!(&frame.payload[..], b"hello world!");
    }

    #[tokio::test]
    async fn input_request_frame_has_no_send_time_on_the_wire() {
        let mut buf = Vec::new();
        {
            let mut writer = crate::frame::writer::FrameWriter::new(&mut buf);
            write_input_request_frame(
                &mut writer,
                7,
                DataType::Binary,
                Compression::None,
                &MessageHeaders::new(),
                b"name?",
            )
            .await
            .unwrap();
        }
        // type(1) + message_id(2) + data_type(1) + compression(1) +
        // data_length(4) + headers("{}", 2) + sep(2) + payload(5).
        assert_eq!(buf.len(), 1 + 2 + 1 + 1 + 4 + 2 + 2 + 5);

        let mut reader = FrameReader::new(&buf[..]);
        let frame_type = reader.read_u8().await.unwrap();
        assert_eq!(frame_type, FrameType::InputRequest as u8);
        let frame = InputRequestFrame::receive(&mut reader, 16 * 1024 * 1024)
            .await
            .unwrap();
        assert_eq!(frame.message_id, 7);
        assert_eq!(&frame.payload[..], b"name?");
    }

    #[tokio::test]
    async fn oversize_non_files_body_is_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&0u16.to_be_bytes()); // handler_id
        wire.extend_from_slice(&1u16.to_be_bytes()); // message_id
        wire.extend_from_slice(&0u64.to_be_bytes()); // send_time
        wire.push(DataType::Binary as u8);
        wire.push(Compression::None as u8);
        let body = [0u8; 64];
        let mut full_body = b"{}\x00\x00".to_vec();
        full_body.extend_from_slice(&body);
        wire.extend_from_slice(&(full_body.len() as u32).to_be_bytes());
        wire.extend_from_slice(&full_body);

        let mut reader = FrameReader::new(&wire[..]);
        let err = RequestFrame::receive(&mut reader, 16).await.unwrap_err();
        assert!(matches!(err, ProtocolError::OversizeFrame));
    }

    #[tokio::test]
    async fn oversize_files_body_is_spooled_not_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&0u16.to_be_bytes()); // handler_id
        wire.extend_from_slice(&1u16.to_be_bytes()); // message_id
        wire.extend_from_slice(&0u64.to_be_bytes()); // send_time
        wire.push(DataType::Files as u8);
        wire.push(Compression::None as u8);
        let body = vec![9u8; 64];
        let mut full_body = b"{}\x00\x00".to_vec();
        full_body.extend_from_slice(&body);
        wire.extend_from_slice(&(full_body.len() as u32).to_be_bytes());
        wire.extend_from_slice(&full_body);

        let mut reader = FrameReader::new(&wire[..]);
        let frame = RequestFrame::receive(&mut reader, 16).await.unwrap();
        assert_eq!(&frame.payload[..], &body[..]);
    }
}
