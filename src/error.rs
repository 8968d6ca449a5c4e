//! Error taxonomy for the CATS protocol engine.
//!
//! Mirrors the recoverable-vs-terminal split from the protocol design:
//! protocol/handshake/IO errors close the connection, codec/handler errors
//! are reported in-band and the connection survives.

use thiserror::Error;

/// Malformed or out-of-protocol frames. Always terminal for the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown frame type: 0x{0:02x}")]
    UnknownFrameType(u8),
    #[error("message header blob is not valid UTF-8")]
    HeaderNotUtf8,
    #[error("message header blob contains a raw NUL byte")]
    HeaderContainsNul,
    #[error("message header exceeded {max} bytes without a separator")]
    HeaderSeparatorNotFound { max: usize },
    #[error("message headers are not a JSON object")]
    HeaderNotJsonObject,
    #[error("declared data_length {declared} does not match actual body size {actual}")]
    DataLengthMismatch { declared: u32, actual: u32 },
    #[error("unknown data_type: 0x{0:02x}")]
    UnknownDataType(u8),
    #[error("unknown compression id: 0x{0:02x}")]
    UnknownCompression(u8),
    #[error("unexpected InputRequest for message_id {0}: no pending input")]
    UnexpectedInputRequest(u16),
    #[error("concurrent top-level request: one is already in flight")]
    ConcurrentRequest,
    #[error("download speed {0} out of range (must be 0 or [1024, 33554432])")]
    InvalidDownloadSpeed(u32),
    #[error("frame body exceeded the configured maximum size")]
    OversizeFrame,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("idle timeout elapsed")]
    IdleTimeout,
    #[error("gzip decompression failed while reassembling a stream: {0}")]
    StreamGzip(std::io::Error),
}

/// Handshake failure modes. Always terminal.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake digest did not match any accepted time bucket")]
    Mismatch,
    #[error("handshake did not complete within the configured timeout")]
    Timeout,
    #[error("handshake peer sent malformed challenge bytes")]
    MalformedChallenge,
    #[error("handshake I/O failed: {0}")]
    Io(std::io::Error),
}

/// Codec-level failures. Reported in-band; the connection survives.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("FILES payload requires a `Files` header entry")]
    MissingFilesHeader,
    #[error("Files header declared {declared} bytes but payload had {actual}")]
    FilesLengthMismatch { declared: u64, actual: u64 },
    #[error("gzip (de)compression failed: {0}")]
    Gzip(std::io::Error),
    #[error("reading file for FILES codec failed: {0}")]
    FileIo(std::io::Error),
}

/// Top-level error type assembling the taxonomy above.
#[derive(Debug, Error)]
pub enum CatsError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatsError {
    /// Protocol/handshake/IO errors are terminal for the connection; codec
    /// errors are recoverable and reported in-band by the caller.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CatsError::Codec(_))
    }
}
