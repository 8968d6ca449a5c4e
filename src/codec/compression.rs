//! Whole-payload and per-chunk gzip (spec.md §4.2), grounded on the
//! blocking `flate2::read::GzDecoder`/`GzEncoder` idiom used throughout the
//! teacher crate (tunnel/stream_handler.rs, proxy/delegate.rs).

use bytes::Bytes;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression as GzLevel;
use std::io::Read;

use crate::error::CodecError;
use crate::frame::Compression;

pub fn compress(data: &[u8], compression: Compression) -> Result<Bytes, CodecError> {
    match compression {
        Compression::None => Ok(Bytes::copy_from_slice(data)),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(data, GzLevel::default());
            let mut out = Vec::new();
            encoder.read_to_end(&mut out).map_err(CodecError::Gzip)?;
            Ok(Bytes::from(out))
        }
    }
}

pub fn decompress(data: &[u8], compression: Compression) -> Result<Bytes, CodecError> {
    match compression {
        Compression::None => Ok(Bytes::copy_from_slice(data)),
        Compression::Gzip => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(CodecError::Gzip)?;
            Ok(Bytes::from(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_roundtrip() {
        let data = b"hello world, hello world, hello world";
        let compressed = compress(data, Compression::Gzip).unwrap();
        assert_ne!(&compressed[..], &data[..]);
        let restored = decompress(&compressed, Compression::Gzip).unwrap();
        assert_eq!(&restored[..], &data[..]);
    }

    #[test]
    fn none_is_identity() {
        let data = b"passthrough";
        assert_eq!(&compress(data, Compression::None).unwrap()[..], &data[..]);
        assert_eq!(&decompress(data, Compression::None).unwrap()[..], &data[..]);
    }
}
