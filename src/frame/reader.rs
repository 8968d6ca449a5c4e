//! Async frame reader: primitive reads over the wire, big-endian throughout.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Chunk size for `copy_exact`, so a large body never sits fully in memory
/// during the socket-to-disk copy.
const COPY_CHUNK: usize = 64 * 1024;

/// Reads fixed-width integers and delimited byte runs from an async stream.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub async fn read_exact(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf).await?;
        Ok(buf)
    }

    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        self.inner.read_u8().await
    }

    pub async fn read_u16(&mut self) -> std::io::Result<u16> {
        self.inner.read_u16().await
    }

    pub async fn read_u32(&mut self) -> std::io::Result<u32> {
        self.inner.read_u32().await
    }

    pub async fn read_u64(&mut self) -> std::io::Result<u64> {
        self.inner.read_u64().await
    }

    /// Reads bytes one at a time until `sep` is seen, or `max` bytes have
    /// been consumed without finding it. The separator is NOT included in
    /// the returned buffer.
    pub async fn read_until(
        &mut self,
        sep: &[u8],
        max: usize,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        loop {
            if buf.len() >= max {
                return Err(ProtocolError::HeaderSeparatorNotFound { max });
            }
            let byte = self
                .inner
                .read_u8()
                .await
                .map_err(|_| ProtocolError::HeaderSeparatorNotFound { max })?;
            buf.push(byte);
            if buf.len() >= sep.len() && &buf[buf.len() - sep.len()..] == sep {
                buf.truncate(buf.len() - sep.len());
                return Ok(buf);
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Copies exactly `n` bytes straight into `dest`, `COPY_CHUNK` bytes at
    /// a time, so a large spooled body never requires one huge up-front
    /// allocation the way `read_exact` would.
    pub async fn copy_exact<W: AsyncWrite + Unpin>(
        &mut self,
        mut n: usize,
        dest: &mut W,
    ) -> std::io::Result<()> {
        let mut buf = [0u8; COPY_CHUNK];
        while n > 0 {
            let take = n.min(buf.len());
            self.inner.read_exact(&mut buf[..take]).await?;
            dest.write_all(&buf[..take]).await?;
            n -= take;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_fixed_width_integers_big_endian() {
        let data: &[u8] = &[0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03];
        let mut r = FrameReader::new(data);
        assert_eq!(r.read_u16().await.unwrap(), 1);
        assert_eq!(r.read_u16().await.unwrap(), 2);
        assert_eq!(r.read_u32().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn read_until_strips_separator() {
        let data: &[u8] = b"hello\x00\x00world";
        let mut r = FrameReader::new(data);
        let head = r.read_until(b"\x00\x00", 64).await.unwrap();
        assert_eq!(head, b"hello");
        let rest = r.read_exact(5).await.unwrap();
        assert_eq!(rest, b"world");
    }

    #[tokio::test]
    async fn read_until_enforces_max() {
        let data: &[u8] = b"no-separator-present-at-all";
        let mut r = FrameReader::new(data);
        let err = r.read_until(b"\x00\x00", 8).await.unwrap_err();
        assert!(matches!(err, ProtocolError::HeaderSeparatorNotFound { max: 8 }));
    }
}
