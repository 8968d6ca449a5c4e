//! Spooling large payloads to disk instead of holding them in memory
//! (spec.md ยง4.1 "Large payloads ... MUST be spooled").
//!
//! `tempfile` is not a teacher dependency; it is pulled in from the wider
//! example pack (used by e.g. the rsync and llm_client example crates) for
//! exactly this purpose. See DESIGN.md.

use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// A payload that is either held in memory or spooled to a temp file,
/// deleted on drop regardless of how the connection that produced it exits.
pub enum Spooled {
    Memory(Bytes),
    File { handle: tokio::fs::File, _guard: NamedTempFile, len: u64 },
}

impl Spooled {
    pub fn memory(data: impl Into<Bytes>) -> Self {
        Self::Memory(data.into())
    }

    /// Spools `data` to a fresh temp file under the OS temp directory.
    pub async fn spool(data: &[u8]) -> std::io::Result<Self> {
        let named = NamedTempFile::new()?;
        let std_file = named.reopen()?;
        let mut handle = tokio::fs::File::from_std(std_file);
        handle.write_all(data).await?;
        handle.flush().await?;
        handle.seek(std::io::SeekFrom::Start(0)).await?;
        Ok(Self::File {
            handle,
            _guard: named,
            len: data.len() as u64,
        })
    }

    /// Spools exactly `len` bytes read directly off `reader` into a temp
    /// file, copying it in bounded chunks (see `FrameReader::copy_exact`)
    /// rather than buffering the whole body before writing it out — used
    /// for oversize `Files` bodies on receive (spec.md §4.1, §4.2).
    pub async fn spool_copy<R: tokio::io::AsyncRead + Unpin>(
        reader: &mut crate::frame::FrameReader<R>,
        len: usize,
    ) -> std::io::Result<Self> {
        let named = NamedTempFile::new()?;
        let std_file = named.reopen()?;
        let mut handle = tokio::fs::File::from_std(std_file);
        reader.copy_exact(len, &mut handle).await?;
        handle.flush().await?;
        handle.seek(std::io::SeekFrom::Start(0)).await?;
        Ok(Self::File {
            handle,
            _guard: named,
            len: len as u64,
        })
    }

    /// Spools if `data.len()` exceeds `threshold`, otherwise keeps it in
    /// memory.
    pub async fn from_bytes(data: Bytes, threshold: usize) -> std::io::Result<Self> {
        if data.len() > threshold {
            Self::spool(&data).await
        } else {
            Ok(Self::Memory(data))
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(b) => b.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the whole payload into memory (used by callers that need the
    /// bytes contiguously, e.g. small JSON bodies); spooled files are read
    /// back from disk.
    pub async fn into_bytes(self) -> std::io::Result<Bytes> {
        match self {
            Self::Memory(b) => Ok(b),
            Self::File { mut handle, .. } => {
                handle.seek(std::io::SeekFrom::Start(0)).await?;
                let mut buf = Vec::with_capacity(self_len(&handle).await.unwrap_or(0) as usize);
                handle.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

async fn self_len(handle: &tokio::fs::File) -> std::io::Result<u64> {
    Ok(handle.metadata().await?.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_roundtrip() {
        let s = Spooled::from_bytes(Bytes::from_static(b"hello"), 1024)
            .await
            .unwrap();
        assert!(matches!(s, Spooled::Memory(_)));
        assert_eq!(s.into_bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn spools_when_over_threshold() {
        let data = Bytes::from(vec![7u8; 4096]);
        let s = Spooled::from_bytes(data.clone(), 1024).await.unwrap();
        assert!(matches!(s, Spooled::File { .. }));
        assert_eq!(s.into_bytes().await.unwrap(), data);
    }
}
