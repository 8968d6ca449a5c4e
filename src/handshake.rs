//! Pluggable connection handshake (spec.md §4.5).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::error::HandshakeError;
use crate::frame::FrameReader;
use crate::frame::FrameWriter;

/// Performs an opening exchange before the connection enters its message
/// loop. Implementors read/write directly off the raw stream halves.
#[async_trait]
pub trait Handshake<R, W>: Send + Sync
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn perform(
        &self,
        reader: &mut FrameReader<R>,
        writer: &mut FrameWriter<W>,
    ) -> Result<(), HandshakeError>;
}

/// Bundled handshake: peer sends a 64-byte hex SHA-256 digest over
/// `secret ∥ ascii(time_bucket + 10·offset)` for `offset` in
/// `[-valid_window, valid_window]`; any match is accepted. Pins the later
/// byte-reply revision: `0x01` on accept, `0x00` then close on reject.
pub struct Sha256TimeHandshake {
    secret: Vec<u8>,
    valid_window: i64,
    timeout: Duration,
}

impl Sha256TimeHandshake {
    pub fn new(secret: impl Into<Vec<u8>>, valid_window: i64, timeout: Duration) -> Self {
        Self {
            secret: secret.into(),
            valid_window,
            timeout,
        }
    }

    fn accepted_digests(&self, now: u64) -> Vec<String> {
        let time_bucket = (now / 10) * 10;
        (-self.valid_window..=self.valid_window)
            .map(|offset| {
                let bucket = time_bucket as i64 + 10 * offset;
                let mut hasher = Sha256::new();
                hasher.update(&self.secret);
                hasher.update(bucket.to_string().as_bytes());
                hex::encode(hasher.finalize())
            })
            .collect()
    }
}

#[async_trait]
impl<R, W> Handshake<R, W> for Sha256TimeHandshake
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn perform(
        &self,
        reader: &mut FrameReader<R>,
        writer: &mut FrameWriter<W>,
    ) -> Result<(), HandshakeError> {
        timeout(self.timeout, self.perform_inner(reader, writer))
            .await
            .map_err(|_| HandshakeError::Timeout)?
    }
}

impl Sha256TimeHandshake {
    async fn perform_inner<R, W>(
        &self,
        reader: &mut FrameReader<R>,
        writer: &mut FrameWriter<W>,
    ) -> Result<(), HandshakeError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let digest_bytes = reader
            .read_exact(64)
            .await
            .map_err(|_| HandshakeError::MalformedChallenge)?;
        let peer_digest =
            std::str::from_utf8(&digest_bytes).map_err(|_| HandshakeError::MalformedChallenge)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_secs();

        let accepted = self.accepted_digests(now);
        let ok = accepted
            .iter()
            .any(|candidate| constant_time_eq(candidate.as_bytes(), peer_digest.as_bytes()));

        if ok {
            writer.write_u8(0x01).await.map_err(HandshakeError::Io)?;
            writer.flush().await.map_err(HandshakeError::Io)?;
            Ok(())
        } else {
            let _ = writer.write_u8(0x00).await;
            let _ = writer.flush().await;
            Err(HandshakeError::Mismatch)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn digest_for(secret: &[u8], bucket: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.update(bucket.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    #[tokio::test]
    async fn accepts_matching_digest_within_window() {
        let secret = b"s3cr3t".to_vec();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let bucket = (now / 10) * 10;
        let digest = digest_for(&secret, bucket as i64);

        let (client, server) = duplex(128);
        let (client_r, mut client_w) = tokio::io::split(client);
        let (server_r, server_w) = tokio::io::split(server);

        let hs = Sha256TimeHandshake::new(secret, 1, Duration::from_secs(1));
        let mut reader = FrameReader::new(server_r);
        let mut writer = FrameWriter::new(server_w);

        let send = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            client_w.write_all(digest.as_bytes()).await.unwrap();
        });

        let result = hs.perform(&mut reader, &mut writer).await;
        send.await.unwrap();
        assert!(result.is_ok());

        let mut client_reader = FrameReader::new(client_r);
        let reply = client_reader.read_u8().await.unwrap();
        assert_eq!(reply, 0x01);
    }

    #[tokio::test]
    async fn times_out_when_peer_sends_nothing() {
        let secret = b"s3cr3t".to_vec();
        let (_client, server) = duplex(128);
        let (server_r, server_w) = tokio::io::split(server);

        let hs = Sha256TimeHandshake::new(secret, 1, Duration::from_millis(20));
        let mut reader = FrameReader::new(server_r);
        let mut writer = FrameWriter::new(server_w);

        let result = hs.perform(&mut reader, &mut writer).await;
        assert!(matches!(result, Err(HandshakeError::Timeout)));
    }

    #[tokio::test]
    async fn rejects_wrong_digest() {
        let secret = b"s3cr3t".to_vec();
        let (client, server) = duplex(128);
        let (_client_r, mut client_w) = tokio::io::split(client);
        let (server_r, server_w) = tokio::io::split(server);

        let hs = Sha256TimeHandshake::new(secret, 1, Duration::from_secs(1));
        let mut reader = FrameReader::new(server_r);
        let mut writer = FrameWriter::new(server_w);

        let send = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            client_w.write_all(&[b'0'; 64]).await.unwrap();
        });

        let result = hs.perform(&mut reader, &mut writer).await;
        send.await.unwrap();
        assert!(matches!(result, Err(HandshakeError::Mismatch)));
    }
}
