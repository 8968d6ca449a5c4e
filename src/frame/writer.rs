//! Async frame writer with advisory download-rate limiting.
//!
//! All outbound writes for a connection serialize through one `FrameWriter`
//! guarded by the connection's write mutex, so chunked/streamed sends stay
//! contiguous on the wire (spec.md ยง4.1, ยง4.3 "Write mutex").

use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::sleep;

/// Bytes/sec bounds for `DownloadSpeed` (spec.md ยง3).
pub const MIN_DOWNLOAD_SPEED: u32 = 1024;
pub const MAX_DOWNLOAD_SPEED: u32 = 33_554_432;

/// Tracks a rolling 1-second window of emitted bytes and sleeps to stay
/// under the configured limit. `0` means unlimited.
struct RateLimiter {
    limit: u32,
    window_start: Instant,
    emitted_in_window: u64,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            window_start: Instant::now(),
            emitted_in_window: 0,
        }
    }

    fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
        self.window_start = Instant::now();
        self.emitted_in_window = 0;
    }

    async fn throttle(&mut self, about_to_write: usize) {
        if self.limit == 0 {
            return;
        }
        let now = Instant::now();
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.emitted_in_window = 0;
        }
        if self.emitted_in_window + about_to_write as u64 > self.limit as u64 {
            let remaining = Duration::from_secs(1) - now.duration_since(self.window_start);
            if !remaining.is_zero() {
                sleep(remaining).await;
            }
            self.window_start = Instant::now();
            self.emitted_in_window = 0;
        }
        self.emitted_in_window += about_to_write as u64;
    }
}

/// Writes fixed-width integers and raw bytes to the wire, big-endian
/// throughout, pacing itself against the configured download speed.
pub struct FrameWriter<W> {
    inner: W,
    limiter: RateLimiter,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            limiter: RateLimiter::new(0),
        }
    }

    /// Update the advisory download speed. `0` disables throttling.
    pub fn set_download_speed(&mut self, bytes_per_sec: u32) {
        self.limiter.set_limit(bytes_per_sec);
    }

    pub async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.limiter.throttle(data.len()).await;
        self.inner.write_all(data).await
    }

    pub async fn write_u8(&mut self, v: u8) -> std::io::Result<()> {
        self.write_all(&[v]).await
    }

    pub async fn write_u16(&mut self, v: u16) -> std::io::Result<()> {
        self.write_all(&v.to_be_bytes()).await
    }

    pub async fn write_u32(&mut self, v: u32) -> std::io::Result<()> {
        self.write_all(&v.to_be_bytes()).await
    }

    pub async fn write_u64(&mut self, v: u64) -> std::io::Result<()> {
        self.write_all(&v.to_be_bytes()).await
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_big_endian_integers() {
        let mut buf = Vec::new();
        {
            let mut w = FrameWriter::new(&mut buf);
            w.write_u16(1).await.unwrap();
            w.write_u32(2).await.unwrap();
        }
        assert_eq!(buf, vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x02]);
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_when_limit_exceeded() {
        let mut buf = Vec::new();
        let mut w = FrameWriter::new(&mut buf);
        w.set_download_speed(1024);

        let start = tokio::time::Instant::now();
        // First write fits in the window; second forces a sleep into the
        // next window.
        w.write_all(&vec![0u8; 900]).await.unwrap();
        w.write_all(&vec![0u8; 900]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_when_zero() {
        let mut buf = Vec::new();
        let mut w = FrameWriter::new(&mut buf);
        w.set_download_speed(0);
        let start = tokio::time::Instant::now();
        w.write_all(&vec![0u8; 1_000_000]).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
