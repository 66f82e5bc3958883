//! Raw socket peer shared by the end-to-end tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]
#![cfg(unix)]

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use sockroute_core::protocol::{Delimiter, FrameBuffer};

/// Speaks the wire protocol byte by byte, without the client's checks.
pub struct RawPeer {
    stream: UnixStream,
    frames: FrameBuffer,
    ready: VecDeque<Bytes>,
}

impl RawPeer {
    pub async fn connect(path: &Path) -> Self {
        Self {
            stream: UnixStream::connect(path).await.expect("connect"),
            frames: FrameBuffer::new(Delimiter::default()),
            ready: VecDeque::new(),
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Send a JSON text followed by the default delimiter.
    pub async fn send_text(&mut self, text: &str) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0x0C);
        self.send_raw(&bytes).await;
    }

    /// Next decoded frame; panics after two seconds.
    pub async fn recv(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(2), self.recv_inner())
            .await
            .expect("timed out waiting for a frame")
    }

    async fn recv_inner(&mut self) -> Value {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return serde_json::from_slice(&frame).expect("frame is json");
            }
            let n = self.stream.read_buf(self.frames.buf_mut()).await.unwrap();
            assert!(n > 0, "peer closed before a frame arrived");
            self.ready.extend(self.frames.drain_frames());
        }
    }

    /// True when the server half-closed the connection.
    pub async fn is_ended(&mut self) -> bool {
        let mut buf = [0u8; 64];
        matches!(
            tokio::time::timeout(Duration::from_secs(2), self.stream.read(&mut buf)).await,
            Ok(Ok(0))
        )
    }
}
