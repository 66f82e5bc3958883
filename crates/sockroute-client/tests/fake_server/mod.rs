//! Scripted server side for client tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]
#![cfg(unix)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use sockroute_client::ClientOptions;
use sockroute_core::protocol::{Delimiter, FrameBuffer};

pub struct FakeServer {
    listener: UnixListener,
    path: PathBuf,
    delimiter: Delimiter,
    _dir: TempDir,
}

impl FakeServer {
    pub fn bind() -> Self {
        Self::with_delimiter(Delimiter::default())
    }

    pub fn with_delimiter(delimiter: Delimiter) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.sock");
        let listener = UnixListener::bind(&path).unwrap();
        Self {
            listener,
            path,
            delimiter,
            _dir: dir,
        }
    }

    pub fn options(&self) -> ClientOptions {
        ClientOptions::new(self.path.clone()).delimiter(self.delimiter.as_char().to_string())
    }

    pub async fn accept(&self) -> FakePeer {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(2), self.listener.accept())
            .await
            .expect("client never connected")
            .unwrap();
        FakePeer {
            stream,
            frames: FrameBuffer::new(self.delimiter),
            ready: VecDeque::new(),
            delimiter: self.delimiter,
        }
    }
}

pub struct FakePeer {
    stream: UnixStream,
    frames: FrameBuffer,
    ready: VecDeque<Vec<u8>>,
    delimiter: Delimiter,
}

impl FakePeer {
    /// Next request written by the client; panics after two seconds.
    pub async fn recv(&mut self) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(frame) = self.ready.pop_front() {
                    return frame;
                }
                let n = self.stream.read_buf(self.frames.buf_mut()).await.unwrap();
                assert!(n > 0, "client closed before sending a frame");
                self.ready
                    .extend(self.frames.drain_frames().into_iter().map(|f| f.to_vec()));
            }
        })
        .await
        .expect("timed out waiting for a request");
        serde_json::from_slice(&frame).unwrap()
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.write_all(self.delimiter.as_bytes()).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn send(&mut self, message: &Value) {
        let text = serde_json::to_vec(message).unwrap();
        self.send_raw(&text).await;
    }

    /// Answer `request` with `body`.
    pub async fn reply(&mut self, request: &Value, is_error: bool, body: Value) {
        let response = json!({
            "metadata": {
                "id": request["metadata"]["id"],
                "category": request["metadata"]["category"],
                "isError": is_error,
            },
            "payload": { "headers": {}, "body": body },
        });
        self.send(&response).await;
    }

    pub async fn broadcast(&mut self, channel: &str, data: Value) {
        let message = json!({
            "metadata": { "category": "broadcast", "channel": channel },
            "payload": data,
        });
        self.send(&message).await;
    }

    /// True once the client has closed its side.
    pub async fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 64];
        matches!(
            tokio::time::timeout(Duration::from_secs(2), self.stream.read(&mut buf)).await,
            Ok(Ok(0))
        )
    }

    /// Read until the client closes, returning how many bytes arrived.
    pub async fn read_to_end(&mut self) -> usize {
        let mut sink = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), self.stream.read_to_end(&mut sink))
            .await
            .expect("client never closed")
            .unwrap();
        sink.len()
    }

    pub async fn end(mut self) {
        self.stream.shutdown().await.unwrap();
    }
}
