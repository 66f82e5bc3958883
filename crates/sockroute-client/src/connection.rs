//! Request/response correlation on top of one socket.
//!
//! A single driver task owns the socket. It:
//! - writes queued requests strictly in FIFO order, one at a time
//! - keeps the request being written reachable, so closing the client
//!   rejects it and abandons the write
//! - moves each written request into the awaiting map and arms its timeout
//! - reads frames and settles the matching request, or reports the frame as
//!   a broadcast / unhandled response / decode error
//! - on end or error, rejects everything still queued or awaiting
//!
//! Callers only touch the shared state under its lock and wake the driver
//! through a `Notify`.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, oneshot, watch, Notify};
use tokio::task::AbortHandle;

use sockroute_core::error::{ErrorCode, IpcError, Result};
use sockroute_core::protocol::{
    codec, CorrelatedResponse, Delimiter, FrameBuffer, GeneralResponsePayload, SocketRequest,
    SocketResponse,
};

use crate::types::ClientEvent;

const EVENT_CAPACITY: usize = 256;

pub(crate) type Reply = Result<GeneralResponsePayload>;

/// A request waiting in the send queue.
pub(crate) struct Query {
    pub id: String,
    pub request: SocketRequest,
    pub timeout: Option<Duration>,
    pub tx: oneshot::Sender<Reply>,
}

/// A written request waiting for its response.
struct Pending {
    tx: oneshot::Sender<Reply>,
    timer: Option<AbortHandle>,
}

impl Pending {
    fn settle(self, reply: Reply) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        let _ = self.tx.send(reply);
    }
}

#[derive(Default)]
struct State {
    queue: VecDeque<Query>,
    awaiting: HashMap<String, Pending>,
    /// The request whose frame is being written.
    in_flight: Option<(String, oneshot::Sender<Reply>)>,
    /// Set once; every later request fails with it.
    terminal: Option<IpcError>,
}

pub(crate) struct Shared {
    pub delimiter: Delimiter,
    next_id: AtomicU64,
    state: Mutex<State>,
    wake: Notify,
    /// Flips to `true` when the client becomes terminal.
    terminated: watch::Sender<bool>,
    events: broadcast::Sender<ClientEvent>,
}

impl Shared {
    pub fn new(delimiter: Delimiter) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (terminated, _) = watch::channel(false);
        Self {
            delimiter,
            next_id: AtomicU64::new(1),
            state: Mutex::new(State::default()),
            wake: Notify::new(),
            terminated,
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    pub fn terminal(&self) -> Option<IpcError> {
        self.state().terminal.clone()
    }

    /// Queue a request, failing right away once the client is terminal.
    pub fn enqueue(&self, query: Query) -> std::result::Result<(), (Query, IpcError)> {
        {
            let mut st = self.state();
            if let Some(err) = &st.terminal {
                return Err((query, err.clone()));
            }
            st.queue.push_back(query);
        }
        self.wake.notify_one();
        Ok(())
    }

    fn pop_query(&self) -> Option<Query> {
        let mut st = self.state();
        if st.terminal.is_some() {
            return None;
        }
        st.queue.pop_front()
    }

    /// Mark a query as being written. Fails it right away once terminal.
    fn begin_write(&self, id: String, tx: oneshot::Sender<Reply>) -> bool {
        let err = {
            let mut st = self.state();
            match st.terminal.clone() {
                None => {
                    st.in_flight = Some((id, tx));
                    return true;
                }
                Some(err) => err,
            }
        };
        let _ = tx.send(Err(err));
        false
    }

    /// The frame is out: move the in-flight query into the awaiting map and
    /// arm its timer.
    fn await_response(self: &Arc<Self>, timeout: Option<Duration>) {
        let mut st = self.state();
        // Taken by `terminate` meanwhile; already rejected.
        let Some((id, tx)) = st.in_flight.take() else {
            return;
        };
        let timer = timeout.map(|timeout| {
            let shared = Arc::downgrade(self);
            tokio::spawn(expire_after(shared, id.clone(), timeout)).abort_handle()
        });
        st.awaiting.insert(id, Pending { tx, timer });
    }

    /// The write failed: reject the in-flight query with `error`.
    fn fail_in_flight(&self, error: IpcError) {
        let in_flight = self.state().in_flight.take();
        if let Some((_, tx)) = in_flight {
            let _ = tx.send(Err(error));
        }
    }

    fn expire(&self, id: &str) {
        let pending = self.state().awaiting.remove(id);
        if let Some(pending) = pending {
            tracing::debug!(request_id = id, "request timed out");
            // The timer is this task; nothing left to abort.
            let _ = pending.tx.send(Err(IpcError::Timeout));
        }
    }

    /// Enter the terminal state and reject every queued and awaiting request.
    /// Only the first call has an effect.
    pub fn terminate(&self, error: IpcError) -> bool {
        let (queue, in_flight, awaiting) = {
            let mut st = self.state();
            if st.terminal.is_some() {
                return false;
            }
            st.terminal = Some(error.clone());
            (
                std::mem::take(&mut st.queue),
                st.in_flight.take(),
                std::mem::take(&mut st.awaiting),
            )
        };

        tracing::debug!(code = error.code(), queued = queue.len(), awaiting = awaiting.len(), "client terminated");
        for query in queue {
            let _ = query.tx.send(Err(error.clone()));
        }
        if let Some((_, tx)) = in_flight {
            let _ = tx.send(Err(error.clone()));
        }
        for (_, pending) in awaiting {
            pending.settle(Err(error.clone()));
        }

        self.terminated.send_replace(true);
        self.wake.notify_one();
        true
    }

    fn handle_frame(&self, frame: &[u8]) {
        let response = match codec::decode_response(frame) {
            Ok(r) => r,
            Err(e) => {
                let error = if e.code() == ErrorCode::InvalidJson.as_str() {
                    IpcError::protocol(
                        ErrorCode::InvalidResponseNotJson,
                        format!("Received a response that is not valid JSON: {e}"),
                    )
                } else {
                    e
                };
                tracing::debug!(error = %error, "dropping undecodable frame");
                self.emit(ClientEvent::Error(error));
                return;
            }
        };

        match response {
            SocketResponse::Broadcast(b) => self.emit(ClientEvent::Broadcast {
                channel: b.metadata.channel,
                data: b.payload,
            }),
            SocketResponse::Correlated(c) => self.settle(c),
        }
    }

    fn settle(&self, response: CorrelatedResponse) {
        let pending = self.state().awaiting.remove(&response.metadata.id);
        let Some(pending) = pending else {
            tracing::debug!(request_id = %response.metadata.id, "response for unknown request id");
            let error = IpcError::protocol(
                ErrorCode::InvalidResponseUnknownId,
                format!("No pending request with id {:?}", response.metadata.id),
            );
            self.emit(ClientEvent::UnhandledResponse { response, error });
            return;
        };

        let reply = if response.metadata.is_error {
            Err(IpcError::remote(response.payload))
        } else {
            Ok(response_payload(response.payload))
        };
        pending.settle(reply);
    }
}

fn response_payload(payload: Value) -> GeneralResponsePayload {
    match serde_json::from_value::<GeneralResponsePayload>(payload.clone()) {
        Ok(p) if payload.is_object() => p,
        _ => GeneralResponsePayload {
            headers: Map::new(),
            body: payload,
        },
    }
}

async fn expire_after(shared: Weak<Shared>, id: String, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if let Some(shared) = shared.upgrade() {
        shared.expire(&id);
    }
}

#[cfg(unix)]
async fn connect(path: &Path) -> std::io::Result<tokio::net::UnixStream> {
    tokio::net::UnixStream::connect(path).await
}

#[cfg(windows)]
async fn connect(path: &Path) -> std::io::Result<tokio::net::windows::named_pipe::NamedPipeClient> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}

/// Connect, then drive the socket until it ends or the client is closed.
pub(crate) async fn run(shared: Arc<Shared>, path: PathBuf) {
    let stream = match connect(&path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(socket_path = %path.display(), error = %e, "connect failed");
            let error = IpcError::transport(ErrorCode::SocketError, format!("connect failed: {e}"));
            shared.emit(ClientEvent::SocketError(error.clone()));
            shared.terminate(error);
            return;
        }
    };
    tracing::debug!(socket_path = %path.display(), "connected");
    drive(&shared, stream).await;
}

async fn drive<S>(shared: &Arc<Shared>, stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut frames = FrameBuffer::new(shared.delimiter);
    let mut terminated = shared.terminated.subscribe();

    loop {
        while let Some(query) = shared.pop_query() {
            let Query {
                id,
                request,
                timeout,
                tx,
            } = query;

            let frame = match codec::encode(&request, shared.delimiter) {
                Ok(f) => f,
                Err(e) => {
                    // Only this request fails; the queue keeps going.
                    let _ = tx.send(Err(e));
                    continue;
                }
            };
            if !shared.begin_write(id, tx) {
                break;
            }

            let written = tokio::select! {
                written = write_frame(&mut writer, &frame) => written,
                // Closed mid-write: drop the socket with the frame unfinished.
                _ = until_terminated(&mut terminated) => return,
            };

            if let Err(e) = written {
                let error = IpcError::transport(ErrorCode::SocketError, format!("write failed: {e}"));
                shared.fail_in_flight(error.clone());
                shared.emit(ClientEvent::SocketError(error.clone()));
                shared.terminate(error);
                return;
            }
            shared.await_response(timeout);
        }

        if shared.terminal().is_some() {
            break;
        }

        tokio::select! {
            _ = shared.wake.notified() => {}
            read = reader.read_buf(frames.buf_mut()) => match read {
                Ok(0) => {
                    shared.terminate(IpcError::transport(
                        ErrorCode::SocketEnded,
                        "the socket was ended by the server",
                    ));
                    break;
                }
                Ok(_) => {
                    for frame in frames.drain_frames() {
                        shared.handle_frame(&frame);
                    }
                }
                Err(e) => {
                    let error = IpcError::transport(ErrorCode::SocketError, format!("read failed: {e}"));
                    shared.emit(ClientEvent::SocketError(error.clone()));
                    shared.terminate(error);
                    break;
                }
            }
        }

        if shared.terminal().is_some() {
            break;
        }
    }

    // Dropping both halves destroys the socket.
    let _ = writer.shutdown().await;
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Resolves once the client is terminal.
async fn until_terminated(terminated: &mut watch::Receiver<bool>) {
    while !*terminated.borrow_and_update() {
        if terminated.changed().await.is_err() {
            return;
        }
    }
}
