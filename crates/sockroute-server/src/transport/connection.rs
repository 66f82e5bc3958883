//! Per-connection session: one reader loop and one writer task.
//!
//! Responsibilities:
//! - Register the connection and its outbound queue
//! - Reassemble delimiter-separated frames across reads
//! - Hand each complete frame to the server, in arrival order
//! - Write queued frames one at a time, half-closing when asked
//! - Forget the connection (and its subscriptions) on close or error

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tracing::Instrument;

use sockroute_core::error::IpcError;
use sockroute_core::protocol::FrameBuffer;

use crate::ipc::{ConnectionId, IpcServer, Outbound};

pub(crate) async fn serve_connection<S>(server: IpcServer, stream: S)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Outbound>();

    let connection_id = server.register_connection(out_tx);
    let span = tracing::debug_span!("connection", connection_id);

    tokio::spawn(write_loop(server.clone(), connection_id, writer, out_rx).instrument(span.clone()));
    read_loop(&server, connection_id, reader).instrument(span).await;

    server.remove_connection(connection_id);
}

async fn read_loop<S>(server: &IpcServer, connection_id: ConnectionId, mut reader: ReadHalf<S>)
where
    S: AsyncRead + AsyncWrite,
{
    let mut frames = FrameBuffer::new(server.delimiter());

    loop {
        match reader.read_buf(frames.buf_mut()).await {
            Ok(0) => {
                tracing::debug!(connection_id, residue = frames.residue().len(), "peer ended the connection");
                break;
            }
            Ok(_) => {
                for frame in frames.drain_frames() {
                    server.handle_frame(connection_id, &frame);
                }
            }
            Err(e) => {
                tracing::debug!(connection_id, error = %e, "read failed");
                break;
            }
        }
    }
}

async fn write_loop<S>(
    server: IpcServer,
    connection_id: ConnectionId,
    mut writer: WriteHalf<S>,
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
) where
    S: AsyncRead + AsyncWrite,
{
    while let Some(out) = out_rx.recv().await {
        let mut written = write_frame(&mut writer, &out.frame).await;
        if written.is_ok() && out.end_connection {
            written = writer.shutdown().await;
        }

        let failed = written.is_err();
        if let Some(ack) = out.ack {
            let _ = ack.send(written.map_err(IpcError::from));
        }

        if failed {
            tracing::debug!(connection_id, "write failed, dropping connection");
            server.remove_connection(connection_id);
            break;
        }
        if out.end_connection {
            server.remove_connection(connection_id);
            break;
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}
