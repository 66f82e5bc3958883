//! IPC server core.
//!
//! - `connections`: live connections and their outbound queues.
//! - `channels`: channel registry and subscription membership.
//! - `server`: lifecycle, request intake, responses and broadcasts.

pub mod channels;
pub mod connections;
pub mod server;
pub mod types;

pub use server::{IpcServer, RequestHandler, ServerOptions};
pub use types::{Broadcast, ConnectionId, ListenOptions, Outbound, SendResponse, ServerEvent};
