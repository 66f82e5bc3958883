//! sockroute server library entry.
//!
//! This crate wires the socket transport, the IPC server core (connections,
//! channels, broadcasts), and the express-style router/dispatcher into one
//! stack. It is intended to be consumed by the binary (`main.rs`), by
//! applications through the `sockroute` facade, and by integration tests.

pub mod app;
pub mod config;
pub mod dispatch;
pub mod ipc;
pub mod router;
pub mod transport;

pub use app::App;
pub use dispatch::{error_handler, handler, Ctx, Next, Request, Response, SendOptions};
pub use ipc::{Broadcast, IpcServer, ListenOptions, ServerEvent, ServerOptions};
