//! sockroute client library.
//!
//! One [`IpcClient`] owns one connection to a sockroute server. Requests are
//! queued, written in FIFO order, and correlated with their responses by id;
//! broadcasts and diagnostics arrive on a [`ClientEvent`] stream.

pub mod client;
mod connection;
pub mod types;

pub use client::IpcClient;
pub use types::{ClientEvent, ClientOptions, RequestOptions};
