//! Top-level facade crate for sockroute.
//!
//! Re-exports the protocol core, the server and the client so users can
//! depend on a single crate.

pub mod core {
    pub use sockroute_core::*;
}

pub mod server {
    pub use sockroute_server::*;
}

pub mod client {
    pub use sockroute_client::*;
}

pub use sockroute_client::{ClientEvent, ClientOptions, IpcClient, RequestOptions};
pub use sockroute_core::address::SocketAddress;
pub use sockroute_core::{IpcError, Result};
pub use sockroute_server::{error_handler, handler, App, Broadcast, Ctx, ListenOptions, ServerOptions};
