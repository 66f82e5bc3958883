//! Transport layer (Unix domain sockets / Windows named pipes).
//!
//! Exposes the listener, the accept loop and the per-connection session
//! that decodes every frame once before it reaches the server.

pub mod codec;
pub mod connection;
pub mod listener;

pub(crate) use listener::accept_loop;
pub use listener::Listener;
