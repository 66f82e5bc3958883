//! sockroute core: transport-agnostic protocol primitives, error types, and
//! socket addressing.
//!
//! This crate defines the wire-level contracts and error surface shared by the
//! server and the client. It does not depend on an async runtime, so it can be
//! reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `IpcError`/`Result` so production
//! processes do not crash on malformed input or bad traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod address;
pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorBody, ErrorCode, IpcError, Result};
