//! Request dispatch: handler traits, the handler-chain executor, and the
//! request / response objects handlers work with.
//!
//! Re-exports everything a route handler needs so applications can depend on
//! this module directly.

pub mod dispatcher;
pub mod handler;
pub mod request;
pub mod response;

pub use dispatcher::Next;
pub use handler::{error_handler, handler, Ctx, ErrorHandler, Handler, IntoHandlers, Middleware};
pub use request::Request;
pub use response::{Response, ResponseSink, SendOptions};
