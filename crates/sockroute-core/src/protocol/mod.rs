//! Wire protocol modules.
//!
//! - `framer`: delimiter splitting with residue carry-over.
//! - `envelope`: typed `{metadata, payload}` requests and responses.
//! - `codec`: JSON encode (delimiter-checked) and decode.
//! - `validate`: request validation with precise error codes.
//! - `channels`: channel-name argument normalization.
//!
//! All parsers are panic-free: malformed input is reported as `IpcError`
//! so a hostile or buggy peer cannot take a process down.

pub mod channels;
pub mod codec;
pub mod envelope;
pub mod framer;
pub mod validate;

pub use channels::normalize_channels;
pub use codec::{decode_response, decode_value, encode};
pub use envelope::{
    BroadcastMetadata, BroadcastResponse, Category, ChannelsPayload, ChannelsRequest,
    CorrelatedResponse, GeneralRequest, GeneralRequestPayload, GeneralResponsePayload, Method,
    RequestMetadata, ResponseCategory, ResponseMetadata, SocketRequest, SocketResponse,
};
pub use framer::{split, Chunks, Delimiter, FrameBuffer, DEFAULT_DELIMITER};
pub use validate::{validate_request, Rejection, UNKNOWN_ID};
