//! Shared error type across sockroute crates.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire-visible error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A received message was not valid JSON.
    InvalidJson,
    /// Request metadata is not an object.
    InvalidRequestMetadata,
    /// Request category is not one of `general`, `subscribe`, `unsubscribe`.
    InvalidRequestCategory,
    /// General request method is not one of `get`, `post`, `patch`, `delete`.
    InvalidRequestMethod,
    /// Value that must be a plain object is not one.
    NotPlainObject,
    /// A property is missing or has the wrong type.
    InvalidProperty,
    /// An object carries a property its schema does not declare.
    UnknownProperty,
    /// Response category is not a known one.
    InvalidResponseCategory,
    /// Response payload is not an object.
    InvalidResponsePayload,
    /// Broadcast data is not a non-null object.
    InvalidBroadcastData,
    /// Broadcast to a channel that was never created.
    UnknownChannel,
    /// Channel list is empty or contains an empty name.
    InvalidChannels,
    /// Delimiter is empty.
    InvalidDelimiter,
    /// Delimiter is longer than one character.
    InvalidDelimiterNotChar,
    /// Socket root is empty.
    InvalidSocketRoot,
    /// Socket path (or namespace / id) is empty.
    InvalidPath,
    /// A route was registered without handlers.
    InvalidRequestHandlers,
    /// A serialized message contains the delimiter character.
    DelimiterInMessage,
    /// No route produced a response.
    NotFound,
    /// A handler failed and no error handler answered.
    InternalServerError,
    /// `next` was called twice by the same handler.
    NextAlreadyCalled,
    /// A response sink was used twice.
    ResponseAlreadySent,
    /// A client request did not get a response in time.
    RequestTimeout,
    /// The peer ended the socket.
    SocketEnded,
    /// The client socket was closed locally.
    SocketDestroyedManually,
    /// The socket failed.
    SocketError,
    /// The client received a message that is not valid JSON.
    InvalidResponseNotJson,
    /// The client received a response for an id it is not waiting on.
    InvalidResponseUnknownId,
    /// The server is already listening.
    AlreadyListening,
    /// Filesystem / socket I/O failure.
    Io,
    /// Invalid configuration.
    Config,
}

impl ErrorCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::InvalidRequestMetadata => "INVALID_REQUEST_METADATA",
            ErrorCode::InvalidRequestCategory => "INVALID_REQUEST_CATEGORY",
            ErrorCode::InvalidRequestMethod => "INVALID_REQUEST_METHOD",
            ErrorCode::NotPlainObject => "NOT_PLAIN_OBJECT",
            ErrorCode::InvalidProperty => "INVALID_PROPERTY",
            ErrorCode::UnknownProperty => "UNKNOWN_PROPERTY",
            ErrorCode::InvalidResponseCategory => "INVALID_RESPONSE_CATEGORY",
            ErrorCode::InvalidResponsePayload => "INVALID_RESPONSE_PAYLOAD",
            ErrorCode::InvalidBroadcastData => "INVALID_BROADCAST_DATA",
            ErrorCode::UnknownChannel => "UNKNOWN_CHANNEL",
            ErrorCode::InvalidChannels => "INVALID_CHANNELS",
            ErrorCode::InvalidDelimiter => "INVALID_DELIMITER",
            ErrorCode::InvalidDelimiterNotChar => "INVALID_DELIMITER:NOT_CHAR",
            ErrorCode::InvalidSocketRoot => "INVALID_SOCKET_ROOT",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::InvalidRequestHandlers => "INVALID_REQUEST_HANDLERS",
            ErrorCode::DelimiterInMessage => "DELIMITER_IN_MESSAGE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorCode::NextAlreadyCalled => "NEXT_ALREADY_CALLED",
            ErrorCode::ResponseAlreadySent => "RESPONSE_ALREADY_SENT",
            ErrorCode::RequestTimeout => "REQUEST_TIMEOUT",
            ErrorCode::SocketEnded => "SOCKET_ENDED",
            ErrorCode::SocketDestroyedManually => "SOCKET_DESTROYED_MANUALLY",
            ErrorCode::SocketError => "SOCKET_ERROR",
            ErrorCode::InvalidResponseNotJson => "INVALID_RESPONSE:NOT_JSON",
            ErrorCode::InvalidResponseUnknownId => "INVALID_RESPONSE:UNKNOWN_ID",
            ErrorCode::AlreadyListening => "ALREADY_LISTENING",
            ErrorCode::Io => "IO_ERROR",
            ErrorCode::Config => "INVALID_CONFIG",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error body carried in an error-flagged response: `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, IpcError>;

/// Unified error type used by core, server and client.
///
/// Every variant owns plain data only, so errors can be cloned when an error
/// handler forwards them down its chain.
#[derive(Debug, Clone, Error)]
pub enum IpcError {
    /// Malformed input from the peer. Reported back, never fatal.
    #[error("{message}")]
    Protocol { code: ErrorCode, message: String },
    /// Misuse of the API by local code (double `next`, double send, bad options).
    #[error("{message}")]
    Usage { code: ErrorCode, message: String },
    /// Raised by a route handler; routed to the error-handler chain.
    #[error("{message}")]
    Handler { code: String, message: String },
    /// Socket-level failure or terminal client state.
    #[error("{message}")]
    Transport { code: ErrorCode, message: String },
    /// A client request was not answered in time.
    #[error("the request has timed out")]
    Timeout,
    /// The peer answered with an error-flagged response.
    #[error("{message}")]
    Remote {
        code: String,
        message: String,
        payload: Value,
    },
    #[error("io: {0}")]
    Io(String),
    #[error("config: {0}")]
    Config(String),
}

impl IpcError {
    pub fn protocol(code: ErrorCode, message: impl Into<String>) -> Self {
        IpcError::Protocol {
            code,
            message: message.into(),
        }
    }

    pub fn usage(code: ErrorCode, message: impl Into<String>) -> Self {
        IpcError::Usage {
            code,
            message: message.into(),
        }
    }

    pub fn transport(code: ErrorCode, message: impl Into<String>) -> Self {
        IpcError::Transport {
            code,
            message: message.into(),
        }
    }

    /// Domain error raised from a handler.
    pub fn handler(code: impl Into<String>, message: impl Into<String>) -> Self {
        IpcError::Handler {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build from an error-flagged response payload (`{headers, body: {code, message}}`).
    pub fn remote(payload: Value) -> Self {
        let body = payload.get("body");
        let field = |name: &str| {
            body.and_then(|b| b.get(name))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };
        IpcError::Remote {
            code: field("code").unwrap_or_else(|| "UNKNOWN_ERROR".into()),
            message: field("message").unwrap_or_else(|| "the server returned an error".into()),
            payload,
        }
    }

    /// Stable code for this error.
    pub fn code(&self) -> &str {
        match self {
            IpcError::Protocol { code, .. }
            | IpcError::Usage { code, .. }
            | IpcError::Transport { code, .. } => code.as_str(),
            IpcError::Handler { code, .. } | IpcError::Remote { code, .. } => code,
            IpcError::Timeout => ErrorCode::RequestTimeout.as_str(),
            IpcError::Io(_) => ErrorCode::Io.as_str(),
            IpcError::Config(_) => ErrorCode::Config.as_str(),
        }
    }

    /// `{code, message}` body for an error-flagged response.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.code(), self.to_string())
    }
}

impl From<std::io::Error> for IpcError {
    fn from(e: std::io::Error) -> Self {
        IpcError::Io(e.to_string())
    }
}
