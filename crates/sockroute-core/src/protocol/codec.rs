//! Wire codec: `JSON(envelope) + DELIMITER`.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, IpcError, Result};
use crate::protocol::envelope::{
    BroadcastMetadata, BroadcastResponse, Category, CorrelatedResponse, ResponseCategory,
    ResponseMetadata, SocketResponse,
};
use crate::protocol::framer::Delimiter;

/// Serialize a message and append the delimiter.
///
/// Fails with `DELIMITER_IN_MESSAGE` when the JSON text contains the
/// delimiter, which would split the message on the receiving side.
pub fn encode<T: Serialize + ?Sized>(msg: &T, delimiter: Delimiter) -> Result<Bytes> {
    let json = serde_json::to_string(msg)
        .map_err(|e| IpcError::usage(ErrorCode::InvalidProperty, format!("json encode failed: {e}")))?;

    if json.contains(delimiter.as_char()) {
        return Err(IpcError::usage(
            ErrorCode::DelimiterInMessage,
            format!(
                "The message should not contain any value or property that contains the delimiter (code: {}) character.",
                u32::from(delimiter.as_char())
            ),
        ));
    }

    let mut out = BytesMut::with_capacity(json.len() + delimiter.as_bytes().len());
    out.put_slice(json.as_bytes());
    out.put_slice(delimiter.as_bytes());
    Ok(out.freeze())
}

/// Parse one frame as JSON.
pub fn decode_value(frame: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| IpcError::protocol(ErrorCode::InvalidJson, format!("frame is not utf-8: {e}")))?;
    serde_json::from_str(text)
        .map_err(|e| IpcError::protocol(ErrorCode::InvalidJson, format!("invalid json: {e}")))
}

#[derive(Deserialize)]
struct RawResponse {
    metadata: RawResponseMetadata,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct RawResponseMetadata {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    category: String,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

/// Decode a server -> client frame.
pub fn decode_response(frame: &[u8]) -> Result<SocketResponse> {
    let value = decode_value(frame)?;
    let raw: RawResponse = serde_json::from_value(value).map_err(|e| {
        IpcError::protocol(ErrorCode::InvalidJson, format!("invalid response envelope: {e}"))
    })?;

    let category: ResponseCategory = raw.metadata.category.parse()?;
    let missing = |field: &str| {
        IpcError::protocol(
            ErrorCode::InvalidProperty,
            format!("response metadata is missing {field:?}"),
        )
    };

    let response = match category {
        ResponseCategory::Broadcast => SocketResponse::Broadcast(BroadcastResponse {
            metadata: BroadcastMetadata {
                channel: raw.metadata.channel.ok_or_else(|| missing("channel"))?,
                category,
            },
            payload: raw.payload,
        }),
        other => {
            let category = match other {
                ResponseCategory::Subscribe => Category::Subscribe,
                ResponseCategory::Unsubscribe => Category::Unsubscribe,
                _ => Category::General,
            };
            SocketResponse::Correlated(CorrelatedResponse {
                metadata: ResponseMetadata {
                    id: raw.metadata.id.ok_or_else(|| missing("id"))?,
                    category,
                    is_error: raw.metadata.is_error,
                },
                payload: raw.payload,
            })
        }
    };
    Ok(response)
}
