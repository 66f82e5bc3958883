//! Request / response envelopes.
//!
//! Every message is `{metadata, payload}`. Requests are correlated by
//! `metadata.id`; broadcast responses carry a channel instead of an id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorCode, IpcError, Result};

/// Request category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Subscribe,
    Unsubscribe,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::General, Category::Subscribe, Category::Unsubscribe];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Subscribe => "subscribe",
            Category::Unsubscribe => "unsubscribe",
        }
    }
}

impl FromStr for Category {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                IpcError::protocol(
                    ErrorCode::InvalidRequestCategory,
                    format!("Invalid request category: {s:?}"),
                )
            })
    }
}

/// Response category: any request category plus `broadcast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseCategory {
    General,
    Subscribe,
    Unsubscribe,
    Broadcast,
}

impl ResponseCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseCategory::General => "general",
            ResponseCategory::Subscribe => "subscribe",
            ResponseCategory::Unsubscribe => "unsubscribe",
            ResponseCategory::Broadcast => "broadcast",
        }
    }
}

impl From<Category> for ResponseCategory {
    fn from(c: Category) -> Self {
        match c {
            Category::General => ResponseCategory::General,
            Category::Subscribe => ResponseCategory::Subscribe,
            Category::Unsubscribe => ResponseCategory::Unsubscribe,
        }
    }
}

impl FromStr for ResponseCategory {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "general" => Ok(ResponseCategory::General),
            "subscribe" => Ok(ResponseCategory::Subscribe),
            "unsubscribe" => Ok(ResponseCategory::Unsubscribe),
            "broadcast" => Ok(ResponseCategory::Broadcast),
            other => Err(IpcError::usage(
                ErrorCode::InvalidResponseCategory,
                format!("Invalid response category: {other:?}"),
            )),
        }
    }
}

/// HTTP-like method of a general request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Patch, Method::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Patch => "patch",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                IpcError::protocol(
                    ErrorCode::InvalidRequestMethod,
                    format!("Invalid request method: {s}"),
                )
            })
    }
}

/// Request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub id: String,
    pub category: Category,
}

/// Payload of a `general` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralRequestPayload {
    pub url: String,
    pub method: Method,
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub body: Value,
}

/// Payload of `subscribe` / `unsubscribe` requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsPayload {
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralRequest {
    pub metadata: RequestMetadata,
    pub payload: GeneralRequestPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsRequest {
    pub metadata: RequestMetadata,
    pub payload: ChannelsPayload,
}

/// A decoded, validated request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SocketRequest {
    General(GeneralRequest),
    Subscribe(ChannelsRequest),
    Unsubscribe(ChannelsRequest),
}

impl SocketRequest {
    pub fn metadata(&self) -> &RequestMetadata {
        match self {
            SocketRequest::General(r) => &r.metadata,
            SocketRequest::Subscribe(r) | SocketRequest::Unsubscribe(r) => &r.metadata,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata().id
    }
}

/// Metadata of a correlated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub id: String,
    pub category: Category,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// Payload of a correlated response: `{headers, body}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneralResponsePayload {
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedResponse {
    pub metadata: ResponseMetadata,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMetadata {
    pub channel: String,
    pub category: ResponseCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub metadata: BroadcastMetadata,
    pub payload: Value,
}

/// Any server -> client message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SocketResponse {
    Correlated(CorrelatedResponse),
    Broadcast(BroadcastResponse),
}

impl SocketResponse {
    /// Correlated response with a `{headers, body}` payload.
    pub fn reply(metadata: &RequestMetadata, is_error: bool, payload: GeneralResponsePayload) -> Self {
        SocketResponse::Correlated(CorrelatedResponse {
            metadata: ResponseMetadata {
                id: metadata.id.clone(),
                category: metadata.category,
                is_error,
            },
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        })
    }

    /// Error-flagged response with body `{code, message}`.
    pub fn error(id: impl Into<String>, category: Category, err: &IpcError) -> Self {
        let payload = GeneralResponsePayload {
            headers: Map::new(),
            body: serde_json::to_value(err.to_body()).unwrap_or(Value::Null),
        };
        SocketResponse::reply(
            &RequestMetadata {
                id: id.into(),
                category,
            },
            true,
            payload,
        )
    }

    pub fn broadcast(channel: impl Into<String>, data: Value) -> Self {
        SocketResponse::Broadcast(BroadcastResponse {
            metadata: BroadcastMetadata {
                channel: channel.into(),
                category: ResponseCategory::Broadcast,
            },
            payload: data,
        })
    }

    pub fn category(&self) -> ResponseCategory {
        match self {
            SocketResponse::Correlated(r) => r.metadata.category.into(),
            SocketResponse::Broadcast(r) => r.metadata.category,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            SocketResponse::Correlated(r) => &r.payload,
            SocketResponse::Broadcast(r) => &r.payload,
        }
    }
}
