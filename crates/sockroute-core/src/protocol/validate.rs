//! Request validation (panic-free).
//!
//! Requests are first parsed into a `serde_json::Value`, checked field by
//! field so that every rejection carries a precise code, and only then
//! converted into typed envelopes.

use serde_json::{Map, Value};

use crate::error::{ErrorCode, IpcError, Result};
use crate::protocol::envelope::{
    Category, ChannelsPayload, ChannelsRequest, GeneralRequest, GeneralRequestPayload, Method,
    RequestMetadata, SocketRequest,
};

/// Id used when a rejected request carries no usable id.
pub const UNKNOWN_ID: &str = "unknown";

#[derive(Debug, Clone, Copy)]
enum FieldType {
    NonEmptyString,
    /// Any JSON object, array or null.
    Object,
    PlainObject,
    NonEmptyStringList,
}

struct Field {
    name: &'static str,
    ty: FieldType,
}

const METADATA_SCHEMA: &[Field] = &[
    Field { name: "id", ty: FieldType::NonEmptyString },
    Field { name: "category", ty: FieldType::NonEmptyString },
];

const GENERAL_PAYLOAD_SCHEMA: &[Field] = &[
    Field { name: "url", ty: FieldType::NonEmptyString },
    Field { name: "method", ty: FieldType::NonEmptyString },
    Field { name: "query", ty: FieldType::PlainObject },
    Field { name: "headers", ty: FieldType::PlainObject },
    Field { name: "body", ty: FieldType::Object },
];

const CHANNELS_PAYLOAD_SCHEMA: &[Field] = &[Field {
    name: "channels",
    ty: FieldType::NonEmptyStringList,
}];

impl FieldType {
    fn accepts(self, v: &Value) -> bool {
        match self {
            FieldType::NonEmptyString => v.as_str().is_some_and(|s| !s.is_empty()),
            FieldType::Object => v.is_object() || v.is_array() || v.is_null(),
            FieldType::PlainObject => v.is_object(),
            FieldType::NonEmptyStringList => v.as_array().is_some_and(|items| {
                !items.is_empty() && items.iter().all(|i| i.as_str().is_some_and(|s| !s.is_empty()))
            }),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldType::NonEmptyString => "a non-empty string",
            FieldType::Object => "an object or null",
            FieldType::PlainObject => "a plain object",
            FieldType::NonEmptyStringList => "a non-empty list of non-empty strings",
        }
    }
}

fn validate_object<'a>(value: &'a Value, name: &str, schema: &[Field]) -> Result<&'a Map<String, Value>> {
    let obj = value.as_object().ok_or_else(|| {
        IpcError::protocol(ErrorCode::NotPlainObject, format!("{name} must be a plain object"))
    })?;

    for field in schema {
        let ok = obj.get(field.name).is_some_and(|v| field.ty.accepts(v));
        if !ok {
            return Err(IpcError::protocol(
                ErrorCode::InvalidProperty,
                format!("{name}.{} must be {}", field.name, field.ty.describe()),
            ));
        }
    }

    if let Some(extra) = obj.keys().find(|k| !schema.iter().any(|f| f.name == k.as_str())) {
        return Err(IpcError::protocol(
            ErrorCode::UnknownProperty,
            format!("{name} contains unknown property {extra:?}"),
        ));
    }

    Ok(obj)
}

/// A request that failed validation, with what is needed to answer it.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Id to echo back (`"unknown"` when it could not be recovered).
    pub id: String,
    /// Category to put in the error response.
    pub category: Category,
    pub error: IpcError,
}

/// Best-effort id recovery from a request that failed validation.
fn recover_id(value: &Value) -> String {
    value
        .get("metadata")
        .and_then(|m| m.get("id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_ID)
        .to_owned()
}

/// Validate request metadata: a plain object with a non-empty `id` and a known `category`.
pub fn validate_metadata(metadata: Option<&Value>) -> Result<RequestMetadata> {
    let metadata = metadata
        .filter(|m| m.is_object())
        .ok_or_else(|| {
            IpcError::protocol(
                ErrorCode::InvalidRequestMetadata,
                "Request metadata must be a plain object",
            )
        })?;

    let obj = validate_object(metadata, "Request metadata", METADATA_SCHEMA)?;
    let id = obj.get("id").and_then(Value::as_str).unwrap_or(UNKNOWN_ID);
    let category = obj.get("category").and_then(Value::as_str).unwrap_or_default();

    Ok(RequestMetadata {
        id: id.to_owned(),
        category: category.parse()?,
    })
}

/// Validate a payload against the schema of its category.
pub fn validate_payload(payload: Option<&Value>, category: Category) -> Result<()> {
    let payload = payload.unwrap_or(&Value::Null);
    match category {
        Category::Subscribe | Category::Unsubscribe => {
            validate_object(payload, "Request payload", CHANNELS_PAYLOAD_SCHEMA)?;
        }
        Category::General => {
            let obj = validate_object(payload, "Request payload", GENERAL_PAYLOAD_SCHEMA)?;
            let method = obj.get("method").and_then(Value::as_str).unwrap_or_default();
            method.parse::<Method>()?;
        }
    }
    Ok(())
}

/// Validate a decoded JSON value and turn it into a typed request.
///
/// Metadata failures are answered with category `general`; payload failures
/// echo the request's own metadata.
pub fn validate_request(value: Value) -> std::result::Result<SocketRequest, Rejection> {
    let metadata = validate_metadata(value.get("metadata")).map_err(|error| Rejection {
        id: recover_id(&value),
        category: Category::General,
        error,
    })?;

    let reject = |error: IpcError| Rejection {
        id: metadata.id.clone(),
        category: metadata.category,
        error,
    };

    validate_payload(value.get("payload"), metadata.category).map_err(reject)?;

    let payload = value.get("payload").cloned().unwrap_or(Value::Null);
    let invalid = |e: serde_json::Error| {
        reject(IpcError::protocol(
            ErrorCode::InvalidProperty,
            format!("Request payload is invalid: {e}"),
        ))
    };

    let request = match metadata.category {
        Category::General => {
            let payload: GeneralRequestPayload = serde_json::from_value(payload).map_err(invalid)?;
            SocketRequest::General(GeneralRequest {
                metadata: metadata.clone(),
                payload,
            })
        }
        Category::Subscribe => {
            let payload: ChannelsPayload = serde_json::from_value(payload).map_err(invalid)?;
            SocketRequest::Subscribe(ChannelsRequest {
                metadata: metadata.clone(),
                payload,
            })
        }
        Category::Unsubscribe => {
            let payload: ChannelsPayload = serde_json::from_value(payload).map_err(invalid)?;
            SocketRequest::Unsubscribe(ChannelsRequest {
                metadata: metadata.clone(),
                payload,
            })
        }
    };
    Ok(request)
}
