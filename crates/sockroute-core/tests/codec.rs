//! Wire codec tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::json;

use sockroute_core::protocol::codec::{decode_response, encode};
use sockroute_core::protocol::envelope::{Category, GeneralResponsePayload, RequestMetadata, SocketResponse};
use sockroute_core::protocol::framer::Delimiter;
use sockroute_core::IpcError;

#[test]
fn encode_appends_delimiter() {
    let bytes = encode(&json!({ "a": 1 }), Delimiter::default()).unwrap();
    assert_eq!(&bytes[..], b"{\"a\":1}\x0c");
}

#[test]
fn encode_rejects_delimiter_inside_message() {
    let delim = Delimiter::parse("|").unwrap();
    let err = encode(&json!({ "url": "/a|b" }), delim).unwrap_err();
    assert_eq!(err.code(), "DELIMITER_IN_MESSAGE");
}

#[test]
fn form_feed_inside_strings_is_escaped() {
    // JSON escapes control characters, so the default delimiter never collides.
    let bytes = encode(&json!({ "text": "page\u{c}break" }), Delimiter::default()).unwrap();
    assert_eq!(bytes.iter().filter(|b| **b == 0x0c).count(), 1);
}

#[test]
fn decodes_correlated_and_broadcast_responses() {
    let correlated = br#"{"metadata":{"id":"3","category":"general","isError":false},"payload":{"headers":{},"body":{"id":"42"}}}"#;
    match decode_response(correlated).unwrap() {
        SocketResponse::Correlated(r) => {
            assert_eq!(r.metadata.id, "3");
            assert!(!r.metadata.is_error);
            assert_eq!(r.payload["body"]["id"], "42");
        }
        other => panic!("unexpected: {other:?}"),
    }

    let broadcast = br#"{"metadata":{"channel":"news","category":"broadcast"},"payload":{"n":1}}"#;
    match decode_response(broadcast).unwrap() {
        SocketResponse::Broadcast(r) => {
            assert_eq!(r.metadata.channel, "news");
            assert_eq!(r.payload, json!({ "n": 1 }));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn decode_rejects_garbage_and_unknown_category() {
    assert_eq!(decode_response(b"invalid_json").unwrap_err().code(), "INVALID_JSON");
    let bad = br#"{"metadata":{"id":"1","category":"gossip"},"payload":{}}"#;
    assert_eq!(decode_response(bad).unwrap_err().code(), "INVALID_RESPONSE_CATEGORY");
}

#[test]
fn error_response_carries_code_and_message() {
    let err = IpcError::protocol(sockroute_core::ErrorCode::InvalidJson, "bad");
    let resp = SocketResponse::error("unknown", Category::General, &err);
    let v = serde_json::to_value(&resp).unwrap();
    assert_eq!(
        v,
        json!({
            "metadata": { "id": "unknown", "category": "general", "isError": true },
            "payload": { "headers": {}, "body": { "code": "INVALID_JSON", "message": "bad" } }
        })
    );

    let ok = SocketResponse::reply(
        &RequestMetadata { id: "5".into(), category: Category::Subscribe },
        false,
        GeneralResponsePayload { headers: Default::default(), body: json!({ "message": "hi" }) },
    );
    assert_eq!(serde_json::to_value(&ok).unwrap()["metadata"]["category"], "subscribe");
}

#[test]
fn remote_error_uses_body_code() {
    let err = IpcError::remote(json!({ "headers": {}, "body": { "code": "NOT_FOUND", "message": "nope" } }));
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(err.to_string(), "nope");
}
