//! Decode-once codec for the transport layer.
//!
//! - Frame bytes => JSON value => validated `SocketRequest`
//! - Anything that fails is surfaced as a `Rejection` carrying the id and
//!   category the error response must echo

use sockroute_core::protocol::{codec, validate_request, Category, Rejection, SocketRequest, UNKNOWN_ID};

#[derive(Debug)]
pub enum Inbound {
    Request(SocketRequest),
    Rejected(Rejection),
}

pub fn decode(frame: &[u8]) -> Inbound {
    let value = match codec::decode_value(frame) {
        Ok(v) => v,
        Err(error) => {
            return Inbound::Rejected(Rejection {
                id: UNKNOWN_ID.to_owned(),
                category: Category::General,
                error,
            })
        }
    };

    match validate_request(value) {
        Ok(request) => Inbound::Request(request),
        Err(rejection) => Inbound::Rejected(rejection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_json_is_rejected_with_unknown_id() {
        match decode(b"{ not json") {
            Inbound::Rejected(r) => {
                assert_eq!(r.id, UNKNOWN_ID);
                assert_eq!(r.category, Category::General);
                assert_eq!(r.error.code(), "INVALID_JSON");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn subscribe_request_decodes() {
        let frame = br#"{"metadata":{"id":"1","category":"subscribe"},"payload":{"channels":["a"]}}"#;
        match decode(frame) {
            Inbound::Request(SocketRequest::Subscribe(r)) => assert_eq!(r.payload.channels, vec!["a"]),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
