#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;

use sockroute_client::{ClientEvent, ClientOptions, IpcClient, RequestOptions};
use sockroute_core::address::SocketAddress;
use sockroute_core::protocol::Delimiter;

mod fake_server;
use fake_server::FakeServer;

async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no client event")
        .unwrap()
}

#[tokio::test]
async fn requests_are_written_in_order_and_matched_by_id() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();

    let serve = async {
        let mut peer = server.accept().await;
        let mut requests = Vec::new();
        for _ in 0..3 {
            requests.push(peer.recv().await);
        }
        let ids: Vec<_> = requests.iter().map(|r| r["metadata"]["id"].clone()).collect();
        assert_eq!(ids, vec![json!("1"), json!("2"), json!("3")]);

        // Answer out of order.
        for request in requests.iter().rev() {
            let url = request["payload"]["url"].clone();
            peer.reply(request, false, json!({ "url": url })).await;
        }
        peer
    };

    let (a, b, c, _peer) = tokio::join!(
        client.get("/a", RequestOptions::default()),
        client.post("/b", RequestOptions::default().body(json!({"x": 1}))),
        client.delete("/c", RequestOptions::default()),
        serve,
    );
    assert_eq!(a.unwrap().body, json!({"url": "/a"}));
    assert_eq!(b.unwrap().body, json!({"url": "/b"}));
    assert_eq!(c.unwrap().body, json!({"url": "/c"}));
}

#[tokio::test]
async fn request_envelope_carries_options() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();

    let options = RequestOptions::default()
        .query("page", 2)
        .header("auth", "token")
        .body(json!({"name": "n"}));

    let serve = async {
        let mut peer = server.accept().await;
        let request = peer.recv().await;
        assert_eq!(
            request,
            json!({
                "metadata": {"id": "1", "category": "general"},
                "payload": {
                    "url": "/users",
                    "method": "patch",
                    "query": {"page": 2},
                    "headers": {"auth": "token"},
                    "body": {"name": "n"},
                },
            })
        );
        peer.reply(&request, false, json!(null)).await;
        peer
    };

    let (res, _peer) = tokio::join!(client.patch("/users", options), serve);
    assert_eq!(res.unwrap().body, json!(null));
}

#[tokio::test]
async fn timeout_rejects_and_late_reply_is_unhandled() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();
    let mut events = client.events();

    let serve = async {
        let mut peer = server.accept().await;
        let request = peer.recv().await;
        (peer, request)
    };
    let (res, (mut peer, request)) = tokio::join!(
        client.get("/slow", RequestOptions::default().timeout(Duration::from_millis(50))),
        serve,
    );
    assert_eq!(res.unwrap_err().code(), "REQUEST_TIMEOUT");

    peer.reply(&request, false, json!({"late": true})).await;
    match next_event(&mut events).await {
        ClientEvent::UnhandledResponse { response, error } => {
            assert_eq!(response.metadata.id, "1");
            assert_eq!(error.code(), "INVALID_RESPONSE:UNKNOWN_ID");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn reply_before_timeout_resolves() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();

    let serve = async {
        let mut peer = server.accept().await;
        let request = peer.recv().await;
        peer.reply(&request, false, json!({"fast": true})).await;
        peer
    };
    let (res, _peer) = tokio::join!(
        client.get("/fast", RequestOptions::default().timeout(Duration::from_secs(2))),
        serve,
    );
    assert_eq!(res.unwrap().body, json!({"fast": true}));
}

#[tokio::test]
async fn error_flagged_response_rejects_with_remote_code() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();

    let serve = async {
        let mut peer = server.accept().await;
        let request = peer.recv().await;
        peer.reply(&request, true, json!({"code": "NOT_FOUND", "message": "nope"}))
            .await;
        peer
    };
    let (res, _peer) = tokio::join!(client.get("/missing", RequestOptions::default()), serve);
    let err = res.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(err.to_string(), "nope");
}

#[tokio::test]
async fn undecodable_frame_is_reported_and_client_keeps_working() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();
    let mut events = client.events();

    let mut peer = server.accept().await;
    peer.send_raw(b"definitely not json").await;
    match next_event(&mut events).await {
        ClientEvent::Error(err) => assert_eq!(err.code(), "INVALID_RESPONSE:NOT_JSON"),
        other => panic!("unexpected event: {other:?}"),
    }

    let serve = async {
        let request = peer.recv().await;
        peer.reply(&request, false, json!({"ok": true})).await;
    };
    let (res, ()) = tokio::join!(client.get("/after", RequestOptions::default()), serve);
    assert!(res.is_ok());
}

#[tokio::test]
async fn broadcasts_arrive_as_events() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();
    let mut events = client.events();

    let serve = async {
        let mut peer = server.accept().await;
        let request = peer.recv().await;
        assert_eq!(request["metadata"]["category"], "subscribe");
        assert_eq!(request["payload"], json!({"channels": ["news", "sports"]}));
        peer.reply(&request, false, json!({"message": "Subscribed to channels: news, sports"}))
            .await;
        peer.broadcast("news", json!({"headline": "hi"})).await;
        peer
    };
    let (res, _peer) = tokio::join!(client.subscribe(["news", "sports", "news"]), serve);
    assert_eq!(res.unwrap().body["message"], "Subscribed to channels: news, sports");

    match next_event(&mut events).await {
        ClientEvent::Broadcast { channel, data } => {
            assert_eq!(channel, "news");
            assert_eq!(data, json!({"headline": "hi"}));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn server_end_rejects_pending_and_later_requests() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();

    let serve = async {
        let mut peer = server.accept().await;
        peer.recv().await;
        peer.end().await;
    };
    let (res, ()) = tokio::join!(client.get("/pending", RequestOptions::default()), serve);
    assert_eq!(res.unwrap_err().code(), "SOCKET_ENDED");

    let err = client.get("/later", RequestOptions::default()).await.unwrap_err();
    assert_eq!(err.code(), "SOCKET_ENDED");
    assert_eq!(client.terminal_error().map(|e| e.code().to_owned()).as_deref(), Some("SOCKET_ENDED"));
}

#[tokio::test]
async fn close_rejects_pending_requests_and_destroys_the_socket() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();

    let serve = async {
        let mut peer = server.accept().await;
        peer.recv().await;
        client.close();
        peer
    };
    let (res, mut peer) = tokio::join!(client.get("/pending", RequestOptions::default()), serve);
    assert_eq!(res.unwrap_err().code(), "SOCKET_DESTROYED_MANUALLY");
    assert!(peer.is_closed().await);

    client.close();
    let err = client.unsubscribe(["news"]).await.unwrap_err();
    assert_eq!(err.code(), "SOCKET_DESTROYED_MANUALLY");
}

#[tokio::test]
async fn delimiter_in_message_fails_only_that_request() {
    let server = FakeServer::with_delimiter(Delimiter::new('|'));
    let client = IpcClient::new(server.options()).unwrap();

    let serve = async {
        let mut peer = server.accept().await;
        let request = peer.recv().await;
        assert_eq!(request["metadata"]["id"], "2");
        peer.reply(&request, false, json!({"ok": true})).await;
        peer
    };
    let (bad, good, _peer) = tokio::join!(
        client.post("/notes", RequestOptions::default().body(json!({"text": "a|b"}))),
        client.post("/notes", RequestOptions::default().body(json!({"text": "ab"}))),
        serve,
    );
    assert_eq!(bad.unwrap_err().code(), "DELIMITER_IN_MESSAGE");
    assert_eq!(good.unwrap().body, json!({"ok": true}));
}

#[tokio::test]
async fn connect_failure_is_a_socket_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = IpcClient::new(ClientOptions::new(dir.path().join("nobody-home"))).unwrap();
    let mut events = client.events();

    let err = client.get("/x", RequestOptions::default()).await.unwrap_err();
    assert_eq!(err.code(), "SOCKET_ERROR");
    match next_event(&mut events).await {
        ClientEvent::SocketError(err) => assert_eq!(err.code(), "SOCKET_ERROR"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn options_are_validated() {
    let path = PathBuf::from("/tmp/unused.sock");

    let err = IpcClient::new(ClientOptions::new(path.clone()).delimiter("")).err().unwrap();
    assert_eq!(err.code(), "INVALID_DELIMITER");

    let err = IpcClient::new(ClientOptions::new(path.clone()).delimiter("ab")).err().unwrap();
    assert_eq!(err.code(), "INVALID_DELIMITER:NOT_CHAR");

    let err = IpcClient::new(ClientOptions::new(SocketAddress::named("", "id"))).err().unwrap();
    assert_eq!(err.code(), "INVALID_PATH");

    let err = IpcClient::new(ClientOptions::new(SocketAddress::named("ns", "id")).socket_root(""))
        .err()
        .unwrap();
    assert_eq!(err.code(), "INVALID_SOCKET_ROOT");
}

#[tokio::test]
async fn channel_lists_are_validated_before_sending() {
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();

    let err = client.subscribe(Vec::<String>::new()).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_CHANNELS");
    let err = client.unsubscribe([""]).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_CHANNELS");
}

#[test]
fn client_needs_a_runtime() {
    let err = IpcClient::new(ClientOptions::new("/tmp/unused.sock")).err().unwrap();
    assert_eq!(err.code(), "SOCKET_ERROR");
}

#[tokio::test]
async fn close_abandons_a_blocked_write() {
    const BODY: usize = 16 * 1024 * 1024;
    let server = FakeServer::bind();
    let client = IpcClient::new(server.options()).unwrap();
    // Never reads until the client is gone, so the write fills the socket buffer.
    let mut peer = server.accept().await;

    let body = json!({ "blob": "a".repeat(BODY) });
    let closer = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        client.close();
    };
    let (res, ()) = tokio::join!(
        tokio::time::timeout(
            Duration::from_secs(2),
            client.post("/upload", RequestOptions::default().body(body)),
        ),
        closer,
    );

    let err = res.expect("request still pending after close").unwrap_err();
    assert_eq!(err.code(), "SOCKET_DESTROYED_MANUALLY");
    assert!(peer.read_to_end().await < BODY);
}
