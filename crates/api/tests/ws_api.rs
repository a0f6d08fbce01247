//! End-to-end WebSocket tests over a real TCP listener.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use common::{build_test_app, create_widget, token, wait_until};
use doshboard_core::roles::ROLE_USER;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, token: &str) -> Client {
    let url = format!("ws://{addr}/api/v1/ws?access_token={token}");
    let (client, _) = connect_async(url).await.expect("handshake should succeed");
    client
}

async fn send_json(client: &mut Client, frame: Value) {
    client.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn recv_json(client: &mut Client) -> Value {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("Connection ended unexpectedly: {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("frame should arrive within five seconds")
}

// ---------------------------------------------------------------------------
// Test: handshake without a valid token is refused with 401
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_without_token_is_unauthorized() {
    let app = build_test_app();
    let addr = spawn_server(app.router.clone()).await;

    for url in [
        format!("ws://{addr}/api/v1/ws"),
        format!("ws://{addr}/api/v1/ws?access_token=garbage"),
    ] {
        match connect_async(url).await {
            Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
            Err(e) => panic!("Expected HTTP 401, got: {e}"),
            Ok(_) => panic!("Handshake should have been refused"),
        }
    }
    assert_eq!(app.state.hub.connection_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: both token transports are accepted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_accepts_query_token_and_bearer_header() {
    let app = build_test_app();
    let addr = spawn_server(app.router.clone()).await;
    let alice = token(1, ROLE_USER);

    let _by_query = connect(addr, &alice).await;

    let mut request = format!("ws://{addr}/api/v1/ws").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {alice}").parse().unwrap());
    let (_by_header, _) = connect_async(request).await.expect("handshake should succeed");

    let hub = app.state.hub.clone();
    wait_until(|| hub.connection_count() == 2).await;
}

// ---------------------------------------------------------------------------
// Test: subscribe, receive the current value, then live updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscribe_streams_current_value_and_updates() {
    let app = build_test_app();
    let addr = spawn_server(app.router.clone()).await;
    let alice = token(1, ROLE_USER);

    let widget = create_widget(
        &app.router,
        &alice,
        json!({"widget_type": "crypto", "params": {"currency": "BTC"}}),
    )
    .await;
    let id = widget["widget_id"].as_i64().unwrap();
    let cache = app.state.hub.cache().clone();
    wait_until(|| cache.get(id).is_ok()).await;

    let mut client = connect(addr, &alice).await;
    send_json(&mut client, json!({"type": "subscribe", "widget_id": id})).await;

    assert_eq!(recv_json(&mut client).await, json!({"type": "subscribed", "widget_id": id}));
    let current = recv_json(&mut client).await;
    assert_eq!(current["type"], "update");
    assert_eq!(current["value"]["price"], 100.0);

    cache.update(id, json!({"currency": "BTC", "price": 101.5}));
    let live = recv_json(&mut client).await;
    assert_eq!(live["type"], "update");
    assert_eq!(live["value"]["price"], 101.5);

    send_json(&mut client, json!({"type": "unsubscribe", "widget_id": id})).await;
    assert_eq!(recv_json(&mut client).await["type"], "unsubscribed");
    assert_eq!(app.state.hub.subscriber_count(id), 0);
}

// ---------------------------------------------------------------------------
// Test: refused subscriptions and bad frames keep the connection open
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forbidden_subscription_reports_error_frame() {
    let app = build_test_app();
    let addr = spawn_server(app.router.clone()).await;
    let alice = token(1, ROLE_USER);
    let bob = token(2, ROLE_USER);

    let widget = create_widget(&app.router, &alice, json!({"widget_type": "weather"})).await;
    let id = widget["widget_id"].as_i64().unwrap();

    let mut client = connect(addr, &bob).await;
    send_json(&mut client, json!({"type": "subscribe", "widget_id": id})).await;

    let error = recv_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "FORBIDDEN");
    assert_eq!(error["widget_id"], id);

    send_json(&mut client, json!({"type": "subscribe", "widget_id": 4242})).await;
    assert_eq!(recv_json(&mut client).await["code"], "NOT_FOUND");
    assert_eq!(app.state.hub.connection_count(), 1);
}

#[tokio::test]
async fn malformed_frame_reports_bad_request() {
    let app = build_test_app();
    let addr = spawn_server(app.router.clone()).await;
    let mut client = connect(addr, &token(1, ROLE_USER)).await;

    client.send(Message::Text("not json".into())).await.unwrap();

    let error = recv_json(&mut client).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "BAD_REQUEST");
    assert!(error.get("widget_id").is_none());
}

// ---------------------------------------------------------------------------
// Test: closing the socket removes the connection from the hub
// ---------------------------------------------------------------------------

#[tokio::test]
async fn client_close_disconnects_from_hub() {
    let app = build_test_app();
    let addr = spawn_server(app.router.clone()).await;
    let mut client = connect(addr, &token(1, ROLE_USER)).await;

    let hub = app.state.hub.clone();
    wait_until(|| hub.connection_count() == 1).await;

    client.close(None).await.unwrap();
    wait_until(|| hub.connection_count() == 0).await;
}
