//! Relay integration tests
//!
//! End-to-end tests over real WebSocket connections: presence binding,
//! room joins, message fan-out, group announcements, and disconnect
//! cleanup.
//!
//! Run with: cargo test -p integration-tests --test relay_tests

use integration_tests::{
    chat_metadata, group_chat, message_payload, send_payload, settle, TestServer, WsClient,
};
use relay_gateway::protocol::{ChatId, UserId};
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");

    let response = reqwest::get(format!("{}/health", server.http_url()))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

// ============================================================================
// Fan-out
// ============================================================================

// User A {a1}, user B {b1, b2}; only b1 joined room c1. A sends with
// recipients=["B"]: b1 gets the room copy, b2 the presence copy, a1 nothing.
#[tokio::test]
async fn test_room_and_recipient_fanout() {
    let server = TestServer::start().await.unwrap();

    let mut a1 = WsClient::connect(&server).await.unwrap();
    let mut b1 = WsClient::connect(&server).await.unwrap();
    let mut b2 = WsClient::connect(&server).await.unwrap();

    a1.emit("setup", json!("A")).await.unwrap();
    b1.emit("setup", json!("B")).await.unwrap();
    b2.emit("setup", json!("B")).await.unwrap();
    b1.emit("joinChat", json!("c1")).await.unwrap();
    settle().await;

    let message = message_payload("A", "hello");
    a1.emit(
        "message:send",
        send_payload("c1", message.clone(), &["B"], Some(chat_metadata("c1", &["A", "B"], false))),
    )
    .await
    .unwrap();

    let b1_data = b1.recv_event("message:receive").await.unwrap();
    assert_eq!(b1_data["chatId"], "c1");
    assert_eq!(b1_data["message"], message);
    assert_eq!(b1_data["chat"]["_id"], "c1");

    let b2_data = b2.recv_event("message:receive").await.unwrap();
    assert_eq!(b2_data["message"], message);

    // Exactly one copy each, and nothing for the sender
    b1.assert_silent().await.unwrap();
    b2.assert_silent().await.unwrap();
    a1.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_delivery_to_joined_recipient() {
    let server = TestServer::start().await.unwrap();

    let mut sender = WsClient::connect(&server).await.unwrap();
    let mut b1 = WsClient::connect(&server).await.unwrap();

    b1.emit("setup", json!("B")).await.unwrap();
    b1.emit("joinChat", json!("c1")).await.unwrap();
    settle().await;

    let message = message_payload("A", "twice");
    sender
        .emit("message:send", send_payload("c1", message.clone(), &["B"], None))
        .await
        .unwrap();

    // In the room and in recipients: two copies of the same envelope,
    // deduplication is the client's job
    let first = b1.recv_event("message:receive").await.unwrap();
    let second = b1.recv_event("message:receive").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first["message"]["_id"], message["_id"]);

    b1.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_join_is_idempotent_over_the_wire() {
    let server = TestServer::start().await.unwrap();

    let mut sender = WsClient::connect(&server).await.unwrap();
    let mut viewer = WsClient::connect(&server).await.unwrap();

    // Reconnect-style double join must not double deliveries
    viewer.emit("joinChat", json!("c1")).await.unwrap();
    viewer.emit("joinChat", json!("c1")).await.unwrap();
    settle().await;

    sender
        .emit("message:send", send_payload("c1", message_payload("A", "hi"), &[], None))
        .await
        .unwrap();

    viewer.recv_event("message:receive").await.unwrap();
    viewer.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_group_created_broadcast() {
    let server = TestServer::start().await.unwrap();

    let mut creator = WsClient::connect(&server).await.unwrap();
    let mut u1 = WsClient::connect(&server).await.unwrap();
    let mut u2 = WsClient::connect(&server).await.unwrap();
    let mut outsider = WsClient::connect(&server).await.unwrap();

    u1.emit("setup", json!("U1")).await.unwrap();
    u2.emit("setup", json!("U2")).await.unwrap();
    outsider.emit("setup", json!("U3")).await.unwrap();
    settle().await;

    let chat = group_chat("g1", "weekend plans", &["U1", "U2"]);
    creator.emit("group:created", chat.clone()).await.unwrap();

    assert_eq!(u1.recv_event("group:created").await.unwrap(), chat);
    assert_eq!(u2.recv_event("group:created").await.unwrap(), chat);
    outsider.assert_silent().await.unwrap();
}

// ============================================================================
// Malformed input
// ============================================================================

#[tokio::test]
async fn test_malformed_frames_are_dropped_not_fatal() {
    let server = TestServer::start().await.unwrap();

    let mut client = WsClient::connect(&server).await.unwrap();
    let mut viewer = WsClient::connect(&server).await.unwrap();

    viewer.emit("joinChat", json!("c1")).await.unwrap();
    settle().await;

    // None of these should close the connection or reach the viewer
    client.send_raw("not json").await.unwrap();
    client.emit("no-such-event", json!("x")).await.unwrap();
    client.emit("setup", json!("")).await.unwrap();
    client
        .emit("message:send", json!({"chatId": "c1"}))
        .await
        .unwrap();
    client
        .emit("group:created", json!({"members": "not-a-list"}))
        .await
        .unwrap();

    viewer.assert_silent().await.unwrap();

    // The connection is still usable afterwards
    client
        .emit("message:send", send_payload("c1", message_payload("A", "still here"), &[], None))
        .await
        .unwrap();
    let data = viewer.recv_event("message:receive").await.unwrap();
    assert_eq!(data["message"]["text"], "still here");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_disconnect_cleans_presence_and_rooms() {
    let server = TestServer::start().await.unwrap();

    let mut b1 = WsClient::connect(&server).await.unwrap();
    let mut b2 = WsClient::connect(&server).await.unwrap();

    b1.emit("setup", json!("B")).await.unwrap();
    b2.emit("setup", json!("B")).await.unwrap();
    b1.emit("joinChat", json!("c1")).await.unwrap();
    settle().await;

    let user = UserId::from("B");
    let chat = ChatId::from("c1");
    assert_eq!(server.manager.connections_for_user(&user).len(), 2);
    assert_eq!(server.manager.connections_in_room(&chat).len(), 1);

    b1.close().await.unwrap();

    // Teardown is asynchronous to the close frame
    let mut cleaned = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if server.manager.connections_for_user(&user).len() == 1
            && server.manager.connections_in_room(&chat).is_empty()
        {
            cleaned = true;
            break;
        }
    }
    assert!(cleaned, "disconnect did not clean up presence and rooms");

    // b2 is unaffected and still reachable
    let mut sender = WsClient::connect(&server).await.unwrap();
    sender
        .emit("message:send", send_payload("c1", message_payload("A", "ping"), &["B"], None))
        .await
        .unwrap();
    b2.recv_event("message:receive").await.unwrap();
    b2.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_rebind_moves_connection_between_users() {
    let server = TestServer::start().await.unwrap();

    let mut client = WsClient::connect(&server).await.unwrap();

    client.emit("setup", json!("U1")).await.unwrap();
    settle().await;
    assert_eq!(server.manager.connections_for_user(&UserId::from("U1")).len(), 1);

    client.emit("setup", json!("U2")).await.unwrap();
    settle().await;

    assert!(server.manager.connections_for_user(&UserId::from("U1")).is_empty());
    assert_eq!(server.manager.connections_for_user(&UserId::from("U2")).len(), 1);
}
