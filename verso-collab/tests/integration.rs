//! End-to-end tests for the connection manager and session wiring against
//! real in-process WebSocket endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;

use verso_collab::connection::{
    session_url, ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState,
};
use verso_collab::protocol::{ClientMessage, Envelope, ServerMessage};
use verso_collab::session::{CollabSession, SessionConfig};
use verso_core::{Column, ColumnRules, Role, User};

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        reconnect_interval: Duration::from_millis(25),
        max_reconnect_attempts: 3,
    }
}

async fn recv_event(rx: &mut mpsc::Receiver<ConnectionEvent>) -> ConnectionEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("event channel closed")
}

async fn wait_for_open(rx: &mut mpsc::Receiver<ConnectionEvent>) {
    loop {
        if matches!(recv_event(rx).await, ConnectionEvent::Open) {
            return;
        }
    }
}

/// A server that echoes every text frame back to its sender.
async fn spawn_echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        if ws.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    port
}

/// A server that closes the first connection immediately after the
/// handshake, then echoes on later connections.
async fn spawn_flaky_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let connections = Arc::new(AtomicUsize::new(0));
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let n = connections.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                if n == 0 {
                    let _ = ws.close(None).await;
                    return;
                }
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Text(text) = msg {
                        if ws.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    port
}

/// A server impersonating a second participant: every received `edit` is
/// answered with the same edit re-stamped as coming from user `u2`.
async fn spawn_relay_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let Ok(mut value) =
                        serde_json::from_str::<serde_json::Value>(text.as_str())
                    else {
                        continue;
                    };
                    if value["type"] == "edit" {
                        value["data"]["user_id"] = "u2".into();
                        value["data"]["user_name"] = "Bob".into();
                        if ws
                            .send(Message::Text(value.to_string().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            });
        }
    });
    port
}

/// A port with nothing listening on it.
async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_connect_and_send() {
    let port = spawn_echo_server().await;
    let mut manager = ConnectionManager::new(fast_config());
    let mut events = manager.take_event_rx().unwrap();

    manager.connect(format!("ws://127.0.0.1:{port}/s1"));
    wait_for_open(&mut events).await;
    assert_eq!(manager.state(), ConnectionState::Connected);

    let sent = manager.send(&ClientMessage::Edit {
        line_number: 3,
        content: "你好".to_string(),
        edit_type: Column::Target,
    });
    assert!(sent);

    // The echo comes back as a decoded envelope.
    loop {
        match recv_event(&mut events).await {
            ConnectionEvent::Message(envelope) => {
                assert_eq!(envelope.msg_type, "edit");
                assert_eq!(envelope.data["line_number"], 3);
                assert_eq!(envelope.data["edit_type"], "cn");
                break;
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_send_when_closed_fails_without_queuing() {
    let manager = ConnectionManager::new(fast_config());
    let msg = ClientMessage::Edit {
        line_number: 0,
        content: "x".to_string(),
        edit_type: Column::Target,
    };
    assert!(!manager.send(&msg));
}

#[tokio::test]
async fn test_reconnect_bound_exhausts_and_fails() {
    let port = dead_port().await;
    let mut manager = ConnectionManager::new(fast_config());
    let mut events = manager.take_event_rx().unwrap();

    manager.connect(format!("ws://127.0.0.1:{port}"));

    let mut reconnect_attempts = 0u32;
    loop {
        match recv_event(&mut events).await {
            ConnectionEvent::Reconnecting { attempt } => {
                reconnect_attempts += 1;
                assert_eq!(attempt, reconnect_attempts);
            }
            ConnectionEvent::GaveUp => break,
            ConnectionEvent::TransportError(_) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    // Exactly max_reconnect_attempts reconnections, then terminal failure.
    assert_eq!(reconnect_attempts, 3);
    assert_eq!(manager.state(), ConnectionState::Failed);

    // And it stays quiet afterwards.
    let silence = timeout(Duration::from_millis(150), events.recv()).await;
    assert!(silence.is_err(), "no further events after giving up");
}

#[tokio::test]
async fn test_counter_resets_after_successful_open() {
    let port = spawn_flaky_server().await;
    let mut manager = ConnectionManager::new(fast_config());
    let mut events = manager.take_event_rx().unwrap();

    manager.connect(format!("ws://127.0.0.1:{port}"));

    // First open, server slams the door, manager retries and opens again.
    wait_for_open(&mut events).await;
    let mut saw_reconnecting = false;
    loop {
        match recv_event(&mut events).await {
            ConnectionEvent::Reconnecting { attempt } => {
                assert_eq!(attempt, 1, "counter must restart after an open");
                saw_reconnecting = true;
            }
            ConnectionEvent::Open => break,
            ConnectionEvent::Closed | ConnectionEvent::TransportError(_) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(saw_reconnecting);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_disconnect_cancels_reconnect() {
    let port = spawn_echo_server().await;
    let mut manager = ConnectionManager::new(fast_config());
    let mut events = manager.take_event_rx().unwrap();

    manager.connect(format!("ws://127.0.0.1:{port}"));
    wait_for_open(&mut events).await;

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    // No reconnect attempt may follow an explicit disconnect.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
    while let Ok(Some(event)) = timeout_at(deadline, events.recv()).await {
        assert!(
            !matches!(event, ConnectionEvent::Reconnecting { .. }),
            "explicit disconnect must not reconnect"
        );
    }
}

async fn timeout_at<F: std::future::Future>(
    deadline: tokio::time::Instant,
    future: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    tokio::time::timeout_at(deadline, future).await
}

#[tokio::test]
async fn test_session_applies_relayed_remote_edit() {
    let port = spawn_relay_server().await;
    let me = User::new("local", "Ada", Role::Translator);

    let mut manager = ConnectionManager::new(fast_config());
    let mut events = manager.take_event_rx().unwrap();
    manager.connect(session_url(
        &format!("ws://127.0.0.1:{port}"),
        "s1",
        &me,
    ));
    wait_for_open(&mut events).await;

    let mut session = CollabSession::new(
        "s1",
        me,
        vec!["hello".to_string()],
        vec![String::new()],
        Box::new(manager),
        Box::new(ColumnRules),
        SessionConfig::default(),
    )
    .unwrap();

    // Our optimistic edit goes out; the relay answers as user u2.
    session
        .apply_local_edit(0, "first draft", Column::Target)
        .unwrap();
    assert_eq!(session.target_lines()[0], "first draft");

    loop {
        match recv_event(&mut events).await {
            ConnectionEvent::Message(envelope) => {
                session.handle_envelope(&envelope);
                break;
            }
            other => session.handle_connection_event(other),
        }
    }

    // Bob's relayed copy of the line wins (it carries his user_id).
    assert_eq!(session.target_lines()[0], "first draft");
    assert_eq!(session.recent_editor(0), Some("Bob"));
}

#[tokio::test]
async fn test_inbound_garbage_does_not_kill_connection() {
    // A server that sends junk first, then a valid frame.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            let _ = ws.send(Message::Text("{not json".into())).await;
            let valid = Envelope::new(
                "user_leave",
                serde_json::json!({"user_id": "u9"}),
            )
            .encode()
            .unwrap();
            let _ = ws.send(Message::Text(valid.into())).await;
            // Keep the connection open while the client reads.
            while ws.next().await.is_some() {}
        }
    });

    let mut manager = ConnectionManager::new(fast_config());
    let mut events = manager.take_event_rx().unwrap();
    manager.connect(format!("ws://127.0.0.1:{port}"));
    wait_for_open(&mut events).await;

    // The junk frame is swallowed; the next valid frame still arrives.
    match recv_event(&mut events).await {
        ConnectionEvent::Message(envelope) => {
            let message = ServerMessage::from_envelope(&envelope).unwrap();
            assert!(matches!(message, ServerMessage::UserLeave(_)));
        }
        other => panic!("expected the valid frame, got {other:?}"),
    }
    assert_eq!(manager.state(), ConnectionState::Connected);
}
