// Integration tests for `Connection` against an in-process WebSocket relay.
#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;
use url::Url;

use haremote_api::{
    Command, Connection, ConnectionConfig, ConnectionState, Credentials, Error, Frontend,
    HassOptions, ReconnectConfig,
};

type RelaySocket = WebSocketStream<TcpStream>;

// ── Helpers ─────────────────────────────────────────────────────────

/// Host stand-in that records what the connection pushes into it.
struct RecordingFrontend {
    options: Mutex<Option<HassOptions>>,
    installs: AtomicUsize,
    detached: AtomicBool,
    updates: mpsc::UnboundedSender<Value>,
}

impl RecordingFrontend {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Value>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let frontend = Arc::new(Self {
            options: Mutex::new(None),
            installs: AtomicUsize::new(0),
            detached: AtomicBool::new(false),
            updates,
        });
        (frontend, rx)
    }

    fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    fn options(&self) -> Option<HassOptions> {
        self.options.lock().unwrap().clone()
    }
}

impl Frontend for RecordingFrontend {
    fn set_options(&self, options: HassOptions) {
        *self.options.lock().unwrap() = Some(options);
        self.installs.fetch_add(1, Ordering::SeqCst);
    }

    fn update_state(&self, data: Value) {
        let _ = self.updates.send(data);
    }

    fn detach(&self) {
        self.options.lock().unwrap().take();
        self.detached.store(true, Ordering::SeqCst);
    }
}

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("operation did not finish in time")
}

async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("ws://{addr}/ws/opp_energy/").parse().unwrap();
    (listener, url)
}

fn fast_config(url: Url) -> ConnectionConfig {
    let mut config = ConnectionConfig::new(url, "cabin");
    config.command_timeout = Duration::from_millis(300);
    config.reconnect = ReconnectConfig {
        base_delay: Duration::from_millis(10),
        max_attempts: 5,
    };
    config
}

fn start(config: ConnectionConfig) -> (Connection, Arc<RecordingFrontend>, mpsc::UnboundedReceiver<Value>) {
    let (frontend, updates) = RecordingFrontend::new();
    let connection = Connection::connect(
        config,
        Arc::new(Credentials::new("me@example.com", "hunter2")),
        frontend.clone(),
        CancellationToken::new(),
    );
    (connection, frontend, updates)
}

async fn accept(listener: &TcpListener) -> RelaySocket {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn recv_json(ws: &mut RelaySocket) -> Value {
    loop {
        match ws.next().await.expect("socket closed").expect("read failed") {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => {}
        }
    }
}

async fn send_json(ws: &mut RelaySocket, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Accept one socket and complete the login handshake on it.
async fn accept_authenticated(listener: &TcpListener) -> RelaySocket {
    let mut ws = accept(listener).await;
    let hello = recv_json(&mut ws).await;
    assert_eq!(hello["type"], "authenticate");
    send_json(&mut ws, json!({ "type": "auth_success" })).await;
    ws
}

async fn connected(
    config: ConnectionConfig,
    listener: &TcpListener,
) -> (Connection, Arc<RecordingFrontend>, mpsc::UnboundedReceiver<Value>, RelaySocket) {
    let (connection, frontend, updates) = start(config);
    let ws = within(accept_authenticated(listener)).await;
    within(connection.wait_authenticated()).await.unwrap();
    (connection, frontend, updates, ws)
}

fn spawn_command(
    connection: &Connection,
    command: Command,
) -> tokio::task::JoinHandle<Result<Value, Error>> {
    let connection = connection.clone();
    tokio::spawn(async move { connection.send_command(command).await })
}

// ── Handshake ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_handshake_carries_credentials_and_site() {
    let (listener, url) = bind().await;
    let (connection, frontend, _updates) = start(fast_config(url));

    let mut ws = within(accept(&listener)).await;
    let hello = within(recv_json(&mut ws)).await;
    assert_eq!(
        hello,
        json!({
            "type": "authenticate",
            "email": "me@example.com",
            "password": "hunter2",
            "site_name": "cabin"
        })
    );
    assert!(!connection.state().borrow().is_authenticated());

    send_json(&mut ws, json!({ "type": "auth_success" })).await;
    within(connection.wait_authenticated()).await.unwrap();

    assert_eq!(*connection.state().borrow(), ConnectionState::Authenticated);
    assert_eq!(frontend.installs(), 1);
}

#[tokio::test]
async fn test_command_before_authentication_fails_fast() {
    let (listener, url) = bind().await;
    let (connection, _frontend, _updates) = start(fast_config(url));

    // Nothing accepted yet: still connecting.
    let err = connection.send_command(Command::GetStates).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));

    // Socket open, handshake sent, but no auth_success.
    let mut ws = within(accept(&listener)).await;
    let hello = within(recv_json(&mut ws)).await;
    assert_eq!(hello["type"], "authenticate");

    let err = connection.send_command(Command::GetConfig).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
    assert_eq!(connection.pending_commands(), 0);

    // The relay never sees a command frame.
    let silence = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(silence.is_err(), "unexpected frame: {silence:?}");
}

// ── Correlation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_command_resolves_with_matching_result() {
    let (listener, url) = bind().await;
    let (connection, _frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;

    let pending = spawn_command(&connection, Command::GetConfig);

    let frame = within(recv_json(&mut ws)).await;
    assert_eq!(frame["type"], "get_config");
    let id = frame["id"].as_u64().unwrap();

    send_json(
        &mut ws,
        json!({ "type": "result", "id": id, "success": true, "result": { "location_name": "Cabin" } }),
    )
    .await;

    let result = within(pending).await.unwrap().unwrap();
    assert_eq!(result, json!({ "location_name": "Cabin" }));
    assert_eq!(connection.pending_commands(), 0);
}

#[tokio::test]
async fn test_out_of_order_results_reach_their_own_waiters() {
    let (listener, url) = bind().await;
    let (connection, _frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;

    let states = spawn_command(&connection, Command::GetStates);
    let config = spawn_command(&connection, Command::GetConfig);

    let first = within(recv_json(&mut ws)).await;
    let second = within(recv_json(&mut ws)).await;
    assert_ne!(first["id"], second["id"]);

    // Answer in reverse order of arrival, echoing each command's type.
    for frame in [&second, &first] {
        send_json(
            &mut ws,
            json!({ "type": "result", "id": frame["id"], "success": true, "result": frame["type"] }),
        )
        .await;
    }

    assert_eq!(within(states).await.unwrap().unwrap(), json!("get_states"));
    assert_eq!(within(config).await.unwrap().unwrap(), json!("get_config"));
}

#[tokio::test]
async fn test_failure_result_rejects_with_server_message() {
    let (listener, url) = bind().await;
    let (connection, _frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;

    let mut data = Map::new();
    data.insert("entity_id".into(), json!("switch.ghost"));
    let pending = spawn_command(&connection, Command::call_service("switch", "turn_on", data));

    let frame = within(recv_json(&mut ws)).await;
    assert_eq!(frame["domain"], "switch");
    assert_eq!(frame["service"], "turn_on");
    assert_eq!(frame["service_data"]["entity_id"], "switch.ghost");
    let id = frame["id"].as_u64().unwrap();

    send_json(
        &mut ws,
        json!({ "type": "result", "id": id, "success": false, "error": { "message": "Entity not found" } }),
    )
    .await;

    match within(pending).await.unwrap() {
        Err(Error::CommandFailed {
            id: failed, message, ..
        }) => {
            assert_eq!(failed, id);
            assert_eq!(message, "Entity not found");
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failure_without_message_uses_fallback() {
    let (listener, url) = bind().await;
    let (connection, _frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;

    let pending = spawn_command(&connection, Command::GetStates);
    let frame = within(recv_json(&mut ws)).await;
    send_json(
        &mut ws,
        json!({ "type": "result", "id": frame["id"], "success": false }),
    )
    .await;

    let err = within(pending).await.unwrap().unwrap_err();
    match err {
        Error::CommandFailed { message, .. } => assert_eq!(message, "Command failed"),
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_loosely_shaped_errors_reject_without_waiting() {
    let (listener, url) = bind().await;
    let mut config = fast_config(url);
    config.command_timeout = Duration::from_secs(30);
    let (connection, _frontend, _updates, mut ws) = connected(config, &listener).await;

    let cases = [
        (json!("boom"), "Command failed", None),
        (json!({ "code": 3, "message": "bad" }), "bad", Some("3")),
    ];
    for (error, expected_message, expected_code) in cases {
        let pending = spawn_command(&connection, Command::GetStates);
        let frame = within(recv_json(&mut ws)).await;
        send_json(
            &mut ws,
            json!({ "type": "result", "id": frame["id"], "success": false, "error": error }),
        )
        .await;

        match within(pending).await.unwrap() {
            Err(Error::CommandFailed { message, code, .. }) => {
                assert_eq!(message, expected_message);
                assert_eq!(code.as_deref(), expected_code);
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
    assert_eq!(connection.pending_commands(), 0);
}

#[tokio::test]
async fn test_dropped_callers_release_their_waiters() {
    let (listener, url) = bind().await;
    let mut config = fast_config(url);
    config.command_timeout = Duration::from_secs(30);
    let (connection, _frontend, _updates, mut ws) = connected(config, &listener).await;

    for _ in 0..3 {
        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            connection.send_command(Command::GetStates),
        )
        .await;
        assert!(outcome.is_err(), "silent relay should not answer");
    }
    assert_eq!(connection.pending_commands(), 0);

    // Frames still went out; answering them now is harmless.
    for _ in 0..3 {
        let frame = within(recv_json(&mut ws)).await;
        send_json(
            &mut ws,
            json!({ "type": "result", "id": frame["id"], "success": true }),
        )
        .await;
    }

    let fresh = spawn_command(&connection, Command::GetConfig);
    let frame = within(recv_json(&mut ws)).await;
    send_json(
        &mut ws,
        json!({ "type": "result", "id": frame["id"], "success": true, "result": "ok" }),
    )
    .await;
    assert_eq!(within(fresh).await.unwrap().unwrap(), json!("ok"));
    assert_eq!(connection.pending_commands(), 0);
}

#[tokio::test]
async fn test_timeout_removes_waiter_and_late_reply_is_dropped() {
    let (listener, url) = bind().await;
    let (connection, _frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;

    let abandoned = spawn_command(&connection, Command::GetStates);
    let frame = within(recv_json(&mut ws)).await;
    let late_id = frame["id"].as_u64().unwrap();

    match within(abandoned).await.unwrap() {
        Err(Error::CommandTimeout { id, timeout_ms }) => {
            assert_eq!(id, late_id);
            assert_eq!(timeout_ms, 300);
        }
        other => panic!("expected CommandTimeout, got {other:?}"),
    }
    assert_eq!(connection.pending_commands(), 0);

    // A late answer for the abandoned id must not leak into the next command.
    send_json(
        &mut ws,
        json!({ "type": "result", "id": late_id, "success": true, "result": "stale" }),
    )
    .await;

    let fresh = spawn_command(&connection, Command::GetConfig);
    let frame = within(recv_json(&mut ws)).await;
    assert_ne!(frame["id"].as_u64().unwrap(), late_id);
    send_json(
        &mut ws,
        json!({ "type": "result", "id": frame["id"], "success": true, "result": "fresh" }),
    )
    .await;

    assert_eq!(within(fresh).await.unwrap().unwrap(), json!("fresh"));
}

#[tokio::test]
async fn test_unsolicited_result_does_not_disturb_pending_command() {
    let (listener, url) = bind().await;
    let (connection, _frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;

    let pending = spawn_command(&connection, Command::GetStates);
    let frame = within(recv_json(&mut ws)).await;

    send_json(
        &mut ws,
        json!({ "type": "result", "id": 999_999, "success": false, "error": { "message": "nope" } }),
    )
    .await;
    send_json(&mut ws, json!({ "not": "a typed frame" })).await;
    send_json(
        &mut ws,
        json!({ "type": "result", "id": frame["id"], "success": true, "result": [] }),
    )
    .await;

    assert_eq!(within(pending).await.unwrap().unwrap(), json!([]));
}

#[tokio::test]
async fn test_pending_command_settles_when_socket_drops() {
    let (listener, url) = bind().await;
    let mut config = fast_config(url);
    config.command_timeout = Duration::from_secs(5);
    let (connection, _frontend, _updates, mut ws) = connected(config, &listener).await;

    let pending = spawn_command(&connection, Command::GetStates);
    let frame = within(recv_json(&mut ws)).await;
    let id = frame["id"].as_u64().unwrap();

    ws.close(None).await.unwrap();
    drop(ws);

    match within(pending).await.unwrap() {
        Err(Error::ConnectionLost { id: lost }) => assert_eq!(lost, id),
        other => panic!("expected ConnectionLost, got {other:?}"),
    }
}

// ── Inbound events ──────────────────────────────────────────────────

#[tokio::test]
async fn test_state_changed_events_reach_frontend() {
    let (listener, url) = bind().await;
    let (_connection, _frontend, mut updates, mut ws) = connected(fast_config(url), &listener).await;

    let first = json!({
        "entity_id": "light.kitchen",
        "new_state": { "entity_id": "light.kitchen", "state": "on", "attributes": {} }
    });
    let second = json!({
        "entity_id": "switch.fan",
        "new_state": { "entity_id": "switch.fan", "state": "off", "attributes": {} }
    });

    send_json(
        &mut ws,
        json!({ "type": "event", "event": { "event_type": "state_changed", "data": first } }),
    )
    .await;
    send_json(
        &mut ws,
        json!({ "type": "event", "event": { "event_type": "call_service", "data": { "domain": "light" } } }),
    )
    .await;
    send_json(
        &mut ws,
        json!({ "type": "event", "event": { "event_type": "state_changed", "data": second } }),
    )
    .await;

    assert_eq!(within(updates.recv()).await.unwrap(), first);
    assert_eq!(within(updates.recv()).await.unwrap(), second);
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn test_frontend_options_route_through_connection() {
    let (listener, url) = bind().await;
    let (_connection, frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;

    let options = frontend.options().expect("options installed after auth");

    let mut data = Map::new();
    data.insert("entity_id".into(), json!("light.porch"));
    data.insert("brightness".into(), json!(40));
    let call = tokio::spawn(async move { options.call_service("light", "turn_on", data).await });

    let frame = within(recv_json(&mut ws)).await;
    assert_eq!(frame["type"], "call_service");
    assert_eq!(frame["service_data"], json!({ "entity_id": "light.porch", "brightness": 40 }));
    send_json(
        &mut ws,
        json!({ "type": "result", "id": frame["id"], "success": true }),
    )
    .await;

    assert_eq!(within(call).await.unwrap().unwrap(), Value::Null);
}

// ── Reconnection ────────────────────────────────────────────────────

#[tokio::test]
async fn test_gives_up_after_five_failed_attempts() {
    let (listener, url) = bind().await;
    let accepted = Arc::new(AtomicUsize::new(0));

    // Accept TCP and hang up before the WebSocket upgrade completes.
    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let (connection, frontend, _updates) = start(fast_config(url));

    let err = within(connection.wait_authenticated()).await.unwrap_err();
    assert!(matches!(err, Error::GaveUp { attempts: 5 }));
    assert_eq!(*connection.state().borrow(), ConnectionState::Failed);

    // Initial connect plus five retries, then silence.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 6);
    assert!(frontend.detached.load(Ordering::SeqCst));
    assert_eq!(frontend.installs(), 0);
}

#[tokio::test]
async fn test_authentication_resets_attempt_budget() {
    let (listener, url) = bind().await;
    let (connection, frontend, _updates) = start(fast_config(url));
    let mut state = connection.state();

    // Seven authenticated sessions that each drop right away: more than the
    // five-attempt budget, so this only works if each success resets it.
    let server = tokio::spawn(async move {
        let mut sessions = 0;
        for _ in 0..7 {
            let mut ws = accept_authenticated(&listener).await;
            sessions += 1;
            let _ = ws.close(None).await;
        }
        sessions
    });

    assert_eq!(within(server).await.unwrap(), 7);

    // Listener dropped: the remaining attempts are refused until the budget runs out.
    within(state.wait_for(|s| *s == ConnectionState::Failed))
        .await
        .unwrap();
    assert_eq!(frontend.installs(), 7);
    assert!(frontend.options().is_none());
}

#[tokio::test]
async fn test_shutdown_closes_socket_and_detaches_frontend() {
    let (listener, url) = bind().await;
    let (connection, frontend, _updates, mut ws) = connected(fast_config(url), &listener).await;
    let mut state = connection.state();

    connection.shutdown();

    let frame = within(ws.next()).await;
    assert!(
        matches!(frame, None | Some(Ok(Message::Close(_))) | Some(Err(_))),
        "expected close, got {frame:?}"
    );

    within(state.wait_for(|s| *s == ConnectionState::Disconnected))
        .await
        .unwrap();
    assert!(frontend.detached.load(Ordering::SeqCst));

    let err = connection.send_command(Command::GetStates).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}
