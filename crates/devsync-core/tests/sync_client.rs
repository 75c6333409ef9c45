//! Sync client scenarios against a loopback WebSocket server

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devsync_core::credentials::{CredentialStore, MemoryCredentialStore};
use devsync_core::error::CredentialResult;
use devsync_core::store::{AppStore, SessionStore, StoreEvent};
use devsync_core::sync::{
    ConnectionSnapshot, ConnectionState, DeviceSyncClient, DisconnectReason, SyncSlot,
};
use devsync_core::Config;
use futures_util::SinkExt;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingStore {
    device_id: Option<String>,
    refreshes: AtomicUsize,
    logouts: AtomicUsize,
    merges: Mutex<Vec<Map<String, Value>>>,
}

impl SessionStore for RecordingStore {
    fn current_device_id(&self) -> Option<String> {
        self.device_id.clone()
    }

    fn refresh_sessions(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn force_logout(&self) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }

    fn merge_user_update(&self, fields: Map<String, Value>) {
        self.merges.lock().unwrap().push(fields);
    }
}

/// What the test server does after the handshake
enum ServerScript {
    /// Send frames, then keep the socket open until the client leaves
    SendAndHold(Vec<&'static str>),
    /// Send frames, then drop the socket
    SendAndDrop(Vec<&'static str>),
}

/// Accept one client; report the request URI it connected with
async fn spawn_server(script: ServerScript) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |req: &Request, resp: Response| {
            let _ = uri_tx.send(req.uri().to_string());
            Ok::<_, ErrorResponse>(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        let (frames, hold) = match script {
            ServerScript::SendAndHold(frames) => (frames, true),
            ServerScript::SendAndDrop(frames) => (frames, false),
        };
        for frame in frames {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }

        if hold {
            use futures_util::StreamExt;
            // Runs until the client closes
            while let Some(Ok(_)) = ws.next().await {}
        } else {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    (addr, uri_rx)
}

/// An address nothing listens on
async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn config_for(addr: SocketAddr, base_delay_ms: u64, max_attempts: u32) -> Config {
    Config {
        server_url: format!("ws://{}", addr),
        reconnect_base_delay_ms: base_delay_ms,
        reconnect_max_attempts: max_attempts,
        ..Config::default()
    }
}

fn credentials(token: &str) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_entries([("access_token", token)]))
}

async fn wait_for_state<F>(client: &DeviceSyncClient, mut predicate: F) -> ConnectionSnapshot
where
    F: FnMut(&ConnectionSnapshot) -> bool,
{
    let mut rx = client.subscribe();
    let snapshot = tokio::time::timeout(WAIT, rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for connection state")
        .expect("status channel closed");
    *snapshot
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

#[tokio::test]
async fn test_dispatches_frames_and_survives_malformed_input() {
    let (addr, uri_rx) = spawn_server(ServerScript::SendAndHold(vec![
        "not json at all",
        r#"{"type":"SESSION_UPDATE"}"#,
        r#"{"type":"DEVICE_REMOVED","payload":{"deviceId":"dev-2"}}"#,
        r#"{"type":"DATA_UPDATE","payload":{"dataType":"USER_UPDATE","data":{"name":"X"}}}"#,
        r#"{"type":"DATA_UPDATE","payload":{"dataType":"ORDER_UPDATE","data":{}}}"#,
        r#"{"type":"SOMETHING_NEW"}"#,
        r#"{"type":"DEVICE_REMOVED","payload":{"deviceId":"dev-1"}}"#,
        r#"{"type":"FORCE_LOGOUT"}"#,
    ]))
    .await;

    let store = Arc::new(RecordingStore {
        device_id: Some("dev-1".to_string()),
        ..RecordingStore::default()
    });
    let client = DeviceSyncClient::start(
        &config_for(addr, 1000, 5),
        credentials("secret token"),
        store.clone(),
    );

    wait_until(|| store.logouts.load(Ordering::SeqCst) == 2).await;

    assert_eq!(store.refreshes.load(Ordering::SeqCst), 2);
    let merges = store.merges.lock().unwrap().clone();
    assert_eq!(merges.len(), 1);
    assert_eq!(Value::Object(merges[0].clone()), json!({"name": "X"}));

    // Bad frames never closed the socket
    let status = client.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.attempts, 0);

    let uri = uri_rx.await.unwrap();
    assert_eq!(uri, "/ws?token=secret%20token");

    client.shutdown().await;
    assert_eq!(
        client.status().state,
        ConnectionState::Disconnected(DisconnectReason::Shutdown)
    );
    assert!(!client.is_active());
}

#[tokio::test]
async fn test_close_after_open_schedules_first_reconnect() {
    let (addr, _uri) = spawn_server(ServerScript::SendAndDrop(vec![])).await;

    let store = Arc::new(RecordingStore::default());
    let client = DeviceSyncClient::start(&config_for(addr, 1000, 5), credentials("tok"), store);

    wait_for_state(&client, |s| s.state == ConnectionState::Connected).await;
    let snapshot = wait_for_state(&client, |s| {
        matches!(s.state, ConnectionState::Reconnecting { .. })
    })
    .await;

    assert_eq!(
        snapshot.state,
        ConnectionState::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(1000)
        }
    );
    assert_eq!(snapshot.attempts, 1);

    // Shutdown cancels the pending timer without waiting for it
    let started = tokio::time::Instant::now();
    client.shutdown().await;
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(
        client.status().state,
        ConnectionState::Disconnected(DisconnectReason::Shutdown)
    );
    assert!(!client.is_active());
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let addr = refused_addr().await;

    let store = Arc::new(RecordingStore::default());
    let client = DeviceSyncClient::start(&config_for(addr, 5, 3), credentials("tok"), store);

    let snapshot = wait_for_state(&client, |s| s.state.is_terminal()).await;
    assert_eq!(
        snapshot.state,
        ConnectionState::Disconnected(DisconnectReason::RetriesExhausted)
    );
    assert_eq!(snapshot.attempts, 3);

    // No timer left behind: the task ends by itself
    wait_until(|| !client.is_active()).await;

    client.shutdown().await;
    assert_eq!(
        client.status().state,
        ConnectionState::Disconnected(DisconnectReason::RetriesExhausted)
    );
}

#[tokio::test]
async fn test_destroy_then_get_yields_fresh_counter() {
    let addr = refused_addr().await;
    let config = config_for(addr, 5, 50);
    let store = Arc::new(RecordingStore::default());
    let slot = SyncSlot::new(config, credentials("tok"), store);

    let first = slot.get_instance();
    wait_for_state(&first, |s| s.attempts >= 2).await;

    slot.destroy_instance().await;
    assert!(!first.is_active());
    assert!(slot.current().is_none());

    let second = slot.get_instance();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.status().attempts, 0);

    slot.destroy_instance().await;
}

#[tokio::test]
async fn test_missing_token_at_reconnect_stops_client() {
    let (addr, _uri) = spawn_server(ServerScript::SendAndDrop(vec![])).await;

    let creds = credentials("tok");
    let store = Arc::new(RecordingStore::default());
    let client = DeviceSyncClient::start(&config_for(addr, 300, 5), creds.clone(), store);

    wait_for_state(&client, |s| {
        matches!(s.state, ConnectionState::Reconnecting { .. })
    })
    .await;
    creds.remove("access_token").unwrap();

    let snapshot = wait_for_state(&client, |s| s.state.is_terminal()).await;
    assert_eq!(
        snapshot.state,
        ConnectionState::Disconnected(DisconnectReason::NoCredentials)
    );
    wait_until(|| !client.is_active()).await;
}

#[tokio::test]
async fn test_force_logout_through_app_store() {
    let (addr, _uri) =
        spawn_server(ServerScript::SendAndDrop(vec![r#"{"type":"FORCE_LOGOUT"}"#])).await;

    let config = config_for(addr, 10, 5);
    let creds = Arc::new(MemoryCredentialStore::with_entries([
        ("access_token", "tok"),
        ("device_id", "dev-1"),
    ]));
    let (store, mut events) = AppStore::new(creds.clone(), &config);
    let slot = SyncSlot::new(config, creds.clone(), store.clone());

    let client = slot.get_instance();

    let event = tokio::time::timeout(WAIT, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, StoreEvent::LoggedOut);
    assert!(!store.is_logged_in());
    assert_eq!(creds.get("device_id").unwrap(), None);

    // Server drops us; with the token gone there is nothing to reconnect with
    let snapshot = wait_for_state(&client, |s| s.state.is_terminal()).await;
    assert_eq!(
        snapshot.state,
        ConnectionState::Disconnected(DisconnectReason::NoCredentials)
    );

    slot.destroy_instance().await;
}

/// Hands out the token on the first lookup only
struct VanishingToken {
    lookups: AtomicUsize,
}

impl CredentialStore for VanishingToken {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        if key != "access_token" {
            return Ok(None);
        }
        let first = self.lookups.fetch_add(1, Ordering::SeqCst) == 0;
        Ok(first.then(|| "tok".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> CredentialResult<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> CredentialResult<()> {
        Ok(())
    }

    fn clear(&self) -> CredentialResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_token_gone_before_first_connect_is_replaced() {
    let addr = refused_addr().await;
    let creds = Arc::new(VanishingToken {
        lookups: AtomicUsize::new(0),
    });
    let store = Arc::new(RecordingStore::default());
    let slot = SyncSlot::new(config_for(addr, 5, 3), creds, store);

    let first = slot.get_instance();
    assert!(!first.is_inert());

    let snapshot = wait_for_state(&first, |s| s.state.is_terminal()).await;
    assert_eq!(
        snapshot.state,
        ConnectionState::Disconnected(DisconnectReason::NoCredentials)
    );
    wait_until(|| !first.is_active()).await;

    // A later call builds a new client instead of returning the stopped one
    let second = slot.get_instance();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.is_inert());

    slot.destroy_instance().await;
}
