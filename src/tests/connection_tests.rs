use std::time::Duration;

use serde_json::json;
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};

use super::mock::{test_config, MockConnector, Outcome};
use crate::{
    ws::{ClientEvent, ConnectionManager, ConnectionState, EventKind, ServerEvent},
    Error, WsError,
};

// =========================================================================
// Connect / disconnect
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_connect_requests_orders() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    manager.connect().await.unwrap();
    assert!(manager.is_connected());

    let mut server = servers.recv().await.unwrap();
    assert_eq!(server.next_sent().await, Some(ClientEvent::GetOrders));

    // Already connected: no second handshake
    manager.connect().await.unwrap();
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initial_connect_failure_is_not_retried() {
    let (connector, _servers) = MockConnector::new();
    connector.set_fallback(Outcome::Refuse("connection refused"));
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    let err = manager.connect().await.unwrap_err();
    assert!(matches!(err, Error::Ws(WsError::Connection(_))));

    let status = manager.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(status.last_error.unwrap().contains("connection refused"));

    time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(manager.status().state, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_link() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    manager.connect().await.unwrap();
    let server = servers.recv().await.unwrap();

    manager.disconnect().await.unwrap();
    assert!(server.is_closed());
    assert_eq!(manager.status().state, ConnectionState::Disconnected);

    time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_disconnect() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    manager.connect().await.unwrap();
    let _first = servers.recv().await.unwrap();
    manager.disconnect().await.unwrap();

    manager.connect().await.unwrap();
    let mut second = servers.recv().await.unwrap();
    assert!(manager.is_connected());
    assert_eq!(second.next_sent().await, Some(ClientEvent::GetOrders));
    assert_eq!(connector.attempts(), 2);
}

// =========================================================================
// Heartbeat
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_answered_pings_keep_connection() {
    let (connector, mut servers) = MockConnector::new();
    connector.set_auto_pong(true);
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    manager.connect().await.unwrap();
    let mut server = servers.recv().await.unwrap();

    time::sleep(Duration::from_secs(181)).await;
    assert!(manager.is_connected());
    assert_eq!(connector.attempts(), 1);

    let pings = server
        .drain_sent()
        .into_iter()
        .filter(|event| *event == ClientEvent::Ping)
        .count();
    assert_eq!(pings, 6);
}

#[tokio::test(start_paused = true)]
async fn test_missing_pong_triggers_reconnect() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());
    let mut status = manager.watch_status();

    manager.connect().await.unwrap();
    let first = servers.recv().await.unwrap();

    time::sleep(Duration::from_secs(59)).await;
    assert!(manager.is_connected());

    status
        .wait_for(|s| s.state == ConnectionState::Reconnecting)
        .await
        .unwrap();
    assert!(first.is_closed());
    assert_eq!(
        manager.status().last_error.as_deref(),
        Some("heartbeat timeout")
    );

    let mut second = servers.recv().await.unwrap();
    status.wait_for(|s| s.is_connected()).await.unwrap();
    assert_eq!(second.next_sent().await, Some(ClientEvent::GetOrders));

    let current = manager.status();
    assert_eq!(current.attempts, 0);
    assert_eq!(current.reconnection_count, 1);
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pong_refreshes_liveness() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    manager.connect().await.unwrap();
    let server = servers.recv().await.unwrap();

    time::sleep(Duration::from_secs(50)).await;
    server.emit(ServerEvent::Pong);
    time::sleep(Duration::from_secs(50)).await;

    // 100s since connect, 50s since the pong
    assert!(manager.is_connected());
    assert_eq!(connector.attempts(), 1);
}

// =========================================================================
// Reconnection policy
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_read_error_triggers_reconnect() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());
    let mut status = manager.watch_status();

    manager.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    server.fail("connection reset by peer");

    status
        .wait_for(|s| s.state == ConnectionState::Reconnecting)
        .await
        .unwrap();
    let current = manager.status();
    assert_eq!(current.attempts, 1);
    assert_eq!(current.next_retry_in, Some(Duration::from_secs(1)));
    assert!(current
        .last_error
        .unwrap()
        .contains("connection reset by peer"));

    status.wait_for(|s| s.is_connected()).await.unwrap();
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_until_failed() {
    let (connector, mut servers) = MockConnector::new();
    let mut config = test_config();
    config.reconnect.max_attempts = 3;
    let manager = ConnectionManager::with_connector(config, connector.clone());
    let mut status = manager.watch_status();

    manager.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    connector.set_fallback(Outcome::Refuse("server down"));

    let lost_at = Instant::now();
    server.close();

    status
        .wait_for(|s| s.state == ConnectionState::Failed)
        .await
        .unwrap();

    // 1s + 2s + 4s of backoff, then the budget is spent
    let elapsed = lost_at.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(8), "elapsed {elapsed:?}");
    assert_eq!(connector.attempts(), 4);

    time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(connector.attempts(), 4);

    let current = manager.status();
    assert_eq!(current.state, ConnectionState::Failed);
    assert_eq!(current.attempts, 3);
    assert_eq!(current.next_retry_in, None);
}

#[tokio::test(start_paused = true)]
async fn test_manual_disconnect_cancels_reconnect() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());
    let mut status = manager.watch_status();

    manager.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    connector.set_fallback(Outcome::Refuse("server down"));
    server.close();

    status
        .wait_for(|s| s.state == ConnectionState::Reconnecting)
        .await
        .unwrap();
    manager.disconnect().await.unwrap();

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(manager.status().state, ConnectionState::Disconnected);
}

// =========================================================================
// Visibility-driven resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_resume_after_failure() {
    let (connector, mut servers) = MockConnector::new();
    let mut config = test_config();
    config.reconnect.max_attempts = 1;
    let manager = ConnectionManager::with_connector(config, connector.clone());
    let mut status = manager.watch_status();

    manager.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    connector.script([Outcome::Refuse("server down")]);
    server.close();

    status
        .wait_for(|s| s.state == ConnectionState::Failed)
        .await
        .unwrap();
    assert_eq!(connector.attempts(), 2);

    manager.resume().unwrap();
    status.wait_for(|s| s.is_connected()).await.unwrap();
    assert_eq!(connector.attempts(), 3);
    assert_eq!(manager.status().attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_resume_stays_failed() {
    let (connector, mut servers) = MockConnector::new();
    let mut config = test_config();
    config.reconnect.max_attempts = 1;
    let manager = ConnectionManager::with_connector(config, connector.clone());
    let mut status = manager.watch_status();

    manager.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    connector.set_fallback(Outcome::Refuse("server down"));
    server.close();
    status
        .wait_for(|s| s.state == ConnectionState::Failed)
        .await
        .unwrap();

    manager.resume().unwrap();
    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempts(), 3);
    assert_eq!(manager.status().state, ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_resume_ignored_after_manual_disconnect() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    manager.connect().await.unwrap();
    let _server = servers.recv().await.unwrap();
    manager.disconnect().await.unwrap();

    manager.resume().unwrap();
    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(manager.status().state, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_resume_ignored_while_connected() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector.clone());

    manager.connect().await.unwrap();
    let _server = servers.recv().await.unwrap();

    manager.resume().unwrap();
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connector.attempts(), 1);
    assert!(manager.is_connected());
}

// =========================================================================
// Event routing and outbound events
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_events_routed_by_kind() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector);

    let (tx, mut rx) = mpsc::unbounded_channel();
    manager.on(EventKind::NewOrder, tx).unwrap();
    manager.connect().await.unwrap();
    let mut server = servers.recv().await.unwrap();
    assert_eq!(server.next_sent().await, Some(ClientEvent::GetOrders));

    server.emit_named("new_order", json!({"id": 1}));
    server.emit_named("orders_list", json!([]));
    server.emit_named("menu_changed", json!({}));
    server.emit_named("new_order", json!({"id": 2}));

    assert_eq!(rx.recv().await, Some(ServerEvent::NewOrder(json!({"id": 1}))));
    assert_eq!(rx.recv().await, Some(ServerEvent::NewOrder(json!({"id": 2}))));

    // Re-registering replaces the previous handler
    let (replacement, mut replacement_rx) = mpsc::unbounded_channel();
    manager.on(EventKind::NewOrder, replacement).unwrap();
    manager.request_orders().unwrap();
    assert_eq!(server.next_sent().await, Some(ClientEvent::GetOrders));

    server.emit_named("new_order", json!({"id": 3}));
    assert_eq!(
        replacement_rx.recv().await,
        Some(ServerEvent::NewOrder(json!({"id": 3})))
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_update_order_status_is_sent() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector);

    manager.connect().await.unwrap();
    let mut server = servers.recv().await.unwrap();
    assert_eq!(server.next_sent().await, Some(ClientEvent::GetOrders));

    manager.update_order_status(42, "completed").unwrap();
    assert_eq!(
        server.next_sent().await,
        Some(ClientEvent::update_order_status(42, "completed"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_outbound_dropped_while_disconnected() {
    let (connector, mut servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector);

    manager.update_order_status(7, "cancelled").unwrap();
    manager.request_orders().unwrap();

    manager.connect().await.unwrap();
    let mut server = servers.recv().await.unwrap();
    assert_eq!(server.next_sent().await, Some(ClientEvent::GetOrders));
    assert!(server.drain_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_manager_stops_task() {
    let (connector, _servers) = MockConnector::new();
    let manager = ConnectionManager::with_connector(test_config(), connector);
    let status = manager.watch_status();
    drop(manager);

    time::sleep(Duration::from_millis(10)).await;
    assert!(status.has_changed().is_err());
}
