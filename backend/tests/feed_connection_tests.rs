mod support;

use std::time::Duration;
use tokio::sync::{mpsc, watch};

use eqo_rust::feed::{
    ConnectionOutcome, Disconnect, FeedConnection, FeedFrame, FeedStore, FeedUpdate, HistoryLimits,
};
use eqo_rust::models::EventIdentity;
use support::{feed_time, quake_frame, ScriptedTransport, Session};

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

fn abnormal(reason: &str) -> FeedFrame {
    FeedFrame::Closed(Disconnect::Abnormal {
        reason: reason.to_string(),
    })
}

fn connection(transport: std::sync::Arc<ScriptedTransport>) -> FeedConnection {
    FeedConnection::new(transport, "wss://feed.test/ws", RECONNECT_DELAY)
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_schedules_one_reconnect_after_delay() {
    let transport = ScriptedTransport::new(vec![
        Session::Frames(vec![abnormal("connection reset")]),
        Session::Frames(vec![]),
    ]);
    let connection = connection(transport.clone());
    let stats = connection.stats();
    let (updates, _updates_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown) = watch::channel(false);

    tokio::spawn(connection.run(FeedStore::new(HistoryLimits::default()), updates, shutdown));

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(stats.snapshot().reconnects_scheduled, 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(stats.snapshot().connects, 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.attempts(), 2);
    assert_eq!(stats.snapshot().reconnects_scheduled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_clean_close_schedules_no_reconnect() {
    let transport = ScriptedTransport::new(vec![
        Session::Frames(vec![FeedFrame::Closed(Disconnect::Clean)]),
        Session::Frames(vec![]),
    ]);
    let connection = connection(transport.clone());
    let stats = connection.stats();
    let (updates, _updates_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown) = watch::channel(false);

    let outcome = connection
        .run(FeedStore::new(HistoryLimits::default()), updates, shutdown)
        .await;
    assert_eq!(outcome, ConnectionOutcome::ClosedCleanly);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(stats.snapshot().reconnects_scheduled, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connects_retry_at_fixed_delay() {
    let transport = ScriptedTransport::new(vec![
        Session::Fail,
        Session::Fail,
        Session::Frames(vec![]),
    ]);
    let connection = connection(transport.clone());
    let stats = connection.stats();
    let (updates, _updates_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown) = watch::channel(false);

    tokio::spawn(connection.run(FeedStore::new(HistoryLimits::default()), updates, shutdown));

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(transport.attempts(), 2);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(transport.attempts(), 3);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.connects, 1);
    assert_eq!(snapshot.reconnects_scheduled, 2);
    assert_eq!(snapshot.connect_failures, 2);
    assert_eq!(snapshot.non_retryable_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_connect_failure_is_counted_and_still_retried() {
    let transport = ScriptedTransport::new(vec![
        Session::Reject,
        Session::Fail,
        Session::Frames(vec![]),
    ]);
    let connection = connection(transport.clone());
    let stats = connection.stats();
    let (updates, _updates_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown) = watch::channel(false);

    tokio::spawn(connection.run(FeedStore::new(HistoryLimits::default()), updates, shutdown));

    tokio::time::sleep(Duration::from_millis(6100)).await;
    assert_eq!(transport.attempts(), 3);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.connects, 1);
    assert_eq!(snapshot.connect_failures, 2);
    assert_eq!(snapshot.non_retryable_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_sends_intentional_close_and_never_reconnects() {
    let transport = ScriptedTransport::single(vec![]);
    let connection = connection(transport.clone());
    let (updates, _updates_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown) = watch::channel(false);

    let task = tokio::spawn(connection.run(FeedStore::new(HistoryLimits::default()), updates, shutdown));
    tokio::time::sleep(Duration::from_millis(10)).await;

    shutdown_tx.send_replace(true);
    assert_eq!(task.await.unwrap(), ConnectionOutcome::Stopped);
    assert_eq!(transport.closes(), vec![(1000, "monitor stopped".to_string())]);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_reconnect_delay_stops_immediately() {
    let transport = ScriptedTransport::new(vec![Session::Fail, Session::Frames(vec![])]);
    let connection = connection(transport.clone());
    let (updates, _updates_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown) = watch::channel(false);

    let task = tokio::spawn(connection.run(FeedStore::new(HistoryLimits::default()), updates, shutdown));
    tokio::time::sleep(Duration::from_secs(1)).await;

    shutdown_tx.send_replace(true);
    assert_eq!(task.await.unwrap(), ConnectionOutcome::Stopped);
    assert_eq!(transport.attempts(), 1);
    assert!(transport.closes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_messages_applied_in_receipt_order_and_bad_ones_dropped() {
    let first = feed_time(20);
    let second = feed_time(10);
    let transport = ScriptedTransport::single(vec![
        quake_frame(&first, 30),
        FeedFrame::Text("{not json".to_string()),
        FeedFrame::Text(r#"{"code": 9611, "time": "x"}"#.to_string()),
        quake_frame(&second, 40),
    ]);
    let connection = connection(transport);
    let stats = connection.stats();
    let store = FeedStore::new(HistoryLimits::default());
    let (updates, mut updates_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown) = watch::channel(false);

    tokio::spawn(connection.run(store.clone(), updates, shutdown));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut received = Vec::new();
    while let Ok(update) = updates_rx.try_recv() {
        received.push(update);
    }
    assert_eq!(received.len(), 4);
    assert!(matches!(received[1], FeedUpdate::Dropped { .. }));
    assert!(matches!(received[2], FeedUpdate::Dropped { .. }));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.messages, 4);
    assert_eq!(snapshot.dropped, 2);

    assert_eq!(store.latest().unwrap().identity(), EventIdentity::new(second.clone()));
    assert_eq!(store.history_len(), 2);
}
