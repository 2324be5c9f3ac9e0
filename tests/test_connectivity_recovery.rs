//! Connectivity recovery tests
//!
//! Drives the connectivity manager against scripted network and broker fakes
//! under paused tokio time, so backoff and association timing are exact.

use sensor_node::connectivity::{
    Backoff, BrokerState, ConnectivityError, ConnectivityManager, NetworkState, RetryPolicy,
};
use sensor_node::shutdown::ShutdownSignal;
use sensor_node::testing::{FakeBroker, FakeNetwork};
use sensor_node::transport::Credentials;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

fn credentials() -> Credentials {
    Credentials {
        ssid: "greenindex-lab".to_string(),
        password: Some("hunter2".to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_each_failed_attempt_waits_the_fixed_delay() {
    for failures in 0..4u32 {
        let broker = FakeBroker::failing_first(failures);
        let mut manager =
            ConnectivityManager::new(FakeNetwork::associated(), broker.clone(), credentials());
        let start = Instant::now();

        manager.ensure_connected().await.unwrap();

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(5) * failures,
            "{failures} failures only waited {elapsed:?}"
        );
        assert!(elapsed < Duration::from_secs(5) * failures + Duration::from_secs(1));
        assert_eq!(broker.client_ids().len(), failures as usize + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_every_attempt_uses_a_fresh_client_identity() {
    let broker = FakeBroker::failing_first(5);
    let mut manager = ConnectivityManager::new(FakeNetwork::associated(), broker.clone(), credentials())
        .with_client_id_prefix("ESP32Client");

    manager.ensure_connected().await.unwrap();

    let ids = broker.client_ids();
    assert_eq!(ids.len(), 6);
    assert!(ids.iter().all(|id| id.starts_with("ESP32Client-")));
    let distinct: HashSet<&String> = ids.iter().collect();
    // 16 bits of entropy; six draws collide with well under 1% probability
    assert!(distinct.len() >= 5);
    assert_eq!(
        manager.last_client_id().map(|id| id.as_str().to_string()),
        ids.last().cloned()
    );
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_timing() {
    let broker = FakeBroker::failing_first(4);
    let policy = RetryPolicy {
        max_attempts: None,
        backoff: Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(4),
            multiplier: 2.0,
        },
    };
    let mut manager = ConnectivityManager::new(FakeNetwork::associated(), broker.clone(), credentials())
        .with_retry_policy(policy);
    let start = Instant::now();

    manager.ensure_connected().await.unwrap();

    // 1 + 2 + 4 + 4 (capped)
    assert_eq!(start.elapsed(), Duration::from_secs(11));
    let gaps: Vec<Duration> = broker
        .connect_log()
        .windows(2)
        .map(|pair| pair[1].at - pair[0].at)
        .collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(4)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_bounded_policy_reports_exhaustion_and_recovers_next_call() {
    let broker = FakeBroker::failing_first(3);
    let policy = RetryPolicy {
        max_attempts: Some(2),
        backoff: Backoff::Fixed(Duration::from_secs(5)),
    };
    let mut manager = ConnectivityManager::new(FakeNetwork::associated(), broker.clone(), credentials())
        .with_retry_policy(policy);

    let first = manager.ensure_connected().await;
    assert_eq!(first, Err(ConnectivityError::RetriesExhausted { attempts: 2 }));
    assert_eq!(manager.state().broker, BrokerState::Disconnected);

    // Counting restarts per call; one failure left, then success
    manager.ensure_connected().await.unwrap();
    assert!(manager.state().is_fully_connected());
    assert_eq!(broker.client_ids().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_radio_drop_during_backoff_reassociates_before_next_attempt() {
    let network = FakeNetwork::associated();
    let broker = FakeBroker::failing_first(2).with_network(network.clone());
    let mut manager = ConnectivityManager::new(network.clone(), broker.clone(), credentials())
        .with_poll_interval(Duration::from_millis(500));
    let start = Instant::now();

    let dropper = network.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        dropper.drop_association(2);
    });

    manager.ensure_connected().await.unwrap();

    // 5s backoff, 1s re-association, 5s backoff
    assert_eq!(start.elapsed(), Duration::from_secs(11));
    assert_eq!(network.associate_calls(), 1);
    let log = broker.connect_log();
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|record| record.network_was_up));
    assert_eq!(manager.state().network, NetworkState::Associated);
    assert_eq!(manager.stats().associations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_association_wait() {
    let network = FakeNetwork::associates_after(u32::MAX);
    let broker = FakeBroker::new();
    let (trigger, shutdown) = ShutdownSignal::channel();
    let mut manager = ConnectivityManager::new(network, broker.clone(), credentials())
        .with_shutdown(shutdown);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        let _ = trigger.send(true);
    });

    let result = manager.ensure_connected().await;

    assert_eq!(result, Err(ConnectivityError::ShutdownRequested));
    assert!(broker.client_ids().is_empty());
}
