//! Registry behavior under concurrency and sweeping
//!
//! These tests drive the tracking registry the way production does: many
//! request tasks appending opens in parallel with a live sweeper.

use chrono::Utc;
use mailtrace::models::{DeviceInfo, GeoInfo, OpenRecord, TrackedMessage};
use mailtrace::tracking::{RetentionSweeper, TrackingRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn open_record() -> OpenRecord {
    OpenRecord {
        ip_address: "198.51.100.7".to_string(),
        user_agent: "test-agent".to_string(),
        geo: GeoInfo::default(),
        device: DeviceInfo::default(),
        opened_at: Utc::now(),
        base_url: "http://localhost:8080".to_string(),
    }
}

fn message(tracking_id: &str, sent_at: chrono::DateTime<Utc>) -> TrackedMessage {
    TrackedMessage {
        tracking_id: tracking_id.to_string(),
        from: "sender@example.com".to_string(),
        to: vec!["rcpt@example.com".to_string()],
        subject: "subject".to_string(),
        body: "body".to_string(),
        sent_at,
        notify_on_open: false,
        notify_address: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_on_one_identifier_lose_nothing() {
    let registry = Arc::new(TrackingRegistry::new());

    let mut handles = vec![];
    for _ in 0..10 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                registry.record_open("shared", open_record());
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let history = registry.all_events("shared");
    assert_eq!(history.len(), 1000, "every concurrent open must be stored");

    let ids: HashSet<_> = history.iter().map(|event| event.id.clone()).collect();
    assert_eq!(ids.len(), 1000, "no event may be duplicated");

    let latest = registry.latest_event("shared").unwrap();
    assert_eq!(latest.id, history.last().unwrap().id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_across_identifiers() {
    let registry = Arc::new(TrackingRegistry::new());

    let mut handles = vec![];
    for task in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            let tracking_id = format!("id-{}", task % 4);
            for _ in 0..50 {
                registry.record_open(&tracking_id, open_record());
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let total: usize = (0..4)
        .map(|n| registry.all_events(&format!("id-{n}")).len())
        .sum();
    assert_eq!(total, 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweeper_interleaved_with_writers() {
    let registry = Arc::new(TrackingRegistry::new());
    let sweeper = RetentionSweeper::new(
        Arc::clone(&registry),
        Duration::from_millis(10),
        chrono::Duration::days(30),
    );
    let shutdown = sweeper.spawn();

    let mut handles = vec![];
    for _ in 0..4 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                registry.record_open("busy", open_record());
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // All events are fresh, so sweeps running alongside must keep them all
    assert_eq!(registry.all_events("busy").len(), 400);
    let _ = shutdown.send(true);
}

#[tokio::test]
async fn test_sweeper_evicts_expired_message() {
    let registry = Arc::new(TrackingRegistry::new());
    registry.register(message("expired", Utc::now() - chrono::Duration::days(31)));
    registry.register(message("fresh", Utc::now()));

    let sweeper = RetentionSweeper::new(
        Arc::clone(&registry),
        Duration::from_millis(20),
        chrono::Duration::days(30),
    );
    let shutdown = sweeper.spawn();

    sleep(Duration::from_millis(200)).await;

    assert!(registry.get_message("expired").is_none());
    assert!(registry.get_message("fresh").is_some());
    let _ = shutdown.send(true);
}

#[tokio::test]
async fn test_sweeper_stops_on_shutdown() {
    let registry = Arc::new(TrackingRegistry::new());
    let sweeper = RetentionSweeper::new(
        Arc::clone(&registry),
        Duration::from_millis(20),
        chrono::Duration::days(30),
    );
    let shutdown = sweeper.spawn();

    let _ = shutdown.send(true);
    sleep(Duration::from_millis(100)).await;

    // A message past the horizon registered after shutdown must survive:
    // no sweep may run once the loop has stopped
    registry.register(message("late", Utc::now() - chrono::Duration::days(60)));
    sleep(Duration::from_millis(100)).await;
    assert!(registry.get_message("late").is_some());
}
