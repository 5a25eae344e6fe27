//! End-to-end tests over the HTTP surface: beacon, send, and query routes.

use async_trait::async_trait;
use chrono::Utc;
use mailtrace::api::{create_router, AppState};
use mailtrace::config::{
    AppConfig, Config, GeoConfig, MailConfig, NotifyConfig, RetentionConfig, ServerConfig,
};
use mailtrace::enrich::{GeoProvider, RequestEnricher};
use mailtrace::models::{GeoInfo, OpenEvent, TrackedMessage};
use mailtrace::notify::{NotificationDispatcher, NotificationSender};
use mailtrace::service::MessageService;
use mailtrace::tracking::TrackingRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct StubGeo;

#[async_trait]
impl GeoProvider for StubGeo {
    async fn lookup(&self, _ip: &str) -> GeoInfo {
        GeoInfo {
            country: Some("Testland".to_string()),
            ..GeoInfo::default()
        }
    }
}

struct ChannelSender {
    tx: mpsc::UnboundedSender<(Vec<String>, String, String)>,
}

#[async_trait]
impl NotificationSender for ChannelSender {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()> {
        let _ = self
            .tx
            .send((to.to_vec(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        app: AppConfig {
            env: "development".to_string(),
            base_url: "http://beacon.test".to_string(),
        },
        mail: MailConfig {
            from: "from@example.com".to_string(),
        },
        geo: GeoConfig {
            url: "http://127.0.0.1:9/json".to_string(),
            timeout_secs: 1,
        },
        notify: NotifyConfig { timeout_secs: 5 },
        retention: RetentionConfig {
            horizon_days: 30,
            sweep_interval_secs: 3600,
        },
    }
}

struct TestApp {
    addr: SocketAddr,
    registry: Arc<TrackingRegistry>,
    mail_rx: mpsc::UnboundedReceiver<(Vec<String>, String, String)>,
}

async fn spawn_app() -> TestApp {
    let (tx, mail_rx) = mpsc::unbounded_channel();
    let sender: Arc<dyn NotificationSender> = Arc::new(ChannelSender { tx });
    let registry = Arc::new(TrackingRegistry::new());

    let state = Arc::new(AppState {
        config: test_config(),
        registry: Arc::clone(&registry),
        enricher: RequestEnricher::new(Arc::new(StubGeo)),
        dispatcher: Arc::new(NotificationDispatcher::new(
            Arc::clone(&sender),
            Duration::from_secs(5),
        )),
        service: MessageService::new(
            Arc::clone(&registry),
            Arc::clone(&sender),
            "from@example.com".to_string(),
            Duration::from_secs(5),
        ),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr,
        registry,
        mail_rx,
    }
}

#[tokio::test]
async fn test_beacon_always_serves_pixel_and_records_ownerless_event() {
    let app = spawn_app().await;
    let url = format!("http://{}/track/neverseen", app.addr);

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/gif"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 35);
    assert_eq!(&body[..6], b"GIF89a");

    let event = app.registry.latest_event("neverseen").unwrap();
    assert!(event.message_id.is_none());
    assert_eq!(event.geo.country.as_deref(), Some("Testland"));
    assert_eq!(event.base_url, "http://beacon.test");
}

#[tokio::test]
async fn test_query_miss_is_404_until_first_open() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let miss = client
        .get(format!("http://{}/api/tracking/ghost", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(miss.status(), 404);

    reqwest::get(format!("http://{}/track/ghost", app.addr))
        .await
        .unwrap();

    let hit = client
        .get(format!("http://{}/api/tracking/ghost", app.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(hit.status(), 200);
    let event: OpenEvent = hit.json().await.unwrap();
    assert_eq!(event.tracking_id, "ghost");
    assert!(event.message_id.is_none());
}

#[tokio::test]
async fn test_send_then_open_links_event_to_message() {
    let mut app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/api/send", app.addr))
        .json(&serde_json::json!({
            "to": ["rcpt@example.com"],
            "subject": "launch",
            "body": "<p>news</p>"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let sent: serde_json::Value = response.json().await.unwrap();
    let tracking_id = sent["tracking_id"].as_str().unwrap().to_string();

    // Outbound mail carried the beacon for this identifier
    let (_, _, body) = app.mail_rx.recv().await.unwrap();
    assert!(body.contains(&format!("http://beacon.test/track/{tracking_id}")));

    reqwest::get(format!("http://{}/track/{}", app.addr, tracking_id))
        .await
        .unwrap();

    let events: Vec<OpenEvent> = client
        .get(format!(
            "http://{}/api/tracking/{}/events",
            app.addr, tracking_id
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message_id.as_deref(), Some(tracking_id.as_str()));
}

#[tokio::test]
async fn test_open_with_notify_preference_dispatches_report() {
    let mut app = spawn_app().await;

    app.registry.register(TrackedMessage {
        tracking_id: "notifyme".to_string(),
        from: "from@example.com".to_string(),
        to: vec!["rcpt@example.com".to_string()],
        subject: "watched".to_string(),
        body: "body".to_string(),
        sent_at: Utc::now(),
        notify_on_open: true,
        notify_address: Some("owner@example.com".to_string()),
    });

    let response = reqwest::get(format!("http://{}/track/notifyme", app.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let (to, subject, body) =
        tokio::time::timeout(Duration::from_secs(5), app.mail_rx.recv())
            .await
            .expect("notification should arrive")
            .unwrap();
    assert_eq!(to, vec!["owner@example.com".to_string()]);
    assert_eq!(subject, "Message opened: watched");
    assert!(body.contains("/track/notifyme"));
}

#[tokio::test]
async fn test_invalid_recipient_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/api/send", app.addr))
        .json(&serde_json::json!({
            "to": ["not-an-address"],
            "subject": "x",
            "body": "y"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let err: serde_json::Value = response.json().await.unwrap();
    assert!(err["error"]
        .as_str()
        .unwrap()
        .contains("invalid recipient address"));
}

#[tokio::test]
async fn test_health_reports_configured_base_url() {
    let app = spawn_app().await;
    let health: serde_json::Value = reqwest::get(format!("http://{}/health", app.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "mailtrace");
    assert_eq!(health["base_url"], "http://beacon.test");
}
