use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::enrich::RequestEnricher;
use crate::models::{OpenEvent, OpenRecord, SendRequest};
use crate::notify::{NotificationDispatcher, OpenReport};
use crate::service::{MessageService, SendError};
use crate::tracking::TrackingRegistry;

pub struct AppState {
    pub config: Config,
    pub registry: Arc<TrackingRegistry>,
    pub enricher: RequestEnricher,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub service: MessageService,
}

/// 1x1 GIF served for every beacon retrieval.
static TRACKING_PIXEL: [u8; 35] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02,
    0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub base_url: String,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub message: String,
    pub tracking_id: String,
    pub base_url: String,
}

fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::HOST).and_then(|value| value.to_str().ok())
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "mailtrace".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.app.env.clone(),
        base_url: state.config.base_url(request_host(&headers)),
    })
}

/// Beacon retrieval: enrich, record, conditionally notify, and always
/// serve the pixel. Nothing underneath this handler is allowed to change
/// the response the mail client sees.
pub async fn track_open(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let base_url = state.config.base_url(request_host(&headers));

    // Enrichment (including the geography wait) completes before the
    // registry is touched.
    let context = state.enricher.enrich(&headers, addr.ip()).await;

    let event = state.registry.record_open(
        &tracking_id,
        OpenRecord {
            ip_address: context.ip_address,
            user_agent: context.user_agent,
            geo: context.geo,
            device: context.device,
            opened_at: Utc::now(),
            base_url,
        },
    );

    info!(
        tracking_id = %event.tracking_id,
        ip = %event.ip_address,
        city = event.geo.city.as_deref().unwrap_or(""),
        country = event.geo.country.as_deref().unwrap_or(""),
        owned = event.message_id.is_some(),
        "open recorded"
    );

    dispatch_notification(&state, &tracking_id, &event);

    pixel_response()
}

/// Fire the open notification on its own task so a slow transport cannot
/// delay the pixel. Failures are logged, never surfaced.
fn dispatch_notification(state: &Arc<AppState>, tracking_id: &str, event: &OpenEvent) {
    let Some(message) = state.registry.get_message(tracking_id) else {
        return;
    };
    if !message.notify_on_open {
        return;
    }
    let Some(notify_address) = message.notify_address.clone() else {
        warn!(tracking_id, "notify_on_open set without a notify address");
        return;
    };

    let dispatcher = Arc::clone(&state.dispatcher);
    let event = event.clone();
    tokio::spawn(async move {
        // Held for the dispatch lifetime; this path has no external
        // cancellation beyond the dispatcher's own timeout.
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let subject = format!("Message opened: {}", message.subject);
        let report = OpenReport {
            message_subject: message.subject.clone(),
            message_recipients: message.to.join(", "),
            event,
        };

        if let Err(err) = dispatcher
            .notify(&[notify_address], &subject, &report, cancel_rx)
            .await
        {
            warn!(tracking_id = %report.event.tracking_id, error = %err, "open notification failed");
        }
    });
}

fn pixel_response() -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        TRACKING_PIXEL.as_slice(),
    )
        .into_response()
}

/// Send a message with tracking enabled
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SendRequest>,
) -> Result<Json<SendResponse>, (StatusCode, Json<ErrorResponse>)> {
    let base_url = state.config.base_url(request_host(&headers));

    match state.service.send_tracked(&payload, &base_url).await {
        Ok(outcome) => Ok(Json(SendResponse {
            message: "Message sent successfully".to_string(),
            tracking_id: outcome.tracking_id,
            base_url,
        })),
        Err(err @ (SendError::NoRecipients | SendError::InvalidRecipient(_))) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )),
        Err(err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )),
    }
}

/// Latest open for a tracking identifier
pub async fn latest_event(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> Result<Json<OpenEvent>, (StatusCode, Json<ErrorResponse>)> {
    match state.registry.latest_event(&tracking_id) {
        Some(event) => Ok(Json(event)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Tracking data not found".to_string(),
            }),
        )),
    }
}

/// Full open history for a tracking identifier
pub async fn all_events(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> Json<Vec<OpenEvent>> {
    Json(state.registry.all_events(&tracking_id))
}
