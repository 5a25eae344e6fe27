//! Best-effort open notifications with bounded dispatch

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time;
use tracing::info;

use crate::models::OpenEvent;

/// Outbound mail capability. Both the tracked-send path and open
/// notifications go through this seam so tests can substitute a
/// deterministic double.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Sender wired when no real transport is configured: sends are written to
/// the log instead of leaving the process.
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> anyhow::Result<()> {
        info!(recipients = ?to, subject, body_len = body.len(), "outbound mail (log transport)");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
    #[error("notification cancelled")]
    Cancelled,
    #[error("notification transport failed: {0}")]
    Transport(#[source] anyhow::Error),
    #[error("notification task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Payload rendered into the open-report body.
#[derive(Debug, Clone)]
pub struct OpenReport {
    pub message_subject: String,
    pub message_recipients: String,
    pub event: OpenEvent,
}

/// Sends open reports through the injected transport, bounded by a timeout
/// and an external cancellation signal.
///
/// Transmission runs on its own task; when the timeout or cancellation
/// fires first, the dispatcher returns immediately and the in-flight send
/// is abandoned, not awaited. Callers treat every error here as non-fatal:
/// the open event is already stored by the time dispatch starts.
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>, timeout: Duration) -> Self {
        Self { sender, timeout }
    }

    /// Dispatch one open report. `cancel` is honored for as long as its
    /// sender half is alive; dropping the sender counts as cancellation.
    pub async fn notify(
        &self,
        recipients: &[String],
        subject: &str,
        report: &OpenReport,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), DispatchError> {
        let body = render_report(report);
        let sender = Arc::clone(&self.sender);
        let to = recipients.to_vec();
        let subject = subject.to_string();

        let mut transmission =
            tokio::spawn(async move { sender.send(&to, &subject, &body).await });

        tokio::select! {
            result = &mut transmission => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(DispatchError::Transport(err)),
                Err(err) => Err(DispatchError::Join(err)),
            },
            _ = time::sleep(self.timeout) => Err(DispatchError::Timeout(self.timeout)),
            _ = cancel.changed() => Err(DispatchError::Cancelled),
        }
    }
}

fn render_report(report: &OpenReport) -> String {
    let event = &report.event;
    let location = [
        event.geo.city.as_deref(),
        event.geo.region.as_deref(),
        event.geo.country.as_deref(),
    ]
    .iter()
    .flatten()
    .copied()
    .collect::<Vec<_>>()
    .join(", ");

    format!(
        "Your message \"{subject}\" to {recipients} was opened.\n\
         \n\
         Opened at: {opened_at}\n\
         IP address: {ip}\n\
         Location: {location}\n\
         ISP: {isp}\n\
         Device: {device} / {browser} / {os}\n\
         Tracking link: {base_url}/track/{tracking_id}\n",
        subject = report.message_subject,
        recipients = report.message_recipients,
        opened_at = event.opened_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ip = event.ip_address,
        location = if location.is_empty() { "unknown" } else { location.as_str() },
        isp = event.geo.isp.as_deref().unwrap_or("unknown"),
        device = event.device.device_type,
        browser = event.device.browser,
        os = event.device.os,
        base_url = event.base_url,
        tracking_id = event.tracking_id,
    )
}
