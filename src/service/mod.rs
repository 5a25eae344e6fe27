//! Tracked-send flow: mint an identifier, embed the beacon, transmit,
//! register.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;

use crate::models::{SendRequest, TrackedMessage};
use crate::notify::NotificationSender;
use crate::tracking::{new_tracking_id, TrackingRegistry};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("no recipients given")]
    NoRecipients,
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("mail transport timed out after {0:?}")]
    TransportTimeout(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug)]
pub struct SendOutcome {
    pub tracking_id: String,
    pub tracked_body: String,
}

pub struct MessageService {
    registry: Arc<TrackingRegistry>,
    sender: Arc<dyn NotificationSender>,
    from_address: String,
    send_timeout: Duration,
}

impl MessageService {
    pub fn new(
        registry: Arc<TrackingRegistry>,
        sender: Arc<dyn NotificationSender>,
        from_address: String,
        send_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            sender,
            from_address,
            send_timeout,
        }
    }

    /// Send a message with an embedded open beacon and register it for
    /// tracking. Recipient validation and identifier minting happen before
    /// any side effect; the message is registered only after the transport
    /// accepts it.
    pub async fn send_tracked(
        &self,
        request: &SendRequest,
        base_url: &str,
    ) -> Result<SendOutcome, SendError> {
        if request.to.is_empty() {
            return Err(SendError::NoRecipients);
        }
        for address in &request.to {
            if !is_valid_email(address) {
                return Err(SendError::InvalidRecipient(address.clone()));
            }
        }

        let tracking_id = new_tracking_id()?;
        let tracked_body = embed_beacon(&request.body, &tracking_id, base_url);

        time::timeout(
            self.send_timeout,
            self.sender.send(&request.to, &request.subject, &tracked_body),
        )
        .await
        .map_err(|_| SendError::TransportTimeout(self.send_timeout))?
        .map_err(SendError::Other)?;

        self.registry.register(TrackedMessage {
            tracking_id: tracking_id.clone(),
            from: self.from_address.clone(),
            to: request.to.clone(),
            subject: request.subject.clone(),
            body: request.body.clone(),
            sent_at: Utc::now(),
            notify_on_open: request.notify_on_open,
            notify_address: request.notify_address.clone(),
        });

        Ok(SendOutcome {
            tracking_id,
            tracked_body,
        })
    }
}

fn embed_beacon(body: &str, tracking_id: &str, base_url: &str) -> String {
    format!(
        "{body}\n<img src=\"{base_url}/track/{tracking_id}\" \
         width=\"1\" height=\"1\" alt=\"\" style=\"display:none\" />"
    )
}

/// Loose structural check: local part, one @, dotted domain. The SMTP
/// server stays the real arbiter of deliverability.
fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((name, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !name.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}
