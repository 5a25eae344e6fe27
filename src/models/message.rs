use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sent message under open tracking. Immutable once registered; removed
/// only by the retention sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedMessage {
    pub tracking_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub notify_on_open: bool,
    pub notify_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub notify_on_open: bool,
    #[serde(default)]
    pub notify_address: Option<String>,
}
