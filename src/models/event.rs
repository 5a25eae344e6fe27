use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic context resolved for a client address. Every field is
/// best-effort; a failed lookup leaves all of them empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub isp: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Device classification derived from the user-agent string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: String,
    pub browser: String,
    pub os: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_type: "Desktop".to_string(),
            browser: "Unknown".to_string(),
            os: "Unknown".to_string(),
        }
    }
}

/// One recorded beacon retrieval. Append-only: never mutated after the
/// registry stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenEvent {
    pub id: String,
    pub tracking_id: String,
    /// Identifier of the owning message, `None` when the beacon was
    /// retrieved for an identifier with no live registration.
    pub message_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub geo: GeoInfo,
    pub device: DeviceInfo,
    pub opened_at: DateTime<Utc>,
    pub base_url: String,
}

/// Enriched inputs for one open, fully resolved before the registry is
/// touched. Network waits (geography) happen while building this, never
/// inside the registry's critical section.
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub ip_address: String,
    pub user_agent: String,
    pub geo: GeoInfo,
    pub device: DeviceInfo,
    pub opened_at: DateTime<Utc>,
    pub base_url: String,
}
