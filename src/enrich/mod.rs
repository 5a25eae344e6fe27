//! Request enrichment: client IP, geography, and device classification

pub mod device;
mod geo;
pub mod ip_extractor;

pub use geo::{GeoProvider, IpApiGeoProvider};

use axum::http::{header, HeaderMap};
use std::net::IpAddr;
use std::sync::Arc;

use crate::models::{DeviceInfo, GeoInfo};

/// Everything an open event needs from the raw request, fully resolved.
#[derive(Debug, Clone)]
pub struct EnrichedContext {
    pub ip_address: String,
    pub user_agent: String,
    pub geo: GeoInfo,
    pub device: DeviceInfo,
}

/// Turns a raw beacon request into an [`EnrichedContext`]. Pure except for
/// the geography call; never touches registry state.
pub struct RequestEnricher {
    geo: Arc<dyn GeoProvider>,
}

impl RequestEnricher {
    pub fn new(geo: Arc<dyn GeoProvider>) -> Self {
        Self { geo }
    }

    /// Resolve the client address, look up its geography, and classify the
    /// user-agent. The geography wait happens here, before the caller
    /// enters the registry.
    pub async fn enrich(&self, headers: &HeaderMap, socket_addr: IpAddr) -> EnrichedContext {
        let ip = ip_extractor::extract_client_ip(headers, socket_addr);
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let geo = self.geo.lookup(&ip.to_string()).await;
        let device = device::classify_user_agent(&user_agent);

        EnrichedContext {
            ip_address: ip.to_string(),
            user_agent,
            geo,
            device,
        }
    }
}
