//! IP-to-location resolution against an external geolocation endpoint

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::models::GeoInfo;

/// Geography lookup capability. Implementations must degrade to an empty
/// `GeoInfo` instead of failing; geography is never allowed to block an
/// open from being recorded.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup(&self, ip: &str) -> GeoInfo;
}

/// Response shape of the ip-api.com JSON endpoint.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(rename = "regionName", default)]
    region_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Production lookup against an ip-api.com compatible endpoint, bounded by
/// a short client timeout so a slow upstream cannot stall enrichment.
pub struct IpApiGeoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl IpApiGeoProvider {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, ip: &str) -> anyhow::Result<GeoInfo> {
        let url = format!("{}/{}", self.base_url, ip);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let data: IpApiResponse = response.json().await?;

        if data.status != "success" {
            anyhow::bail!("endpoint returned status {:?}", data.status);
        }

        Ok(GeoInfo {
            country: data.country,
            region: data.region_name,
            city: data.city,
            isp: data.isp,
            lat: data.lat,
            lon: data.lon,
        })
    }
}

#[async_trait]
impl GeoProvider for IpApiGeoProvider {
    async fn lookup(&self, ip: &str) -> GeoInfo {
        match self.fetch(ip).await {
            Ok(geo) => geo,
            Err(err) => {
                warn!(ip, error = %err, "geo lookup failed, recording unknown geography");
                GeoInfo::default()
            }
        }
    }
}
