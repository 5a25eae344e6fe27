use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub mail: MailConfig,
    pub geo: GeoConfig,
    pub notify: NotifyConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    /// Static base URL override. Empty means derive it per request.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub horizon_days: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let base_url = std::env::var("BASE_URL").unwrap_or_default();

        let from = std::env::var("MAIL_FROM")
            .unwrap_or_else(|_| "no-reply@localhost.localdomain".to_string());

        let geo_url =
            std::env::var("GEO_URL").unwrap_or_else(|_| "http://ip-api.com/json".to_string());

        Ok(Config {
            server: ServerConfig { host, port },
            app: AppConfig { env, base_url },
            mail: MailConfig { from },
            geo: GeoConfig {
                url: geo_url,
                timeout_secs: env_u64("GEO_TIMEOUT_SECS", 5),
            },
            notify: NotifyConfig {
                timeout_secs: env_u64("NOTIFY_TIMEOUT_SECS", 10),
            },
            retention: RetentionConfig {
                horizon_days: env_u64("RETENTION_DAYS", 30) as i64,
                sweep_interval_secs: env_u64("SWEEP_INTERVAL_SECS", 3600),
            },
        })
    }

    /// Base URL to embed in beacons and report back to callers. The static
    /// override wins; in production the request host is trusted next;
    /// development falls back to localhost.
    pub fn base_url(&self, request_host: Option<&str>) -> String {
        if !self.app.base_url.is_empty() {
            return self.app.base_url.clone();
        }

        if self.app.env == "production" {
            if let Some(host) = request_host {
                return format!("https://{host}");
            }
        }

        format!("http://localhost:{}", self.server.port)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!(key, value = %value, "unparsable numeric setting, using default");
            default
        }),
        Err(_) => default,
    }
}
