use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use mailtrace::api::{create_router, AppState};
use mailtrace::config::Config;
use mailtrace::enrich::{IpApiGeoProvider, RequestEnricher};
use mailtrace::notify::{LogSender, NotificationDispatcher, NotificationSender};
use mailtrace::service::MessageService;
use mailtrace::tracking::{RetentionSweeper, TrackingRegistry};

#[derive(Parser)]
#[command(name = "mailtrace")]
#[command(about = "Email open-tracking service", long_about = None)]
struct Cli {
    /// Override the listen port from the environment
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    info!(env = %config.app.env, "loaded configuration");

    let registry = Arc::new(TrackingRegistry::new());
    let sender: Arc<dyn NotificationSender> = Arc::new(LogSender);

    let geo = Arc::new(IpApiGeoProvider::new(
        &config.geo.url,
        Duration::from_secs(config.geo.timeout_secs),
    )?);
    let enricher = RequestEnricher::new(geo);

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&sender),
        Duration::from_secs(config.notify.timeout_secs),
    ));
    let service = MessageService::new(
        Arc::clone(&registry),
        Arc::clone(&sender),
        config.mail.from.clone(),
        Duration::from_secs(config.notify.timeout_secs),
    );

    let sweeper = RetentionSweeper::new(
        Arc::clone(&registry),
        Duration::from_secs(config.retention.sweep_interval_secs),
        chrono::Duration::days(config.retention.horizon_days),
    );
    let sweeper_shutdown = sweeper.spawn();
    info!(
        horizon_days = config.retention.horizon_days,
        interval_secs = config.retention.sweep_interval_secs,
        "retention sweeper running"
    );

    if config.app.base_url.is_empty() {
        info!("base URL will be derived from requests");
    } else {
        info!(base_url = %config.app.base_url, "static base URL configured");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        config,
        registry,
        enricher,
        dispatcher,
        service,
    });
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = sweeper_shutdown.send(true);
    info!("server exited");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
