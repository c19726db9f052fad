use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use mq::{MqConfig, init_mq};
use server::backend::init_gateways;
use server::config::AppConfig;
use server::consumers::consume_build_reports;
use server::lifecycle::Lifecycle;
use server::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;

    let mq = if config.mq.enabled {
        let mq = Arc::new(
            init_mq(MqConfig::from(&config.mq))
                .await
                .context("Failed to initialize MQ")?,
        );
        info!(
            job_queue = %config.mq.job_queue,
            report_queue = %config.mq.report_queue,
            "MQ connected"
        );
        Some(mq)
    } else {
        info!("MQ disabled, build reports must be delivered directly");
        None
    };

    let gateways = init_gateways(&config, mq.clone()).await?;
    let lifecycle = Lifecycle::new(gateways, (&config.staging).into());

    if let Some(mq) = &mq {
        tokio::spawn(consume_build_reports(
            lifecycle.clone(),
            Arc::clone(mq),
            config.mq.report_queue.clone(),
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState { config, lifecycle };
    let app = server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
