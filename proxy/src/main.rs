//! Evento proxy server.
//!
//! Serves seat maps over HTTP while a background task consumes cátedra's
//! change notifications.

use anyhow::Context;
use evento_proxy::asientos::RedisSeatStore;
use evento_proxy::{AppState, BackendNotifier, Config, build_router, consumer};
use evento_redpanda::NotificationConsumer;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,evento_proxy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting evento proxy...");

    let config = Config::from_env()?;
    tracing::info!(
        redis = %config.redis.url,
        kafka = %config.kafka.brokers,
        topic = %config.kafka.topic,
        backend = %config.backend.base_url,
        "Configuration loaded"
    );

    let metrics = evento_runtime::metrics::install()?;
    let store = RedisSeatStore::connect(&config.redis.url, config.redis.timeout()).await?;

    let notifier = BackendNotifier::new(
        config.backend.base_url.clone(),
        config.backend.username.clone(),
        config.backend.password.clone(),
        config.backend.timeout(),
    )?;
    let stream = NotificationConsumer::builder()
        .brokers(config.kafka.brokers.clone())
        .topic(config.kafka.topic.clone())
        .group_id(config.kafka.group_id.clone())
        .auto_offset_reset(config.kafka.auto_offset_reset.clone())
        .build()?
        .subscribe()?;
    let consumidor = tokio::spawn(async move {
        consumer::run(stream, &notifier).await;
    });

    let app = build_router(AppState {
        asientos: Arc::new(store),
        metrics,
    });
    let address = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("cannot bind {address}"))?;
    tracing::info!(address = %address, "Evento proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully...");
        })
        .await?;

    consumidor.abort();
    Ok(())
}
