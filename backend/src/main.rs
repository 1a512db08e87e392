//! Evento backend server.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! CATEDRA_USERNAME=... CATEDRA_PASSWORD=... cargo run --bin evento-backend
//! ```

use anyhow::Context;
use evento_backend::cache::RedisSesionCache;
use evento_backend::clients::{CatedraClient, ProxySeatFeed};
use evento_backend::server::{InfraProbe, Ports};
use evento_backend::services::UserLocks;
use evento_backend::{AppState, Config, build_router};
use evento_core::catedra::CatedraGateway;
use evento_core::compra::PoliticaCompra;
use evento_core::environment::SystemClock;
use evento_postgres::{
    PgEventoRepository, PgSesionRepository, PgUsuarioRepository, PgVentaRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,evento_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting evento backend...");

    let config = Config::from_env()?;
    tracing::info!(
        postgres = %config.postgres.url,
        redis = %config.redis.url,
        catedra = %config.catedra.base_url,
        proxy = %config.proxy.base_url,
        "Configuration loaded"
    );

    let metrics = evento_runtime::metrics::install()?;

    let pool = evento_postgres::connect(&config.postgres.url, config.postgres.max_connections)
        .await
        .context("PostgreSQL connection failed")?;
    evento_postgres::migrate(&pool)
        .await
        .context("database migrations failed")?;
    tracing::info!("✓ PostgreSQL ready");

    let cache = RedisSesionCache::new(&config.redis.url, config.sesion.key_prefix.clone()).await?;
    tracing::info!("✓ Redis ready");

    let catedra: Arc<dyn CatedraGateway> = Arc::new(CatedraClient::new(
        config.catedra.base_url.clone(),
        config.catedra.username.clone(),
        config.catedra.password.clone(),
        Duration::from_millis(config.catedra.timeout_ms),
    )?);
    let feed = ProxySeatFeed::new(
        config.proxy.base_url.clone(),
        Duration::from_millis(config.proxy.timeout_ms),
    )?;

    let ports = Ports {
        clock: Arc::new(SystemClock),
        catedra: Arc::clone(&catedra),
        feed: Arc::new(feed),
        eventos: Arc::new(PgEventoRepository::new(pool.clone())),
        sesiones: Arc::new(PgSesionRepository::new(pool.clone())),
        ventas: Arc::new(PgVentaRepository::new(pool.clone())),
        usuarios: Arc::new(PgUsuarioRepository::new(pool.clone())),
        cache: Arc::new(cache.clone()),
        politica: PoliticaCompra {
            max_asientos: config.sesion.max_asientos,
            ttl: chrono::Duration::minutes(config.sesion.ttl_minutos),
            ..PoliticaCompra::default()
        },
        token_ttl: chrono::Duration::hours(config.auth.token_ttl_horas),
    };

    let locks = Arc::new(UserLocks::new());
    let reaper = Arc::new(ports.reaper(Arc::clone(&locks)))
        .spawn(Duration::from_secs(config.sesion.reaper_segundos.max(1)));

    let readiness = Arc::new(InfraProbe::new(pool, cache, catedra));
    let app = build_router(AppState::new(&ports, locks, readiness, metrics));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("cannot bind {address}"))?;
    tracing::info!(address = %address, "Evento backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gracefully...");
        })
        .await?;

    reaper.abort();
    Ok(())
}
