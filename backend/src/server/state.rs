//! Application state for the backend HTTP server.

use super::health::ReadinessProbe;
use crate::services::{
    AuthService, CompraService, DisponibilidadService, EventoService, SesionReaper, SyncService,
    UserLocks, VentaService,
};
use chrono::Duration;
use evento_core::catedra::CatedraGateway;
use evento_core::compra::{CompraEnvironment, PoliticaCompra};
use evento_core::disponibilidad::SeatFeed;
use evento_core::environment::Clock;
use evento_core::repository::{
    EventoRepository, SesionCache, SesionRepository, UsuarioRepository, VentaRepository,
};
use evento_runtime::metrics::MetricsHandle;
use std::sync::Arc;

/// Every port the services are built from.
///
/// The binary fills it with Postgres, Redis and HTTP clients; tests with
/// the in-memory versions from `evento-testing`.
#[derive(Clone)]
pub struct Ports {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Cátedra API
    pub catedra: Arc<dyn CatedraGateway>,
    /// Seat snapshots from the proxy
    pub feed: Arc<dyn SeatFeed>,
    /// Events
    pub eventos: Arc<dyn EventoRepository>,
    /// Purchase sessions
    pub sesiones: Arc<dyn SesionRepository>,
    /// Sales
    pub ventas: Arc<dyn VentaRepository>,
    /// Users
    pub usuarios: Arc<dyn UsuarioRepository>,
    /// Session cache
    pub cache: Arc<dyn SesionCache>,
    /// Purchase limits
    pub politica: PoliticaCompra,
    /// Lifetime of login tokens
    pub token_ttl: Duration,
}

impl Ports {
    fn compra_environment(&self) -> CompraEnvironment {
        CompraEnvironment {
            clock: Arc::clone(&self.clock),
            catedra: Arc::clone(&self.catedra),
            asientos: Arc::clone(&self.feed),
            eventos: Arc::clone(&self.eventos),
            sesiones: Arc::clone(&self.sesiones),
            ventas: Arc::clone(&self.ventas),
            cache: Arc::clone(&self.cache),
            politica: self.politica,
        }
    }

    /// Expiration sweep sharing `locks` with the purchase service.
    #[must_use]
    pub fn reaper(&self, locks: Arc<UserLocks>) -> SesionReaper {
        SesionReaper::new(
            Arc::clone(&self.sesiones),
            Arc::clone(&self.cache),
            Arc::clone(&self.clock),
            locks,
            self.politica.ttl,
        )
    }
}

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Login and token checks
    pub auth: Arc<AuthService>,
    /// Purchase sessions
    pub compra: Arc<CompraService>,
    /// Seat matrices
    pub disponibilidad: Arc<DisponibilidadService>,
    /// Event catalog
    pub eventos: Arc<EventoService>,
    /// Sales of the caller
    pub ventas: Arc<VentaService>,
    /// Catalog synchronization
    pub sync: Arc<SyncService>,
    /// Dependency checks behind `/ready`
    pub readiness: Arc<dyn ReadinessProbe>,
    /// Prometheus handle rendered at `/metrics`
    pub metrics: MetricsHandle,
}

impl AppState {
    /// Builds every service from the ports.
    #[must_use]
    pub fn new(
        ports: &Ports,
        locks: Arc<UserLocks>,
        readiness: Arc<dyn ReadinessProbe>,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(
                Arc::clone(&ports.usuarios),
                Arc::clone(&ports.clock),
                ports.token_ttl,
            )),
            compra: Arc::new(CompraService::new(ports.compra_environment(), locks)),
            disponibilidad: Arc::new(DisponibilidadService::new(
                Arc::clone(&ports.eventos),
                Arc::clone(&ports.feed),
                Arc::clone(&ports.clock),
            )),
            eventos: Arc::new(EventoService::new(Arc::clone(&ports.eventos))),
            ventas: Arc::new(VentaService::new(Arc::clone(&ports.ventas))),
            sync: Arc::new(SyncService::new(
                Arc::clone(&ports.catedra),
                Arc::clone(&ports.eventos),
                Arc::clone(&ports.clock),
            )),
            readiness,
            metrics,
        }
    }
}
