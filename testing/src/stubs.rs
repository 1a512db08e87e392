//! Stand-ins for the remote services: cátedra and the seat proxy.
//!
//! Both answer from scripted responses when a test queued some, and behave
//! like a well-mannered cátedra otherwise.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use evento_core::catedra::{
    AsientoBloqueado, AsientoVentaRespuesta, BLOQUEO_EXITOSO, BloquearAsientosResponse,
    CatedraGateway, EventoCatedra, GatewayError, RealizarVentaRequest, RealizarVentaResponse,
};
use evento_core::disponibilidad::{
    AsientoSnapshot, ESTADO_BLOQUEADO, ESTADO_VENDIDO, SeatFeed, SnapshotAsientos,
};
use evento_core::environment::Clock;
use evento_core::types::Asiento;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Minutes cátedra keeps a hold in the linked feed.
pub const MINUTOS_BLOQUEO: i64 = 5;

// ============================================================================
// Seat feed
// ============================================================================

/// In-memory [`SeatFeed`].
#[derive(Debug, Default)]
pub struct StubSeatFeed {
    snapshots: Mutex<HashMap<i64, SnapshotAsientos>>,
    error: Mutex<Option<GatewayError>>,
}

impl StubSeatFeed {
    /// Feed without data for any event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot of an event.
    pub fn poner(&self, evento_id_catedra: i64, snapshot: SnapshotAsientos) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(evento_id_catedra, snapshot);
        }
    }

    /// Sets the state of one seat, creating the snapshot when needed.
    pub fn marcar(
        &self,
        evento_id_catedra: i64,
        asiento: Asiento,
        estado: &str,
        expira: Option<DateTime<Utc>>,
        nombre_persona: Option<String>,
    ) {
        let Ok(mut snapshots) = self.snapshots.lock() else {
            return;
        };
        let snapshot = snapshots
            .entry(evento_id_catedra)
            .or_insert_with(|| SnapshotAsientos {
                evento_id: Some(evento_id_catedra),
                asientos: Vec::new(),
            });
        let fila = i64::from(asiento.fila);
        let columna = i64::from(asiento.columna);
        snapshot
            .asientos
            .retain(|a| !(a.fila == fila && a.columna == columna));
        snapshot.asientos.push(AsientoSnapshot {
            fila,
            columna,
            estado: estado.to_string(),
            expira,
            nombre_persona,
        });
    }

    /// Makes every call fail with `error`, or heals the feed with `None`.
    pub fn fallar(&self, error: Option<GatewayError>) {
        if let Ok(mut current) = self.error.lock() {
            *current = error;
        }
    }

    /// Snapshot currently served for an event.
    #[must_use]
    pub fn snapshot_de(&self, evento_id_catedra: i64) -> Option<SnapshotAsientos> {
        self.snapshots
            .lock()
            .ok()
            .and_then(|s| s.get(&evento_id_catedra).cloned())
    }
}

#[async_trait]
impl SeatFeed for StubSeatFeed {
    async fn snapshot(&self, evento_id_catedra: i64) -> Result<Option<SnapshotAsientos>, GatewayError> {
        if let Some(error) = self.error.lock().ok().and_then(|e| e.clone()) {
            return Err(error);
        }
        Ok(self.snapshot_de(evento_id_catedra))
    }
}

// ============================================================================
// Cátedra
// ============================================================================

#[derive(Debug, Default)]
struct CatedraState {
    bloqueos: VecDeque<Result<BloquearAsientosResponse, GatewayError>>,
    ventas: VecDeque<Result<RealizarVentaResponse, GatewayError>>,
    catalogo: Option<Result<Vec<EventoCatedra>, GatewayError>>,
    caido: bool,
    llamadas_bloqueo: Vec<(i64, Vec<Asiento>)>,
    llamadas_venta: Vec<RealizarVentaRequest>,
    ultima_venta: i64,
}

/// Scriptable [`CatedraGateway`] that records every call.
///
/// Unscripted holds succeed unless a seat is sold in the linked feed, and
/// unscripted sales succeed with increasing cátedra sale ids starting at 9001.
#[derive(Default)]
pub struct StubCatedra {
    state: Mutex<CatedraState>,
    feed: Option<(Arc<StubSeatFeed>, Arc<dyn Clock>)>,
}

impl StubCatedra {
    /// Stub with no script and no linked feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes accepted holds and sales into `feed`, timed by `clock`.
    #[must_use]
    pub fn con_feed(mut self, feed: Arc<StubSeatFeed>, clock: Arc<dyn Clock>) -> Self {
        self.feed = Some((feed, clock));
        self
    }

    fn with_state(&self, f: impl FnOnce(&mut CatedraState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    /// Queues the answer to the next hold request.
    pub fn responder_bloqueo(&self, respuesta: Result<BloquearAsientosResponse, GatewayError>) {
        self.with_state(|s| s.bloqueos.push_back(respuesta));
    }

    /// Queues the answer to the next sale.
    pub fn responder_venta(&self, respuesta: Result<RealizarVentaResponse, GatewayError>) {
        self.with_state(|s| s.ventas.push_back(respuesta));
    }

    /// Sets the catalog answer.
    pub fn con_catalogo(&self, catalogo: Result<Vec<EventoCatedra>, GatewayError>) {
        self.with_state(|s| s.catalogo = Some(catalogo));
    }

    /// Makes the health check fail.
    pub fn caer(&self, caido: bool) {
        self.with_state(|s| s.caido = caido);
    }

    /// Hold requests received, in order.
    #[must_use]
    pub fn bloqueos(&self) -> Vec<(i64, Vec<Asiento>)> {
        self.state
            .lock()
            .map(|s| s.llamadas_bloqueo.clone())
            .unwrap_or_default()
    }

    /// Sales received, in order.
    #[must_use]
    pub fn ventas(&self) -> Vec<RealizarVentaRequest> {
        self.state
            .lock()
            .map(|s| s.llamadas_venta.clone())
            .unwrap_or_default()
    }

    fn poisoned() -> GatewayError {
        GatewayError::Unavailable("stub lock poisoned".to_string())
    }

    fn estado_en_feed(&self, evento_id_catedra: i64, asiento: Asiento) -> Option<String> {
        let (feed, _) = self.feed.as_ref()?;
        feed.snapshot_de(evento_id_catedra)?
            .asientos
            .into_iter()
            .find(|a| a.fila == i64::from(asiento.fila) && a.columna == i64::from(asiento.columna))
            .map(|a| a.estado)
    }

    fn bloqueo_por_defecto(&self, evento_id_catedra: i64, asientos: &[Asiento]) -> BloquearAsientosResponse {
        let asientos: Vec<AsientoBloqueado> = asientos
            .iter()
            .map(|a| {
                let vendido = self
                    .estado_en_feed(evento_id_catedra, *a)
                    .is_some_and(|e| e.eq_ignore_ascii_case(ESTADO_VENDIDO));
                AsientoBloqueado {
                    fila: a.fila,
                    columna: a.columna,
                    estado: if vendido { "Ocupado" } else { BLOQUEO_EXITOSO }.to_string(),
                }
            })
            .collect();
        let resultado = asientos.iter().all(|a| a.estado == BLOQUEO_EXITOSO);
        BloquearAsientosResponse {
            resultado,
            descripcion: (!resultado).then(|| "No todos los asientos pudieron ser bloqueados".to_string()),
            evento_id: Some(evento_id_catedra),
            asientos,
        }
    }
}

#[async_trait]
impl CatedraGateway for StubCatedra {
    async fn bloquear_asientos(
        &self,
        evento_id_catedra: i64,
        asientos: &[Asiento],
    ) -> Result<BloquearAsientosResponse, GatewayError> {
        let guion = {
            let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
            state.llamadas_bloqueo.push((evento_id_catedra, asientos.to_vec()));
            state.bloqueos.pop_front()
        };
        let respuesta = match guion {
            Some(respuesta) => respuesta?,
            None => self.bloqueo_por_defecto(evento_id_catedra, asientos),
        };

        if let Some((feed, clock)) = &self.feed {
            let expira = clock.now() + Duration::minutes(MINUTOS_BLOQUEO);
            for a in respuesta
                .asientos
                .iter()
                .filter(|a| a.estado.eq_ignore_ascii_case(BLOQUEO_EXITOSO))
            {
                feed.marcar(
                    evento_id_catedra,
                    Asiento::new(a.fila, a.columna),
                    ESTADO_BLOQUEADO,
                    Some(expira),
                    None,
                );
            }
        }
        Ok(respuesta)
    }

    async fn realizar_venta(&self, request: &RealizarVentaRequest) -> Result<RealizarVentaResponse, GatewayError> {
        let (guion, venta_id) = {
            let mut state = self.state.lock().map_err(|_| Self::poisoned())?;
            state.llamadas_venta.push(request.clone());
            state.ultima_venta += 1;
            (state.ventas.pop_front(), 9000 + state.ultima_venta)
        };
        let respuesta = match guion {
            Some(respuesta) => respuesta?,
            None => RealizarVentaResponse {
                evento_id: Some(request.evento_id),
                venta_id: Some(venta_id),
                fecha_venta: Some(request.fecha),
                asientos: request
                    .asientos
                    .iter()
                    .map(|a| AsientoVentaRespuesta {
                        fila: a.fila,
                        columna: a.columna,
                        persona: Some(a.persona.clone()),
                        estado: Some(ESTADO_VENDIDO.to_string()),
                    })
                    .collect(),
                resultado: true,
                descripcion: Some("Venta realizada con exito".to_string()),
                precio_venta: Some(request.precio_venta),
            },
        };

        if let Some((feed, _)) = self.feed.as_ref().filter(|_| respuesta.resultado) {
            for a in &request.asientos {
                feed.marcar(
                    request.evento_id,
                    Asiento::new(a.fila, a.columna),
                    ESTADO_VENDIDO,
                    None,
                    Some(a.persona.clone()),
                );
            }
        }
        Ok(respuesta)
    }

    async fn eventos(&self) -> Result<Vec<EventoCatedra>, GatewayError> {
        let state = self.state.lock().map_err(|_| Self::poisoned())?;
        state.catalogo.clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn health(&self) -> Result<(), GatewayError> {
        let state = self.state.lock().map_err(|_| Self::poisoned())?;
        if state.caido {
            Err(GatewayError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::test_clock;
    use evento_core::catedra::AsientoVenta;
    use evento_core::types::Money;

    fn linked() -> (StubCatedra, Arc<StubSeatFeed>) {
        let feed = Arc::new(StubSeatFeed::new());
        let catedra = StubCatedra::new().con_feed(Arc::clone(&feed), Arc::new(test_clock()));
        (catedra, feed)
    }

    #[tokio::test]
    async fn accepted_holds_and_sales_reach_the_feed() {
        let (catedra, feed) = linked();

        let hold = catedra.bloquear_asientos(7, &[Asiento::new(1, 1)]).await.unwrap();
        assert!(hold.exitoso());
        assert_eq!(feed.snapshot_de(7).unwrap().asientos[0].estado, ESTADO_BLOQUEADO);

        let venta = catedra
            .realizar_venta(&RealizarVentaRequest {
                evento_id: 7,
                fecha: test_clock().now(),
                precio_venta: Money::from_cents(100),
                asientos: vec![AsientoVenta {
                    fila: 1,
                    columna: 1,
                    persona: "Ana Paz".to_string(),
                }],
            })
            .await
            .unwrap();
        assert_eq!(venta.venta_id, Some(9001));

        let asiento = &feed.snapshot_de(7).unwrap().asientos[0];
        assert_eq!(asiento.estado, ESTADO_VENDIDO);
        assert_eq!(asiento.nombre_persona.as_deref(), Some("Ana Paz"));

        let again = catedra.bloquear_asientos(7, &[Asiento::new(1, 1)]).await.unwrap();
        assert!(!again.exitoso());
    }

    #[tokio::test]
    async fn scripted_failures_are_returned_in_order() {
        let catedra = StubCatedra::new();
        catedra.responder_bloqueo(Err(GatewayError::Unavailable("timeout".to_string())));

        assert!(catedra.bloquear_asientos(1, &[Asiento::new(1, 1)]).await.is_err());
        assert!(catedra.bloquear_asientos(1, &[Asiento::new(1, 1)]).await.is_ok());
        assert_eq!(catedra.bloqueos().len(), 2);
    }

    #[tokio::test]
    async fn failing_feed_reports_the_error() {
        let feed = StubSeatFeed::new();
        assert_eq!(feed.snapshot(3).await.unwrap(), None);

        feed.fallar(Some(GatewayError::Unavailable("proxy down".to_string())));
        assert!(feed.snapshot(3).await.is_err());
    }
}
