//! Purchase workflow driven end to end through the effect runner and the
//! in-memory ports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use evento_core::catedra::{CatedraGateway, GatewayError, RealizarVentaResponse};
use evento_core::compra::{CompraAction, CompraReducer, CompraState};
use evento_core::types::{
    Asiento, EstadoSesion, EstadoSincronizacion, EventoId, Money, UsuarioId,
};
use evento_runtime::EffectRunner;
use evento_testing::{ManualClock, Puertos, fixtures, test_time};
use std::collections::HashMap;

const COMPRADOR: UsuarioId = UsuarioId(7);

struct Escenario {
    clock: ManualClock,
    puertos: Puertos,
    runner: EffectRunner<CompraReducer>,
    state: CompraState,
}

impl Escenario {
    fn new() -> Self {
        let clock = ManualClock::new(test_time());
        let puertos = Puertos::new(clock.clone());
        puertos.eventos.insert(fixtures::evento(1));
        let runner = EffectRunner::new(CompraReducer::new(), puertos.environment());
        Self {
            clock,
            puertos,
            runner,
            state: CompraState::for_usuario(COMPRADOR),
        }
    }

    async fn send(&mut self, action: CompraAction) -> Option<&'static str> {
        self.runner.send(&mut self.state, action).await.unwrap();
        self.state.last_error.as_ref().map(|e| e.code())
    }

    async fn hasta_carga_datos(&mut self, asientos: &[(u32, u32)]) {
        assert_eq!(
            self.send(CompraAction::Iniciar {
                usuario: COMPRADOR,
                evento_id: EventoId(1),
            })
            .await,
            None
        );
        let asientos = asientos.iter().map(|(f, c)| Asiento::new(*f, *c)).collect();
        assert_eq!(self.send(CompraAction::SeleccionarAsientos { asientos }).await, None);
    }

    async fn nombrar_todos(&mut self) {
        let nombres: HashMap<String, String> = self
            .state
            .asientos
            .iter()
            .map(|s| (s.asiento.clave(), "Maria Lopez".to_string()))
            .collect();
        assert_eq!(self.send(CompraAction::AsignarNombres { nombres }).await, None);
    }
}

#[tokio::test]
async fn buyer_completes_a_purchase() {
    let mut e = Escenario::new();
    e.hasta_carga_datos(&[(2, 3), (2, 4)]).await;

    let sesion = e.state.sesion.clone().unwrap();
    assert_eq!(sesion.estado, EstadoSesion::CargaDatos);
    assert_eq!(e.puertos.sesiones.asientos_de(sesion.id).len(), 2);
    assert!(e.puertos.cache.entrada(COMPRADOR).is_some());

    e.nombrar_todos().await;
    assert_eq!(e.send(CompraAction::Confirmar).await, None);

    let venta = e.state.venta.clone().unwrap();
    assert!(venta.exitosa);
    assert_eq!(venta.estado_sincronizacion, EstadoSincronizacion::Sincronizada);
    assert_eq!(venta.id_venta_catedra, Some(9001));
    assert_eq!(venta.precio_total, Money::from_cents(300_000));
    assert_eq!(venta.asientos.len(), 2);

    let guardada = e.puertos.sesiones.todas().into_iter().next().unwrap();
    assert_eq!(guardada.estado, EstadoSesion::Completado);
    assert!(e.puertos.sesiones.asientos_de(guardada.id).is_empty());
    assert!(e.puertos.cache.entrada(COMPRADOR).is_none());

    let request = e.puertos.catedra.ventas().pop().unwrap();
    assert!(request.asientos.iter().all(|a| a.persona == "Maria Lopez"));
}

#[tokio::test]
async fn starting_again_closes_the_previous_session() {
    let mut e = Escenario::new();
    e.hasta_carga_datos(&[(1, 1)]).await;
    let primera = e.state.sesion.clone().unwrap();

    e.send(CompraAction::Iniciar {
        usuario: COMPRADOR,
        evento_id: EventoId(1),
    })
    .await;

    let sesiones = e.puertos.sesiones.todas();
    assert_eq!(sesiones.len(), 2);
    let cerrada = sesiones.iter().find(|s| s.id == primera.id).unwrap();
    assert_eq!(cerrada.estado, EstadoSesion::Completado);
    assert_eq!(
        e.state.sesion.as_ref().map(|s| s.estado),
        Some(EstadoSesion::SeleccionAsientos)
    );
    assert!(e.state.asientos.is_empty());
}

#[tokio::test]
async fn seat_held_by_someone_else_is_refused() {
    let mut e = Escenario::new();
    e.puertos
        .catedra
        .bloquear_asientos(501, &[Asiento::new(3, 3)])
        .await
        .unwrap();

    e.send(CompraAction::Iniciar {
        usuario: COMPRADOR,
        evento_id: EventoId(1),
    })
    .await;
    let code = e
        .send(CompraAction::SeleccionarAsientos {
            asientos: vec![Asiento::new(3, 3)],
        })
        .await;

    assert_eq!(code, Some("asientonodisponible"));
    assert_eq!(
        e.state.sesion.as_ref().map(|s| s.estado),
        Some(EstadoSesion::SeleccionAsientos)
    );
}

#[tokio::test]
async fn seat_sold_meanwhile_blocks_the_sale() {
    let mut e = Escenario::new();
    e.hasta_carga_datos(&[(4, 4)]).await;
    e.nombrar_todos().await;

    e.puertos
        .feed
        .marcar(501, Asiento::new(4, 4), "Vendido", None, Some("Otra Persona".to_string()));

    assert_eq!(e.send(CompraAction::Confirmar).await, Some("asientovendido"));
    assert!(e.puertos.catedra.ventas().is_empty());
    assert!(e.puertos.ventas.todas().is_empty());
    assert_eq!(
        e.state.sesion.as_ref().map(|s| s.estado),
        Some(EstadoSesion::CargaDatos)
    );
}

#[tokio::test]
async fn expired_holds_are_renewed_before_selling() {
    let mut e = Escenario::new();
    e.hasta_carga_datos(&[(5, 1), (5, 2)]).await;
    e.nombrar_todos().await;

    e.clock.advance(Duration::minutes(10));

    assert_eq!(e.send(CompraAction::Confirmar).await, None);

    let bloqueos = e.puertos.catedra.bloqueos();
    assert_eq!(bloqueos.len(), 2);
    assert_eq!(bloqueos[1].1, vec![Asiento::new(5, 1), Asiento::new(5, 2)]);
    assert!(e.state.venta.as_ref().unwrap().exitosa);
}

#[tokio::test]
async fn unreachable_catedra_leaves_a_pending_sale() {
    let mut e = Escenario::new();
    e.hasta_carga_datos(&[(6, 6)]).await;
    e.nombrar_todos().await;
    e.puertos
        .catedra
        .responder_venta(Err(GatewayError::Unavailable("connection refused".to_string())));

    assert_eq!(e.send(CompraAction::Confirmar).await, Some("catedradown"));

    let venta = e.puertos.ventas.todas().pop().unwrap();
    assert!(!venta.exitosa);
    assert_eq!(venta.estado_sincronizacion, EstadoSincronizacion::Pendiente);
    assert_eq!(venta.asientos.len(), 1);
    assert_eq!(
        e.state.sesion.as_ref().map(|s| s.estado),
        Some(EstadoSesion::CargaDatos)
    );
}

#[tokio::test]
async fn rejected_sale_can_be_retried() {
    let mut e = Escenario::new();
    e.hasta_carga_datos(&[(7, 2)]).await;
    e.nombrar_todos().await;
    e.puertos.catedra.responder_venta(Ok(RealizarVentaResponse {
        evento_id: Some(501),
        venta_id: None,
        fecha_venta: None,
        asientos: Vec::new(),
        resultado: false,
        descripcion: Some("Tarjeta rechazada".to_string()),
        precio_venta: None,
    }));

    assert_eq!(e.send(CompraAction::Confirmar).await, Some("ventarechazada"));
    assert_eq!(
        e.puertos.ventas.todas()[0].estado_sincronizacion,
        EstadoSincronizacion::Error
    );

    assert_eq!(e.send(CompraAction::Confirmar).await, None);
    assert!(e.state.venta.as_ref().unwrap().exitosa);
    assert_eq!(e.puertos.ventas.todas().len(), 2);
}

#[tokio::test]
async fn cancel_releases_the_session() {
    let mut e = Escenario::new();
    e.hasta_carga_datos(&[(1, 8)]).await;
    let id = e.state.sesion.as_ref().unwrap().id;

    assert_eq!(e.send(CompraAction::Cancelar).await, None);

    assert!(e.puertos.sesiones.asientos_de(id).is_empty());
    assert!(e.puertos.cache.entrada(COMPRADOR).is_none());
    assert_eq!(e.send(CompraAction::Cancelar).await, Some("nosession"));
}
