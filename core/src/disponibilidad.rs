//! Seat availability.
//!
//! Cátedra publishes the live state of every event's seats into its Redis;
//! the proxy serves that document as a [`SnapshotAsientos`]. Only held and
//! sold seats appear in it, so the full matrix is built here: every seat of
//! the event grid starts available and the snapshot is laid on top.
//!
//! Holds carry an `expira` timestamp. A hold whose expiry is in the past is
//! shown as available again; nothing sweeps it from the snapshot.

use crate::catedra::GatewayError;
use crate::types::{Asiento, EstadoAsiento, Evento, EventoId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot estado for a held seat.
pub const ESTADO_BLOQUEADO: &str = "Bloqueado";
/// Snapshot estado for a sold seat.
pub const ESTADO_VENDIDO: &str = "Vendido";

// ============================================================================
// Snapshot (proxy wire format)
// ============================================================================

/// A seat entry of the cátedra snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsientoSnapshot {
    pub fila: i64,
    pub columna: i64,
    pub estado: String,
    #[serde(default)]
    pub expira: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nombre_persona: Option<String>,
}

/// Document stored by cátedra under `evento_{id}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAsientos {
    #[serde(default)]
    pub evento_id: Option<i64>,
    #[serde(default)]
    pub asientos: Vec<AsientoSnapshot>,
}

/// Source of seat snapshots (the proxy).
#[async_trait]
pub trait SeatFeed: Send + Sync {
    /// Current snapshot of a cátedra event, `None` when there is no data yet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the proxy cannot be reached or answers
    /// with an unreadable document.
    async fn snapshot(&self, evento_id_catedra: i64)
    -> Result<Option<SnapshotAsientos>, GatewayError>;
}

// ============================================================================
// Event preconditions
// ============================================================================

/// Why an event cannot show a seat matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisponibilidadError {
    /// Event is not active
    #[error("event {0} is not active")]
    EventoInactivo(EventoId),

    /// Event has no seat grid or no cátedra id
    #[error("event {0} has no seat configuration")]
    EventoSinConfigurar(EventoId),
}

/// Seat grid and cátedra id of an event that can be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfiguracionEvento {
    pub id_catedra: i64,
    pub filas: u32,
    pub columnas: u32,
}

impl ConfiguracionEvento {
    /// True when the seat is inside the grid.
    #[must_use]
    pub const fn contiene(&self, asiento: Asiento) -> bool {
        asiento.fila >= 1
            && asiento.fila <= self.filas
            && asiento.columna >= 1
            && asiento.columna <= self.columnas
    }
}

/// Largest row or column count accepted from the synced catalog.
pub const MAX_DIMENSION: u32 = 1000;

/// Checks that an event is active and fully configured for seat sales.
///
/// A grid wider or taller than [`MAX_DIMENSION`] counts as unconfigured.
///
/// # Errors
///
/// Returns [`DisponibilidadError`] when it is not.
pub fn validar_evento(evento: &Evento) -> Result<ConfiguracionEvento, DisponibilidadError> {
    if !evento.activo {
        return Err(DisponibilidadError::EventoInactivo(evento.id));
    }
    let en_rango = |n: u32| (1..=MAX_DIMENSION).contains(&n);
    match (evento.id_catedra, evento.fila_asientos, evento.columna_asientos) {
        (Some(id_catedra), Some(filas), Some(columnas)) if en_rango(filas) && en_rango(columnas) => {
            Ok(ConfiguracionEvento {
                id_catedra,
                filas,
                columnas,
            })
        },
        (_, filas, columnas) => {
            tracing::warn!(evento_id = %evento.id, ?filas, ?columnas, "Event seat grid unusable");
            Err(DisponibilidadError::EventoSinConfigurar(evento.id))
        },
    }
}

// ============================================================================
// Matrix
// ============================================================================

/// One cell of the matrix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsientoDisponibilidad {
    pub fila: u32,
    pub columna: u32,
    pub estado: EstadoAsiento,
    pub expira: Option<DateTime<Utc>>,
    pub nombre_persona: Option<String>,
}

/// Full seat matrix of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrizAsientos {
    pub evento_id: EventoId,
    pub evento_id_catedra: i64,
    pub titulo_evento: String,
    pub total_filas: u32,
    pub total_columnas: u32,
    pub total_asientos: u32,
    pub disponibles: u32,
    pub bloqueados: u32,
    pub vendidos: u32,
    /// Row-major
    pub asientos: Vec<AsientoDisponibilidad>,
    pub consultado_en: DateTime<Utc>,
}

impl MatrizAsientos {
    /// Builds the matrix of `evento` from an optional snapshot.
    #[must_use]
    pub fn construir(
        evento: &Evento,
        config: ConfiguracionEvento,
        snapshot: Option<&SnapshotAsientos>,
        now: DateTime<Utc>,
    ) -> Self {
        let columnas = config.columnas as usize;
        let mut asientos: Vec<AsientoDisponibilidad> = (1..=config.filas)
            .flat_map(|fila| {
                (1..=config.columnas).map(move |columna| AsientoDisponibilidad {
                    fila,
                    columna,
                    estado: EstadoAsiento::Disponible,
                    expira: None,
                    nombre_persona: None,
                })
            })
            .collect();

        for entrada in snapshot.map(|s| s.asientos.as_slice()).unwrap_or_default() {
            let (Ok(fila), Ok(columna)) = (u32::try_from(entrada.fila), u32::try_from(entrada.columna))
            else {
                tracing::warn!(
                    evento_id = %evento.id,
                    fila = entrada.fila,
                    columna = entrada.columna,
                    "Snapshot seat outside the grid, skipped"
                );
                continue;
            };
            let asiento = Asiento::new(fila, columna);
            if !config.contiene(asiento) {
                tracing::warn!(
                    evento_id = %evento.id,
                    fila = entrada.fila,
                    columna = entrada.columna,
                    "Snapshot seat outside the grid, skipped"
                );
                continue;
            }

            let index = (fila as usize - 1) * columnas + (columna as usize - 1);
            let Some(celda) = asientos.get_mut(index) else {
                continue;
            };

            if entrada.estado.eq_ignore_ascii_case(ESTADO_BLOQUEADO) {
                // An expired hold leaves the seat available.
                if let Some(expira) = entrada.expira.filter(|expira| *expira > now) {
                    celda.estado = EstadoAsiento::Bloqueado;
                    celda.expira = Some(expira);
                }
            } else if entrada.estado.eq_ignore_ascii_case(ESTADO_VENDIDO) {
                celda.estado = EstadoAsiento::Vendido;
                celda.nombre_persona.clone_from(&entrada.nombre_persona);
            } else {
                tracing::debug!(
                    evento_id = %evento.id,
                    estado = %entrada.estado,
                    "Unknown snapshot seat estado ignored"
                );
            }
        }

        let contar = |estado: EstadoAsiento| {
            u32::try_from(asientos.iter().filter(|a| a.estado == estado).count()).unwrap_or(u32::MAX)
        };
        let disponibles = contar(EstadoAsiento::Disponible);
        let bloqueados = contar(EstadoAsiento::Bloqueado);
        let vendidos = contar(EstadoAsiento::Vendido);

        Self {
            evento_id: evento.id,
            evento_id_catedra: config.id_catedra,
            titulo_evento: evento.titulo.clone(),
            total_filas: config.filas,
            total_columnas: config.columnas,
            total_asientos: config.filas.saturating_mul(config.columnas),
            disponibles,
            bloqueados,
            vendidos,
            asientos,
            consultado_en: now,
        }
    }

    /// Availability of one seat, `None` when it is outside the grid.
    #[must_use]
    pub fn estado(&self, asiento: Asiento) -> Option<EstadoAsiento> {
        if asiento.fila == 0 || asiento.columna == 0 || asiento.columna > self.total_columnas {
            return None;
        }
        let index = (asiento.fila as usize - 1) * self.total_columnas as usize
            + (asiento.columna as usize - 1);
        self.asientos.get(index).map(|a| a.estado)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Money;
    use chrono::Duration;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn evento(filas: u32, columnas: u32) -> Evento {
        Evento {
            id: EventoId(1),
            id_catedra: Some(77),
            titulo: "Recital".to_string(),
            resumen: None,
            descripcion: None,
            fecha: None,
            direccion: None,
            imagen: None,
            fila_asientos: Some(filas),
            columna_asientos: Some(columnas),
            precio_entrada: Money::from_cents(100_000),
            activo: true,
            fecha_sincronizacion: None,
            evento_tipo: None,
            integrantes: Vec::new(),
        }
    }

    fn entrada(fila: i64, columna: i64, estado: &str, expira: Option<DateTime<Utc>>) -> AsientoSnapshot {
        AsientoSnapshot {
            fila,
            columna,
            estado: estado.to_string(),
            expira,
            nombre_persona: None,
        }
    }

    #[test]
    fn no_snapshot_means_everything_available() {
        let evento = evento(3, 4);
        let config = validar_evento(&evento).unwrap();
        let matriz = MatrizAsientos::construir(&evento, config, None, now());

        assert_eq!(matriz.total_asientos, 12);
        assert_eq!(matriz.disponibles, 12);
        assert_eq!(matriz.asientos[5].fila, 2);
        assert_eq!(matriz.asientos[5].columna, 2);
    }

    #[test]
    fn holds_expire_by_timestamp() {
        let evento = evento(2, 2);
        let config = validar_evento(&evento).unwrap();
        let snapshot = SnapshotAsientos {
            evento_id: Some(77),
            asientos: vec![
                entrada(1, 1, "Bloqueado", Some(now() + Duration::minutes(3))),
                entrada(1, 2, "Bloqueado", Some(now() - Duration::seconds(1))),
                AsientoSnapshot {
                    nombre_persona: Some("Ana Paz".to_string()),
                    ..entrada(2, 1, "Vendido", None)
                },
                entrada(9, 9, "Vendido", None),
                entrada(-1, 1, "Vendido", None),
            ],
        };

        let matriz = MatrizAsientos::construir(&evento, config, Some(&snapshot), now());

        assert_eq!(matriz.estado(Asiento::new(1, 1)), Some(EstadoAsiento::Bloqueado));
        assert_eq!(matriz.estado(Asiento::new(1, 2)), Some(EstadoAsiento::Disponible));
        assert_eq!(matriz.estado(Asiento::new(2, 1)), Some(EstadoAsiento::Vendido));
        assert_eq!(matriz.asientos[2].nombre_persona.as_deref(), Some("Ana Paz"));
        assert_eq!((matriz.disponibles, matriz.bloqueados, matriz.vendidos), (2, 1, 1));
        assert_eq!(matriz.estado(Asiento::new(3, 1)), None);
    }

    #[test]
    fn inactive_or_unconfigured_events_are_rejected() {
        let mut inactivo = evento(2, 2);
        inactivo.activo = false;
        assert_eq!(
            validar_evento(&inactivo),
            Err(DisponibilidadError::EventoInactivo(EventoId(1)))
        );

        let mut sin_catedra = evento(2, 2);
        sin_catedra.id_catedra = None;
        assert_eq!(
            validar_evento(&sin_catedra),
            Err(DisponibilidadError::EventoSinConfigurar(EventoId(1)))
        );

        assert!(validar_evento(&evento(0, 5)).is_err());
    }

    #[test]
    fn oversized_grids_are_refused() {
        assert!(validar_evento(&evento(MAX_DIMENSION, MAX_DIMENSION)).is_ok());
        assert_eq!(
            validar_evento(&evento(100_000, 100_000)),
            Err(DisponibilidadError::EventoSinConfigurar(EventoId(1)))
        );
        assert!(validar_evento(&evento(3, MAX_DIMENSION + 1)).is_err());
    }

    proptest! {
        #[test]
        fn counts_always_cover_the_grid(
            filas in 1u32..12,
            columnas in 1u32..12,
            seats in proptest::collection::vec((-2i64..14, -2i64..14, 0u8..3), 0..40),
        ) {
            let evento = evento(filas, columnas);
            let config = validar_evento(&evento).unwrap();
            let snapshot = SnapshotAsientos {
                evento_id: Some(77),
                asientos: seats
                    .into_iter()
                    .map(|(fila, columna, kind)| match kind {
                        0 => entrada(fila, columna, "Vendido", None),
                        1 => entrada(fila, columna, "Bloqueado", Some(now() + Duration::minutes(1))),
                        _ => entrada(fila, columna, "Bloqueado", Some(now() - Duration::minutes(1))),
                    })
                    .collect(),
            };

            let matriz = MatrizAsientos::construir(&evento, config, Some(&snapshot), now());

            prop_assert_eq!(matriz.asientos.len() as u32, filas * columnas);
            prop_assert_eq!(matriz.disponibles + matriz.bloqueados + matriz.vendidos, filas * columnas);
        }
    }
}
