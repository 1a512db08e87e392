//! Reducer of the purchase session.

use super::{
    CompraAction, CompraEnvironment, CompraError, CompraState, PoliticaCompra, cerrar_sesion,
    guardar_sesion,
};
use crate::catedra::{AsientoVenta, RealizarVentaRequest};
use crate::disponibilidad::{ConfiguracionEvento, MatrizAsientos, SnapshotAsientos, validar_evento};
use crate::effect::Effect;
use crate::reducer::Reducer;
use crate::repository::{RepositoryError, SesionCacheEntry};
use crate::types::{
    Asiento, AsientoSeleccionado, AsientoVendido, EstadoAsiento, EstadoSesion,
    EstadoSincronizacion, NuevaSesion, NuevaVenta, Sesion,
};
use chrono::{DateTime, Utc};
use smallvec::{SmallVec, smallvec};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type Effects = SmallVec<[Effect<CompraAction>; 4]>;

/// Reducer enforcing the purchase state machine.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompraReducer;

impl CompraReducer {
    /// Creates the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ========================================================================
    // Validation helpers
    // ========================================================================

    fn fallar(state: &mut CompraState, error: CompraError) -> Effects {
        tracing::debug!(code = error.code(), error = %error, "Purchase step refused");
        if state.last_error.is_none() {
            state.last_error = Some(error);
        }
        SmallVec::new()
    }

    fn sesion_abierta(state: &CompraState) -> Result<&Sesion, CompraError> {
        state
            .sesion
            .as_ref()
            .filter(|s| s.abierta())
            .ok_or(CompraError::SesionNoEncontrada)
    }

    fn configuracion(state: &CompraState) -> Result<ConfiguracionEvento, CompraError> {
        let sesion = Self::sesion_abierta(state)?;
        let evento = state
            .evento
            .as_ref()
            .ok_or(CompraError::EventoNoEncontrado(sesion.evento_id))?;
        Ok(validar_evento(evento)?)
    }

    fn exigir_estado(state: &CompraState, permitidos: &[EstadoSesion]) -> Result<(), CompraError> {
        let sesion = Self::sesion_abierta(state)?;
        if permitidos.contains(&sesion.estado) {
            Ok(())
        } else {
            Err(CompraError::EstadoInvalido {
                actual: sesion.estado,
            })
        }
    }

    fn validar_seleccion(
        state: &CompraState,
        asientos: &[Asiento],
        politica: &PoliticaCompra,
    ) -> Result<ConfiguracionEvento, CompraError> {
        if asientos.is_empty() {
            return Err(CompraError::SinAsientos);
        }
        if asientos.len() > politica.max_asientos {
            return Err(CompraError::DemasiadosAsientos {
                max: politica.max_asientos,
            });
        }

        let mut vistos = HashSet::with_capacity(asientos.len());
        if let Some(duplicado) = asientos.iter().find(|a| !vistos.insert(**a)) {
            return Err(CompraError::AsientoDuplicado(*duplicado));
        }

        Self::exigir_estado(
            state,
            &[EstadoSesion::SeleccionAsientos, EstadoSesion::CargaDatos],
        )?;
        let config = Self::configuracion(state)?;

        for asiento in asientos {
            if asiento.fila < 1 || asiento.fila > config.filas {
                return Err(CompraError::FilaInvalida {
                    fila: asiento.fila,
                    max: config.filas,
                });
            }
            if asiento.columna < 1 || asiento.columna > config.columnas {
                return Err(CompraError::ColumnaInvalida {
                    columna: asiento.columna,
                    max: config.columnas,
                });
            }
        }
        Ok(config)
    }

    fn matriz(
        state: &CompraState,
        snapshot: Option<&SnapshotAsientos>,
        now: DateTime<Utc>,
    ) -> Result<MatrizAsientos, CompraError> {
        let config = Self::configuracion(state)?;
        let evento = state
            .evento
            .as_ref()
            .ok_or(CompraError::SesionNoEncontrada)?;
        Ok(MatrizAsientos::construir(evento, config, snapshot, now))
    }

    /// Seats must be free, or held already by this same session.
    fn verificar_libres(
        state: &CompraState,
        asientos: &[Asiento],
        snapshot: Option<&SnapshotAsientos>,
        now: DateTime<Utc>,
    ) -> Result<i64, CompraError> {
        let matriz = Self::matriz(state, snapshot, now)?;
        for asiento in asientos {
            let estado = matriz.estado(*asiento).unwrap_or(EstadoAsiento::Vendido);
            let propio = state.asientos.iter().any(|s| s.asiento == *asiento);
            let libre = estado == EstadoAsiento::Disponible
                || (estado == EstadoAsiento::Bloqueado && propio);
            if !libre {
                return Err(CompraError::AsientoNoDisponible {
                    asiento: *asiento,
                    estado,
                });
            }
        }
        Ok(matriz.evento_id_catedra)
    }

    fn nombre_valido<'a>(
        asiento: Asiento,
        nombre: Option<&'a str>,
        politica: &PoliticaCompra,
    ) -> Result<&'a str, CompraError> {
        let nombre = nombre.ok_or(CompraError::NombreFaltante(asiento))?.trim();
        if nombre.chars().count() < politica.min_longitud_nombre {
            return Err(CompraError::NombreInvalido {
                asiento,
                min: politica.min_longitud_nombre,
            });
        }
        Ok(nombre)
    }

    fn nombrar(
        state: &CompraState,
        nombres: &HashMap<String, String>,
        politica: &PoliticaCompra,
    ) -> Result<Vec<AsientoSeleccionado>, CompraError> {
        Self::exigir_estado(state, &[EstadoSesion::CargaDatos])?;
        if state.asientos.is_empty() {
            return Err(CompraError::SinAsientos);
        }
        if nombres.len() != state.asientos.len() {
            return Err(CompraError::CantidadNombres {
                esperados: state.asientos.len(),
                recibidos: nombres.len(),
            });
        }

        state
            .asientos
            .iter()
            .map(|seleccionado| {
                let asiento = seleccionado.asiento;
                let nombre = nombres.get(&asiento.clave()).map(String::as_str);
                let nombre = Self::nombre_valido(asiento, nombre, politica)?;
                Ok(AsientoSeleccionado {
                    asiento,
                    nombre_persona: Some(nombre.to_string()),
                })
            })
            .collect()
    }

    fn validar_confirmacion(state: &CompraState, politica: &PoliticaCompra) -> Result<i64, CompraError> {
        Self::exigir_estado(state, &[EstadoSesion::CargaDatos])?;
        if state.asientos.is_empty() {
            return Err(CompraError::SinAsientos);
        }
        for seleccionado in &state.asientos {
            Self::nombre_valido(
                seleccionado.asiento,
                seleccionado.nombre_persona.as_deref(),
                politica,
            )?;
        }
        Ok(Self::configuracion(state)?.id_catedra)
    }

    /// Re-checks availability before selling and builds the sale request.
    ///
    /// Returns the request and the seats whose hold expired and must be held
    /// again.
    fn preparar_venta(
        state: &CompraState,
        snapshot: Option<&SnapshotAsientos>,
        now: DateTime<Utc>,
    ) -> Result<(RealizarVentaRequest, Vec<Asiento>), CompraError> {
        let matriz = Self::matriz(state, snapshot, now)?;
        let mut rebloquear = Vec::new();
        for seleccionado in &state.asientos {
            match matriz.estado(seleccionado.asiento) {
                Some(EstadoAsiento::Vendido) | None => {
                    return Err(CompraError::AsientoVendido(seleccionado.asiento.to_string()));
                },
                Some(EstadoAsiento::Disponible) => rebloquear.push(seleccionado.asiento),
                Some(EstadoAsiento::Bloqueado) => {},
            }
        }

        let precio_entrada = state
            .evento
            .as_ref()
            .map(|e| e.precio_entrada)
            .unwrap_or_default();
        let cantidad = u32::try_from(state.asientos.len())
            .map_err(|_| CompraError::Interno("too many seats".to_string()))?;
        let precio_venta = precio_entrada
            .checked_multiply(cantidad)
            .ok_or_else(|| CompraError::Interno("sale total overflow".to_string()))?;

        let request = RealizarVentaRequest {
            evento_id: matriz.evento_id_catedra,
            fecha: now,
            precio_venta,
            asientos: state
                .asientos
                .iter()
                .map(|s| AsientoVenta {
                    fila: s.asiento.fila,
                    columna: s.asiento.columna,
                    persona: s.nombre_persona.as_deref().unwrap_or_default().trim().to_string(),
                })
                .collect(),
        };
        Ok((request, rebloquear))
    }

    fn nueva_venta(
        state: &CompraState,
        request: &RealizarVentaRequest,
        now: DateTime<Utc>,
    ) -> Result<NuevaVenta, CompraError> {
        let sesion = state.sesion.as_ref().ok_or(CompraError::SesionNoEncontrada)?;
        Ok(NuevaVenta {
            id_venta_catedra: None,
            usuario_id: sesion.usuario_id,
            evento_id: sesion.evento_id,
            fecha_venta: now,
            precio_total: request.precio_venta,
            exitosa: false,
            descripcion: None,
            estado_sincronizacion: EstadoSincronizacion::Pendiente,
            asientos: request
                .asientos
                .iter()
                .map(|a| AsientoVendido {
                    asiento: Asiento::new(a.fila, a.columna),
                    nombre_persona: Some(a.persona.clone()),
                    estado: None,
                })
                .collect(),
        })
    }

    // ========================================================================
    // Effects
    // ========================================================================

    fn persistir(env: &CompraEnvironment, sesion: Sesion, asientos: Option<Vec<AsientoSeleccionado>>) -> Effect<CompraAction> {
        let sesiones = Arc::clone(&env.sesiones);
        let cache = Arc::clone(&env.cache);
        let ttl = env.politica.ttl;
        Effect::Future(Box::pin(async move {
            guardar_sesion(sesiones.as_ref(), cache.as_ref(), &sesion, asientos.as_deref(), ttl)
                .await
                .err()
                .map(|e| CompraAction::Fallo { error: e.into() })
        }))
    }

    fn enviar_venta(env: &CompraEnvironment, request: RealizarVentaRequest) -> Effect<CompraAction> {
        let catedra = Arc::clone(&env.catedra);
        Effect::Future(Box::pin(async move {
            match catedra.realizar_venta(&request).await {
                Ok(respuesta) => Some(CompraAction::VentaRespondida { request, respuesta }),
                Err(error) => Some(CompraAction::VentaNoEnviada { request, error }),
            }
        }))
    }

    /// Sale cátedra accepted but whose seats are already sold locally.
    ///
    /// Kept without seat rows and flagged for reconciliation, so the
    /// authority's sale id is not lost.
    fn venta_en_conflicto(mut venta: NuevaVenta, asiento: &str) -> NuevaVenta {
        let asientos = venta
            .asientos
            .iter()
            .map(|a| a.asiento.clave())
            .collect::<Vec<_>>()
            .join(" ");
        venta.estado_sincronizacion = EstadoSincronizacion::Error;
        venta.descripcion = Some(format!(
            "accepted by cátedra but seat {asiento} is already sold locally; seats: {asientos}"
        ));
        venta.asientos.clear();
        venta
    }

    /// Stores the sale, then closes the session when the sale went through.
    fn registrar_venta(env: &CompraEnvironment, venta: NuevaVenta, cerrar: Option<Sesion>) -> Effect<CompraAction> {
        let ventas = Arc::clone(&env.ventas);
        let sesiones = Arc::clone(&env.sesiones);
        let cache = Arc::clone(&env.cache);
        Effect::Future(Box::pin(async move {
            let respaldo = venta.exitosa.then(|| venta.clone());
            let insertada = match (ventas.insert(venta).await, respaldo) {
                (Err(RepositoryError::Conflict(asiento)), Some(respaldo)) => {
                    tracing::error!(
                        venta_catedra = ?respaldo.id_venta_catedra,
                        evento_id = %respaldo.evento_id,
                        asiento = %asiento,
                        "Sale accepted by cátedra clashes with a local sale, stored for reconciliation"
                    );
                    ventas.insert(Self::venta_en_conflicto(respaldo, &asiento)).await
                },
                (resultado, _) => resultado,
            };
            let venta = match insertada {
                Ok(venta) => venta,
                Err(e) => return Some(CompraAction::Fallo { error: e.into() }),
            };
            if let Some(sesion) = cerrar {
                if let Err(e) = cerrar_sesion(sesiones.as_ref(), cache.as_ref(), &sesion).await {
                    tracing::error!(
                        sesion_id = %sesion.id,
                        venta_id = %venta.id,
                        error = %e,
                        "Sale stored but the session could not be closed"
                    );
                }
            }
            Some(CompraAction::VentaRegistrada { venta })
        }))
    }
}

impl Reducer for CompraReducer {
    type State = CompraState;
    type Action = CompraAction;
    type Environment = CompraEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per step of the workflow
    fn reduce(&self, state: &mut CompraState, action: CompraAction, env: &CompraEnvironment) -> Effects {
        match action {
            // ========== Start ==========
            CompraAction::Iniciar { usuario, evento_id } => {
                state.last_error = None;
                state.usuario = Some(usuario);
                state.venta = None;

                // The open session survives until the new event checks out.
                let eventos = Arc::clone(&env.eventos);
                smallvec![Effect::Future(Box::pin(async move {
                    match eventos.find(evento_id).await {
                        Ok(evento) => Some(CompraAction::EventoCargado { evento_id, evento }),
                        Err(e) => Some(CompraAction::Fallo { error: e.into() }),
                    }
                }))]
            },

            CompraAction::EventoCargado { evento_id, evento } => {
                let Some(usuario) = state.usuario else {
                    return Self::fallar(state, CompraError::Interno("buyer not set".to_string()));
                };
                let Some(evento) = evento else {
                    return Self::fallar(state, CompraError::EventoNoEncontrado(evento_id));
                };
                if !evento.activo {
                    return Self::fallar(state, CompraError::EventoInactivo(evento.id));
                }

                let previa = state.sesion.take().filter(Sesion::abierta).map(|mut s| {
                    s.cerrar();
                    s
                });
                if let Some(previa) = &previa {
                    tracing::info!(usuario = %usuario, sesion_id = %previa.id, "Closing previous purchase session");
                }
                state.asientos.clear();

                let now = env.clock.now();
                let nueva = NuevaSesion {
                    usuario_id: usuario,
                    evento_id: evento.id,
                    estado: EstadoSesion::SeleccionAsientos,
                    fecha_inicio: now,
                    ultima_actividad: now,
                    expiracion: now + env.politica.ttl,
                };
                state.evento = Some(evento);

                let sesiones = Arc::clone(&env.sesiones);
                let cache = Arc::clone(&env.cache);
                smallvec![Effect::Future(Box::pin(async move {
                    if let Some(previa) = previa {
                        if let Err(e) = cerrar_sesion(sesiones.as_ref(), cache.as_ref(), &previa).await {
                            return Some(CompraAction::Fallo { error: e.into() });
                        }
                    }
                    match sesiones.insert(nueva).await {
                        Ok(sesion) => Some(CompraAction::SesionCreada { sesion }),
                        Err(e) => Some(CompraAction::Fallo { error: e.into() }),
                    }
                }))]
            },

            CompraAction::SesionCreada { sesion } => {
                tracing::info!(
                    usuario = %sesion.usuario_id,
                    sesion_id = %sesion.id,
                    evento_id = %sesion.evento_id,
                    "Purchase session started"
                );
                let entry = SesionCacheEntry::from(&sesion);
                state.sesion = Some(sesion);

                let cache = Arc::clone(&env.cache);
                let ttl = env.politica.ttl;
                smallvec![Effect::Future(Box::pin(async move {
                    cache
                        .put(&entry, ttl)
                        .await
                        .err()
                        .map(|e| CompraAction::Fallo { error: e.into() })
                }))]
            },

            // ========== Seat selection ==========
            CompraAction::SeleccionarAsientos { asientos } => {
                state.last_error = None;
                let config = match Self::validar_seleccion(state, &asientos, &env.politica) {
                    Ok(config) => config,
                    Err(e) => return Self::fallar(state, e),
                };

                let feed = Arc::clone(&env.asientos);
                smallvec![Effect::Future(Box::pin(async move {
                    match feed.snapshot(config.id_catedra).await {
                        Ok(snapshot) => Some(CompraAction::AsientosConsultados { asientos, snapshot }),
                        Err(e) => Some(CompraAction::Fallo {
                            error: CompraError::ProxyNoDisponible(e.to_string()),
                        }),
                    }
                }))]
            },

            CompraAction::AsientosConsultados { asientos, snapshot } => {
                let id_catedra =
                    match Self::verificar_libres(state, &asientos, snapshot.as_ref(), env.clock.now()) {
                        Ok(id) => id,
                        Err(e) => return Self::fallar(state, e),
                    };

                let catedra = Arc::clone(&env.catedra);
                smallvec![Effect::Future(Box::pin(async move {
                    match catedra.bloquear_asientos(id_catedra, &asientos).await {
                        Ok(respuesta) => Some(CompraAction::BloqueoRespondido { asientos, respuesta }),
                        Err(e) => Some(CompraAction::Fallo {
                            error: CompraError::CatedraNoDisponible(e.to_string()),
                        }),
                    }
                }))]
            },

            CompraAction::BloqueoRespondido { asientos, respuesta } => {
                if !respuesta.exitoso() {
                    tracing::warn!(motivo = %respuesta.motivo(), "Seat hold rejected by cátedra");
                    return Self::fallar(state, CompraError::BloqueoRechazado(respuesta.motivo()));
                }
                if Self::sesion_abierta(state).is_err() {
                    return Self::fallar(state, CompraError::SesionNoEncontrada);
                }

                let now = env.clock.now();
                let seleccion: Vec<AsientoSeleccionado> =
                    asientos.into_iter().map(AsientoSeleccionado::sin_nombre).collect();
                state.asientos.clone_from(&seleccion);

                let mut sesion_actualizada = None;
                if let Some(sesion) = state.sesion.as_mut() {
                    sesion.estado = EstadoSesion::CargaDatos;
                    sesion.tocar(now, env.politica.ttl);
                    sesion_actualizada = Some(sesion.clone());
                }
                sesion_actualizada
                    .map(|sesion| {
                        tracing::info!(sesion_id = %sesion.id, asientos = seleccion.len(), "Seats held");
                        smallvec![Self::persistir(env, sesion, Some(seleccion))]
                    })
                    .unwrap_or_default()
            },

            // ========== Attendee names ==========
            CompraAction::AsignarNombres { nombres } => {
                state.last_error = None;
                let nombrados = match Self::nombrar(state, &nombres, &env.politica) {
                    Ok(nombrados) => nombrados,
                    Err(e) => return Self::fallar(state, e),
                };
                state.asientos.clone_from(&nombrados);

                let now = env.clock.now();
                let mut sesion_actualizada = None;
                if let Some(sesion) = state.sesion.as_mut() {
                    sesion.tocar(now, env.politica.ttl);
                    sesion_actualizada = Some(sesion.clone());
                }
                sesion_actualizada
                    .map(|sesion| smallvec![Self::persistir(env, sesion, Some(nombrados))])
                    .unwrap_or_default()
            },

            // ========== Confirmation ==========
            CompraAction::Confirmar => {
                state.last_error = None;
                state.venta = None;
                let id_catedra = match Self::validar_confirmacion(state, &env.politica) {
                    Ok(id) => id,
                    Err(e) => return Self::fallar(state, e),
                };

                let feed = Arc::clone(&env.asientos);
                smallvec![Effect::Future(Box::pin(async move {
                    match feed.snapshot(id_catedra).await {
                        Ok(snapshot) => Some(CompraAction::DisponibilidadParaVenta { snapshot }),
                        Err(e) => Some(CompraAction::Fallo {
                            error: CompraError::ProxyNoDisponible(e.to_string()),
                        }),
                    }
                }))]
            },

            CompraAction::DisponibilidadParaVenta { snapshot } => {
                let (request, rebloquear) =
                    match Self::preparar_venta(state, snapshot.as_ref(), env.clock.now()) {
                        Ok(preparada) => preparada,
                        Err(e) => return Self::fallar(state, e),
                    };

                if rebloquear.is_empty() {
                    return smallvec![Self::enviar_venta(env, request)];
                }

                tracing::info!(asientos = rebloquear.len(), "Renewing expired seat holds before selling");
                let catedra = Arc::clone(&env.catedra);
                smallvec![Effect::Future(Box::pin(async move {
                    match catedra.bloquear_asientos(request.evento_id, &rebloquear).await {
                        Ok(respuesta) => Some(CompraAction::ReBloqueoRespondido { request, respuesta }),
                        Err(e) => Some(CompraAction::Fallo {
                            error: CompraError::CatedraNoDisponible(e.to_string()),
                        }),
                    }
                }))]
            },

            CompraAction::ReBloqueoRespondido { request, respuesta } => {
                if !respuesta.exitoso() {
                    return Self::fallar(state, CompraError::ReBloqueoFallido(respuesta.motivo()));
                }
                smallvec![Self::enviar_venta(env, request)]
            },

            CompraAction::VentaNoEnviada { request, error } => {
                tracing::error!(error = %error, "Sale could not be delivered to cátedra, stored as pending");
                let mut venta = match Self::nueva_venta(state, &request, env.clock.now()) {
                    Ok(venta) => venta,
                    Err(e) => return Self::fallar(state, e),
                };
                venta.descripcion = Some(error.to_string());
                Self::fallar(state, CompraError::CatedraNoDisponible(error.to_string()));
                smallvec![Self::registrar_venta(env, venta, None)]
            },

            CompraAction::VentaRespondida { request, respuesta } => {
                let mut venta = match Self::nueva_venta(state, &request, env.clock.now()) {
                    Ok(venta) => venta,
                    Err(e) => return Self::fallar(state, e),
                };
                venta.descripcion.clone_from(&respuesta.descripcion);

                if !respuesta.resultado {
                    let motivo = respuesta.descripcion.unwrap_or_default();
                    tracing::warn!(motivo = %motivo, "Sale rejected by cátedra");
                    venta.estado_sincronizacion = EstadoSincronizacion::Error;
                    Self::fallar(state, CompraError::VentaRechazada(motivo));
                    return smallvec![Self::registrar_venta(env, venta, None)];
                }

                venta.exitosa = true;
                venta.estado_sincronizacion = EstadoSincronizacion::Sincronizada;
                venta.id_venta_catedra = respuesta.venta_id;
                if !respuesta.asientos.is_empty() {
                    venta.asientos = respuesta
                        .asientos
                        .into_iter()
                        .map(|a| AsientoVendido {
                            asiento: Asiento::new(a.fila, a.columna),
                            nombre_persona: a.persona,
                            estado: a.estado,
                        })
                        .collect();
                }

                state.asientos.clear();
                let cerrada = state.sesion.as_mut().map(|sesion| {
                    sesion.cerrar();
                    sesion.clone()
                });
                tracing::info!(
                    venta_catedra = ?venta.id_venta_catedra,
                    total = %venta.precio_total,
                    "Sale accepted by cátedra"
                );
                smallvec![Self::registrar_venta(env, venta, cerrada)]
            },

            CompraAction::VentaRegistrada { venta } => {
                state.venta = Some(venta);
                SmallVec::new()
            },

            // ========== Session housekeeping ==========
            CompraAction::Cancelar => {
                state.last_error = None;
                if Self::sesion_abierta(state).is_err() {
                    return Self::fallar(state, CompraError::SesionNoEncontrada);
                }
                state.asientos.clear();
                let cerrada = state.sesion.as_mut().map(|sesion| {
                    sesion.cerrar();
                    sesion.clone()
                });
                let Some(sesion) = cerrada else {
                    return SmallVec::new();
                };
                tracing::info!(sesion_id = %sesion.id, "Purchase session cancelled");

                let sesiones = Arc::clone(&env.sesiones);
                let cache = Arc::clone(&env.cache);
                smallvec![Effect::Future(Box::pin(async move {
                    cerrar_sesion(sesiones.as_ref(), cache.as_ref(), &sesion)
                        .await
                        .err()
                        .map(|e| CompraAction::Fallo { error: e.into() })
                }))]
            },

            CompraAction::RegistrarActividad => {
                state.last_error = None;
                if Self::sesion_abierta(state).is_err() {
                    return Self::fallar(state, CompraError::SesionNoEncontrada);
                }
                let now = env.clock.now();
                let tocada = state.sesion.as_mut().map(|sesion| {
                    sesion.tocar(now, env.politica.ttl);
                    sesion.clone()
                });
                tocada
                    .map(|sesion| smallvec![Self::persistir(env, sesion, None)])
                    .unwrap_or_default()
            },

            CompraAction::Fallo { error } => {
                tracing::warn!(code = error.code(), error = %error, "Purchase effect failed");
                Self::fallar(state, error)
            },
        }
    }
}
