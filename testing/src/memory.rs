//! In-memory implementations of the storage ports.
//!
//! They keep the same observable rules as the PostgreSQL repositories (id
//! assignment, the open-session lookup, the sold-seat uniqueness check) so
//! services can be tested without Docker.

use crate::stubs::{StubCatedra, StubSeatFeed};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use evento_core::catedra::EventoCatedra;
use evento_core::compra::{CompraEnvironment, PoliticaCompra};
use evento_core::environment::Clock;
use evento_core::repository::{
    EventoRepository, RepositoryError, Result, SesionCache, SesionCacheEntry, SesionRepository,
    Upsert, UsuarioRepository, VentaRepository,
};
use evento_core::types::{
    AsientoSeleccionado, EstadoSesion, Evento, EventoId, EventoTipo, EventoTipoId, Integrante,
    Money, NuevaSesion, NuevaVenta, Sesion, SesionId, Usuario, UsuarioId, Venta, VentaId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Storage("Mutex lock failed".to_string()))
}

fn leer<T, R>(mutex: &Mutex<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
    mutex.lock().ok().map(|guard| f(&guard))
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Default)]
struct EventosState {
    eventos: BTreeMap<EventoId, Evento>,
    tipos: Vec<EventoTipo>,
    next_id: i64,
}

/// In-memory [`EventoRepository`].
#[derive(Debug, Default)]
pub struct InMemoryEventos {
    state: Mutex<EventosState>,
}

impl InMemoryEventos {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an event under its own id.
    pub fn insert(&self, evento: Evento) {
        if let Ok(mut state) = self.state.lock() {
            state.next_id = state.next_id.max(evento.id.get());
            state.eventos.insert(evento.id, evento);
        }
    }

    /// Every stored event, by id.
    #[must_use]
    pub fn todos(&self) -> Vec<Evento> {
        leer(&self.state, |s| s.eventos.values().cloned().collect()).unwrap_or_default()
    }
}

fn copiar_desde_catedra(
    evento: &mut Evento,
    fuente: &EventoCatedra,
    tipo: Option<EventoTipo>,
    now: DateTime<Utc>,
) {
    evento.id_catedra = Some(fuente.id);
    evento.titulo.clone_from(&fuente.titulo);
    evento.resumen.clone_from(&fuente.resumen);
    evento.descripcion.clone_from(&fuente.descripcion);
    evento.fecha = fuente.fecha;
    evento.direccion.clone_from(&fuente.direccion);
    evento.imagen.clone_from(&fuente.imagen);
    evento.fila_asientos = fuente.fila_asientos;
    evento.columna_asientos = fuente.columna_asientos;
    evento.precio_entrada = fuente.precio_entrada.unwrap_or(Money::ZERO);
    evento.activo = true;
    evento.fecha_sincronizacion = Some(now);
    evento.evento_tipo = tipo;
    evento.integrantes = fuente
        .integrantes
        .iter()
        .map(|i| Integrante {
            nombre: i.nombre.clone(),
            apellido: i.apellido.clone(),
            identificacion: i.identificacion.clone(),
        })
        .collect();
}

#[async_trait]
impl EventoRepository for InMemoryEventos {
    async fn find(&self, id: EventoId) -> Result<Option<Evento>> {
        Ok(lock(&self.state)?.eventos.get(&id).cloned())
    }

    async fn list_activos(&self) -> Result<Vec<Evento>> {
        let mut activos: Vec<Evento> = lock(&self.state)?
            .eventos
            .values()
            .filter(|e| e.activo)
            .cloned()
            .collect();
        activos.sort_by_key(|e| (e.fecha.is_none(), e.fecha, e.id));
        Ok(activos)
    }

    async fn upsert_desde_catedra(&self, fuente: &EventoCatedra, now: DateTime<Utc>) -> Result<Upsert> {
        let mut state = lock(&self.state)?;

        let tipo = match &fuente.evento_tipo {
            Some(tipo) => {
                let existente = state.tipos.iter().find(|t| t.nombre == tipo.nombre).cloned();
                Some(existente.unwrap_or_else(|| {
                    let nuevo = EventoTipo {
                        id: EventoTipoId(i64::try_from(state.tipos.len()).unwrap_or(i64::MAX) + 1),
                        nombre: tipo.nombre.clone(),
                        descripcion: tipo.descripcion.clone(),
                    };
                    state.tipos.push(nuevo.clone());
                    nuevo
                }))
            },
            None => None,
        };

        if let Some(evento) = state
            .eventos
            .values_mut()
            .find(|e| e.id_catedra == Some(fuente.id))
        {
            copiar_desde_catedra(evento, fuente, tipo, now);
            return Ok(Upsert::Actualizado(evento.id));
        }

        state.next_id += 1;
        let id = EventoId(state.next_id);
        let mut evento = Evento {
            id,
            id_catedra: None,
            titulo: String::new(),
            resumen: None,
            descripcion: None,
            fecha: None,
            direccion: None,
            imagen: None,
            fila_asientos: None,
            columna_asientos: None,
            precio_entrada: Money::ZERO,
            activo: true,
            fecha_sincronizacion: None,
            evento_tipo: None,
            integrantes: Vec::new(),
        };
        copiar_desde_catedra(&mut evento, fuente, tipo, now);
        state.eventos.insert(id, evento);
        Ok(Upsert::Creado(id))
    }

    async fn desactivar_ausentes(&self, vigentes: &[i64], now: DateTime<Utc>) -> Result<u64> {
        let mut state = lock(&self.state)?;
        let mut desactivados = 0;
        for evento in state.eventos.values_mut() {
            let ausente = evento.id_catedra.is_some_and(|id| !vigentes.contains(&id));
            if evento.activo && ausente {
                evento.activo = false;
                evento.fecha_sincronizacion = Some(now);
                desactivados += 1;
            }
        }
        Ok(desactivados)
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Default)]
struct SesionesState {
    sesiones: BTreeMap<SesionId, Sesion>,
    asientos: HashMap<SesionId, Vec<AsientoSeleccionado>>,
    next_id: i64,
    fallar: bool,
}

/// In-memory [`SesionRepository`].
#[derive(Debug, Default)]
pub struct InMemorySesiones {
    state: Mutex<SesionesState>,
}

impl InMemorySesiones {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an existing session and its seats as they are.
    pub fn sembrar(&self, sesion: Sesion, asientos: Vec<AsientoSeleccionado>) {
        if let Ok(mut state) = self.state.lock() {
            state.next_id = state.next_id.max(sesion.id.get());
            state.asientos.insert(sesion.id, asientos);
            state.sesiones.insert(sesion.id, sesion);
        }
    }

    /// Makes every write fail with a storage error.
    pub fn fallar_escrituras(&self, fallar: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fallar = fallar;
        }
    }

    /// Every stored session, by id.
    #[must_use]
    pub fn todas(&self) -> Vec<Sesion> {
        leer(&self.state, |s| s.sesiones.values().cloned().collect()).unwrap_or_default()
    }

    /// Held seats of a session.
    #[must_use]
    pub fn asientos_de(&self, sesion: SesionId) -> Vec<AsientoSeleccionado> {
        leer(&self.state, |s| s.asientos.get(&sesion).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn escribir(&self) -> Result<MutexGuard<'_, SesionesState>> {
        let state = lock(&self.state)?;
        if state.fallar {
            return Err(RepositoryError::Storage("connection refused".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl SesionRepository for InMemorySesiones {
    async fn find_abierta(&self, usuario: UsuarioId) -> Result<Option<Sesion>> {
        Ok(lock(&self.state)?
            .sesiones
            .values()
            .rev()
            .find(|s| s.usuario_id == usuario && s.estado != EstadoSesion::Completado)
            .cloned())
    }

    async fn insert(&self, sesion: NuevaSesion) -> Result<Sesion> {
        let mut state = self.escribir()?;
        state.next_id += 1;
        let sesion = sesion.con_id(SesionId(state.next_id));
        state.sesiones.insert(sesion.id, sesion.clone());
        Ok(sesion)
    }

    async fn update(&self, sesion: &Sesion) -> Result<()> {
        let mut state = self.escribir()?;
        let guardada = state
            .sesiones
            .get_mut(&sesion.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("sesion {}", sesion.id)))?;
        guardada.clone_from(sesion);
        Ok(())
    }

    async fn asientos(&self, sesion: SesionId) -> Result<Vec<AsientoSeleccionado>> {
        Ok(lock(&self.state)?
            .asientos
            .get(&sesion)
            .cloned()
            .unwrap_or_default())
    }

    async fn reemplazar_asientos(&self, sesion: SesionId, asientos: &[AsientoSeleccionado]) -> Result<()> {
        let mut state = self.escribir()?;
        if asientos.is_empty() {
            state.asientos.remove(&sesion);
        } else {
            state.asientos.insert(sesion, asientos.to_vec());
        }
        Ok(())
    }

    async fn expiradas(&self, limite: DateTime<Utc>) -> Result<Vec<Sesion>> {
        Ok(lock(&self.state)?
            .sesiones
            .values()
            .filter(|s| s.abierta() && s.ultima_actividad < limite)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Sales
// ============================================================================

#[derive(Debug, Default)]
struct VentasState {
    ventas: Vec<Venta>,
    next_id: i64,
}

/// In-memory [`VentaRepository`].
#[derive(Debug, Default)]
pub struct InMemoryVentas {
    state: Mutex<VentasState>,
}

impl InMemoryVentas {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored sale, oldest first.
    #[must_use]
    pub fn todas(&self) -> Vec<Venta> {
        leer(&self.state, |s| s.ventas.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VentaRepository for InMemoryVentas {
    async fn insert(&self, venta: NuevaVenta) -> Result<Venta> {
        let mut state = lock(&self.state)?;

        if venta.exitosa {
            let vendido = state
                .ventas
                .iter()
                .filter(|v| v.exitosa && v.evento_id == venta.evento_id)
                .flat_map(|v| v.asientos.iter())
                .find(|a| venta.asientos.iter().any(|n| n.asiento == a.asiento));
            if let Some(vendido) = vendido {
                return Err(RepositoryError::Conflict(vendido.asiento.to_string()));
            }
        }

        state.next_id += 1;
        let venta = venta.con_id(VentaId(state.next_id));
        state.ventas.push(venta.clone());
        Ok(venta)
    }

    async fn list_por_usuario(&self, usuario: UsuarioId) -> Result<Vec<Venta>> {
        let mut ventas: Vec<Venta> = lock(&self.state)?
            .ventas
            .iter()
            .filter(|v| v.usuario_id == usuario)
            .cloned()
            .collect();
        ventas.sort_by(|a, b| b.fecha_venta.cmp(&a.fecha_venta).then(b.id.cmp(&a.id)));
        Ok(ventas)
    }

    async fn find_de_usuario(&self, usuario: UsuarioId, venta: VentaId) -> Result<Option<Venta>> {
        Ok(lock(&self.state)?
            .ventas
            .iter()
            .find(|v| v.id == venta && v.usuario_id == usuario)
            .cloned())
    }
}

// ============================================================================
// Users
// ============================================================================

/// In-memory [`UsuarioRepository`].
#[derive(Debug, Default)]
pub struct InMemoryUsuarios {
    usuarios: Mutex<Vec<Usuario>>,
}

impl InMemoryUsuarios {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user.
    pub fn insert(&self, usuario: Usuario) {
        if let Ok(mut usuarios) = self.usuarios.lock() {
            usuarios.push(usuario);
        }
    }
}

#[async_trait]
impl UsuarioRepository for InMemoryUsuarios {
    async fn find_by_login(&self, login: &str) -> Result<Option<Usuario>> {
        Ok(lock(&self.usuarios)?
            .iter()
            .find(|u| u.login == login)
            .cloned())
    }

    async fn find(&self, id: UsuarioId) -> Result<Option<Usuario>> {
        Ok(lock(&self.usuarios)?.iter().find(|u| u.id == id).cloned())
    }
}

// ============================================================================
// Session cache
// ============================================================================

/// In-memory [`SesionCache`] with expiry driven by a [`Clock`].
pub struct InMemorySesionCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<UsuarioId, (SesionCacheEntry, DateTime<Utc>)>>,
}

impl InMemorySesionCache {
    /// Empty cache reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Live entry of a user, without going through the async port.
    #[must_use]
    pub fn entrada(&self, usuario: UsuarioId) -> Option<SesionCacheEntry> {
        let now = self.clock.now();
        leer(&self.entries, |entries| {
            entries
                .get(&usuario)
                .filter(|(_, expira)| *expira > now)
                .map(|(entry, _)| entry.clone())
        })
        .flatten()
    }
}

#[async_trait]
impl SesionCache for InMemorySesionCache {
    async fn get(&self, usuario: UsuarioId) -> Result<Option<SesionCacheEntry>> {
        Ok(self.entrada(usuario))
    }

    async fn put(&self, entry: &SesionCacheEntry, ttl: Duration) -> Result<()> {
        let expira = self.clock.now() + ttl;
        lock(&self.entries)?.insert(entry.user_id, (entry.clone(), expira));
        Ok(())
    }

    async fn remove(&self, usuario: UsuarioId) -> Result<()> {
        lock(&self.entries)?.remove(&usuario);
        Ok(())
    }

    async fn ttl_restante(&self, usuario: UsuarioId) -> Result<Option<i64>> {
        let now = self.clock.now();
        Ok(lock(&self.entries)?
            .get(&usuario)
            .map(|(_, expira)| (*expira - now).num_seconds())
            .filter(|segundos| *segundos > 0))
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Every port of the purchase workflow, in memory and sharing one clock.
///
/// The cátedra stub is linked to the seat feed, so holds and sales it accepts
/// show up in later snapshots the way they would through the proxy.
#[derive(Clone)]
pub struct Puertos {
    /// Shared clock
    pub clock: Arc<dyn Clock>,
    /// Events
    pub eventos: Arc<InMemoryEventos>,
    /// Sessions
    pub sesiones: Arc<InMemorySesiones>,
    /// Sales
    pub ventas: Arc<InMemoryVentas>,
    /// Users
    pub usuarios: Arc<InMemoryUsuarios>,
    /// Session cache
    pub cache: Arc<InMemorySesionCache>,
    /// Cátedra stand-in
    pub catedra: Arc<StubCatedra>,
    /// Proxy stand-in
    pub feed: Arc<StubSeatFeed>,
}

impl Puertos {
    /// Fresh ports reading time from `clock`.
    #[must_use]
    pub fn new<C>(clock: C) -> Self
    where
        C: Clock + 'static,
    {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        let feed = Arc::new(StubSeatFeed::new());
        Self {
            eventos: Arc::new(InMemoryEventos::new()),
            sesiones: Arc::new(InMemorySesiones::new()),
            ventas: Arc::new(InMemoryVentas::new()),
            usuarios: Arc::new(InMemoryUsuarios::new()),
            cache: Arc::new(InMemorySesionCache::new(Arc::clone(&clock))),
            catedra: Arc::new(StubCatedra::new().con_feed(Arc::clone(&feed), Arc::clone(&clock))),
            feed,
            clock,
        }
    }

    /// Purchase environment with the default policy.
    #[must_use]
    pub fn environment(&self) -> CompraEnvironment {
        self.environment_con(PoliticaCompra::default())
    }

    /// Purchase environment with a custom policy.
    #[must_use]
    pub fn environment_con(&self, politica: PoliticaCompra) -> CompraEnvironment {
        CompraEnvironment {
            clock: Arc::clone(&self.clock),
            catedra: self.catedra.clone(),
            asientos: self.feed.clone(),
            eventos: self.eventos.clone(),
            sesiones: self.sesiones.clone(),
            ventas: self.ventas.clone(),
            cache: self.cache.clone(),
            politica,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::mocks::{ManualClock, test_time};
    use evento_core::types::{Asiento, AsientoVendido, EstadoSincronizacion};

    fn venta(evento: i64, exitosa: bool, asientos: &[(u32, u32)]) -> NuevaVenta {
        NuevaVenta {
            id_venta_catedra: None,
            usuario_id: UsuarioId(1),
            evento_id: EventoId(evento),
            fecha_venta: test_time(),
            precio_total: Money::from_cents(100),
            exitosa,
            descripcion: None,
            estado_sincronizacion: EstadoSincronizacion::Sincronizada,
            asientos: asientos
                .iter()
                .map(|(f, c)| AsientoVendido {
                    asiento: Asiento::new(*f, *c),
                    nombre_persona: None,
                    estado: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn sold_seat_cannot_be_sold_twice() {
        let ventas = InMemoryVentas::new();
        ventas.insert(venta(1, true, &[(1, 1), (1, 2)])).await.unwrap();

        // Failed attempts and other events never conflict.
        ventas.insert(venta(1, false, &[(1, 1)])).await.unwrap();
        ventas.insert(venta(2, true, &[(1, 1)])).await.unwrap();

        let conflicto = ventas.insert(venta(1, true, &[(3, 3), (1, 2)])).await;
        assert!(matches!(conflicto, Err(RepositoryError::Conflict(_))));
        assert_eq!(ventas.todas().len(), 3);
    }

    #[tokio::test]
    async fn upsert_matches_by_catedra_id_and_reuses_categories() {
        let eventos = InMemoryEventos::new();
        let now = test_time();

        let primero = eventos
            .upsert_desde_catedra(&fixtures::evento_catedra(10, "Recital"), now)
            .await
            .unwrap();
        let segundo = eventos
            .upsert_desde_catedra(&fixtures::evento_catedra(11, "Obra"), now)
            .await
            .unwrap();
        let otra_vez = eventos
            .upsert_desde_catedra(&fixtures::evento_catedra(10, "Recital (nueva fecha)"), now)
            .await
            .unwrap();

        assert_eq!(primero, Upsert::Creado(EventoId(1)));
        assert_eq!(segundo, Upsert::Creado(EventoId(2)));
        assert_eq!(otra_vez, Upsert::Actualizado(EventoId(1)));

        let todos = eventos.todos();
        assert_eq!(todos[0].titulo, "Recital (nueva fecha)");
        assert_eq!(todos[0].evento_tipo, todos[1].evento_tipo);

        let desactivados = eventos.desactivar_ausentes(&[11], now).await.unwrap();
        assert_eq!(desactivados, 1);
        assert_eq!(eventos.list_activos().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cache_entries_expire_with_the_clock() {
        let clock = ManualClock::new(test_time());
        let cache = InMemorySesionCache::new(Arc::new(clock.clone()));
        let entry = SesionCacheEntry {
            sesion_id: SesionId(1),
            estado: EstadoSesion::SeleccionAsientos,
            ultima_actividad: test_time(),
            expiracion: test_time() + Duration::minutes(30),
            evento_id: EventoId(1),
            user_id: UsuarioId(7),
        };

        cache.put(&entry, Duration::minutes(30)).await.unwrap();
        clock.advance(Duration::minutes(10));
        assert_eq!(cache.ttl_restante(UsuarioId(7)).await.unwrap(), Some(20 * 60));

        clock.advance(Duration::minutes(21));
        assert_eq!(cache.get(UsuarioId(7)).await.unwrap(), None);
        assert_eq!(cache.ttl_restante(UsuarioId(7)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn open_session_lookup_skips_completed_ones() {
        let sesiones = InMemorySesiones::new();
        let nueva = NuevaSesion {
            usuario_id: UsuarioId(1),
            evento_id: EventoId(1),
            estado: EstadoSesion::SeleccionAsientos,
            fecha_inicio: test_time(),
            ultima_actividad: test_time(),
            expiracion: test_time() + Duration::minutes(30),
        };

        let mut primera = sesiones.insert(nueva.clone()).await.unwrap();
        primera.cerrar();
        sesiones.update(&primera).await.unwrap();
        assert_eq!(sesiones.find_abierta(UsuarioId(1)).await.unwrap(), None);

        let segunda = sesiones.insert(nueva).await.unwrap();
        assert_eq!(sesiones.find_abierta(UsuarioId(1)).await.unwrap(), Some(segunda));

        sesiones.fallar_escrituras(true);
        assert!(sesiones.reemplazar_asientos(SesionId(2), &[]).await.is_err());
    }
}
