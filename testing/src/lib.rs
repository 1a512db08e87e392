//! # Evento Testing
//!
//! Testing utilities for the evento workspace.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - The [`ReducerTest`] given/when/then harness
//! - In-memory implementations of every storage port ([`memory`])
//! - Scriptable cátedra and proxy stand-ins ([`stubs`])
//!
//! ## Example
//!
//! ```ignore
//! use evento_testing::{Puertos, test_clock};
//! use evento_runtime::EffectRunner;
//!
//! #[tokio::test]
//! async fn buyer_can_start_a_session() {
//!     let puertos = Puertos::new(test_clock());
//!     puertos.eventos.insert(evento_de_prueba());
//!     let runner = EffectRunner::new(CompraReducer::new(), puertos.environment());
//!
//!     let mut state = CompraState::for_usuario(UsuarioId(1));
//!     runner.send(&mut state, CompraAction::Iniciar { .. }).await?;
//!
//!     assert!(state.sesion.is_some());
//! }
//! ```

use chrono::{DateTime, Utc};
use evento_core::environment::Clock;

pub mod memory;
pub mod stubs;

/// Deterministic clocks.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use evento_testing::mocks::FixedClock;
    /// use evento_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the code under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            if let Ok(mut time) = self.time.lock() {
                *time = to;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map(|time| *time)
                .unwrap_or_else(|poisoned| *poisoned.into_inner())
        }
    }

    /// Start time of every test clock: 2025-01-01 00:00:00 UTC.
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is a literal.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Sample data shared by the workspace tests.
pub mod fixtures {
    use evento_core::catedra::{EventoCatedra, EventoTipoCatedra, IntegranteCatedra};
    use evento_core::types::{Evento, EventoId, Money, Usuario, UsuarioId};

    /// Active event with a 10 x 8 grid, cátedra id 501 and a 1500.00 ticket.
    #[must_use]
    pub fn evento(id: i64) -> Evento {
        Evento {
            id: EventoId(id),
            id_catedra: Some(500 + id),
            titulo: format!("Evento {id}"),
            resumen: Some("Resumen".to_string()),
            descripcion: None,
            fecha: None,
            direccion: Some("Av. Siempre Viva 742".to_string()),
            imagen: None,
            fila_asientos: Some(10),
            columna_asientos: Some(8),
            precio_entrada: Money::from_cents(150_000),
            activo: true,
            fecha_sincronizacion: None,
            evento_tipo: None,
            integrantes: Vec::new(),
        }
    }

    /// Catalog entry as cátedra would publish it.
    #[must_use]
    pub fn evento_catedra(id: i64, titulo: &str) -> EventoCatedra {
        EventoCatedra {
            id,
            titulo: titulo.to_string(),
            resumen: None,
            descripcion: Some(format!("{titulo} en vivo")),
            fecha: None,
            direccion: None,
            imagen: None,
            fila_asientos: Some(5),
            columna_asientos: Some(5),
            precio_entrada: Some(Money::from_cents(200_000)),
            evento_tipo: Some(EventoTipoCatedra {
                nombre: "Concierto".to_string(),
                descripcion: None,
            }),
            integrantes: vec![IntegranteCatedra {
                nombre: "Ana".to_string(),
                apellido: Some("Paz".to_string()),
                identificacion: None,
            }],
        }
    }

    /// Active user whose password is `user` (SHA-256 hex stored).
    #[must_use]
    pub fn usuario(id: i64, login: &str, admin: bool) -> Usuario {
        Usuario {
            id: UsuarioId(id),
            login: login.to_string(),
            password_hash: "04f8996da763b7a969b1028ee3007569eaf3a635486ddab211d512c85b9df8fb"
                .to_string(),
            nombre: None,
            admin,
            activo: true,
        }
    }
}

// Re-export commonly used items
pub use memory::{
    InMemoryEventos, InMemorySesionCache, InMemorySesiones, InMemoryUsuarios, InMemoryVentas,
    Puertos,
};
pub use mocks::{FixedClock, ManualClock, test_clock, test_time};
pub use reducer_test::ReducerTest;
pub use stubs::{StubCatedra, StubSeatFeed};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fixed_clock_never_moves() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(test_time());
        let handle = clock.clone();

        handle.advance(Duration::minutes(31));

        assert_eq!(clock.now(), test_time() + Duration::minutes(31));
    }
}
