//! Domain types for the evento ticketing system.
//!
//! Value objects (identifiers, [`Money`], [`Asiento`]) and the entities the
//! backend persists: events, purchase sessions, selected seats and sales.
//! JSON field names follow the camelCase contract of the HTTP API.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw database identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Local identifier of an event.
    EventoId
);
numeric_id!(
    /// Identifier of a registered user.
    UsuarioId
);
numeric_id!(
    /// Identifier of a purchase session.
    SesionId
);
numeric_id!(
    /// Local identifier of a sale.
    VentaId
);
numeric_id!(
    /// Identifier of an event category.
    EventoTipoId
);

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Non-negative amount of money stored in cents.
///
/// On the wire it is a decimal number of currency units (`2500.5`), which is
/// what the cátedra API sends and expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from a decimal amount, rounding to the nearest cent.
    ///
    /// Returns `None` for negative, non-finite or out-of-range amounts.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_decimal(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let cents = (amount * 100.0).round();
        if cents > u64::MAX as f64 {
            return None;
        }
        Some(Self(cents as u64))
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount as a decimal number of currency units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Multiplies by a quantity with overflow checking.
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = f64::deserialize(deserializer)?;
        Self::from_decimal(amount)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {amount}")))
    }
}

// ============================================================================
// Seats
// ============================================================================

/// A seat position, 1-indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asiento {
    /// Row (1-indexed)
    pub fila: u32,
    /// Column (1-indexed)
    pub columna: u32,
}

impl Asiento {
    /// Creates a seat position.
    #[must_use]
    pub const fn new(fila: u32, columna: u32) -> Self {
        Self { fila, columna }
    }

    /// Key used by clients to address a seat: `"fila-columna"`.
    #[must_use]
    pub fn clave(&self) -> String {
        format!("{}-{}", self.fila, self.columna)
    }
}

impl fmt::Display for Asiento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fila {}, columna {}", self.fila, self.columna)
    }
}

/// Error parsing a `"fila-columna"` seat key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid seat key: {0}")]
pub struct ClaveAsientoInvalida(pub String);

impl FromStr for Asiento {
    type Err = ClaveAsientoInvalida;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (fila, columna) = s
            .split_once('-')
            .ok_or_else(|| ClaveAsientoInvalida(s.to_string()))?;
        let fila = fila
            .trim()
            .parse()
            .map_err(|_| ClaveAsientoInvalida(s.to_string()))?;
        let columna = columna
            .trim()
            .parse()
            .map_err(|_| ClaveAsientoInvalida(s.to_string()))?;
        Ok(Self { fila, columna })
    }
}

/// Availability of a seat in the matrix shown to buyers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoAsiento {
    /// Free to select
    Disponible,
    /// Held by some buyer until the hold expires
    Bloqueado,
    /// Sold
    Vendido,
}

// ============================================================================
// Enumerations stored as text
// ============================================================================

/// Error returned when a stored enumeration value is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ValorDesconocido {
    /// Enumeration name
    pub kind: &'static str,
    /// Offending value
    pub value: String,
}

/// Step of the purchase workflow a session is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoSesion {
    /// Browsing events
    SeleccionEvento,
    /// Choosing seats
    SeleccionAsientos,
    /// Seats held, entering attendee names
    CargaDatos,
    /// Closed (sold, cancelled or expired)
    Completado,
}

impl EstadoSesion {
    /// Database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SeleccionEvento => "SELECCION_EVENTO",
            Self::SeleccionAsientos => "SELECCION_ASIENTOS",
            Self::CargaDatos => "CARGA_DATOS",
            Self::Completado => "COMPLETADO",
        }
    }

    /// Parse from the database representation.
    ///
    /// # Errors
    ///
    /// Returns [`ValorDesconocido`] for unknown values.
    pub fn parse(s: &str) -> Result<Self, ValorDesconocido> {
        match s {
            "SELECCION_EVENTO" => Ok(Self::SeleccionEvento),
            "SELECCION_ASIENTOS" => Ok(Self::SeleccionAsientos),
            "CARGA_DATOS" => Ok(Self::CargaDatos),
            "COMPLETADO" => Ok(Self::Completado),
            other => Err(ValorDesconocido {
                kind: "EstadoSesion",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EstadoSesion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a local sale is known to cátedra.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoSincronizacion {
    /// Cátedra could not be reached; the buyer may retry
    Pendiente,
    /// Accepted by cátedra
    Sincronizada,
    /// Rejected by cátedra, or accepted but clashing with a locally sold seat
    Error,
}

impl EstadoSincronizacion {
    /// Database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pendiente => "PENDIENTE",
            Self::Sincronizada => "SINCRONIZADA",
            Self::Error => "ERROR",
        }
    }

    /// Parse from the database representation.
    ///
    /// # Errors
    ///
    /// Returns [`ValorDesconocido`] for unknown values.
    pub fn parse(s: &str) -> Result<Self, ValorDesconocido> {
        match s {
            "PENDIENTE" => Ok(Self::Pendiente),
            "SINCRONIZADA" => Ok(Self::Sincronizada),
            "ERROR" => Ok(Self::Error),
            other => Err(ValorDesconocido {
                kind: "EstadoSincronizacion",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventoTipo {
    /// Identifier
    pub id: EventoTipoId,
    /// Unique name
    pub nombre: String,
    /// Free text
    pub descripcion: Option<String>,
}

/// Performer of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrante {
    /// First name
    pub nombre: String,
    /// Last name
    pub apellido: Option<String>,
    /// Stage or document identification
    pub identificacion: Option<String>,
}

/// An event mirrored from cátedra.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evento {
    pub id: EventoId,
    /// Identifier in cátedra (unique)
    pub id_catedra: Option<i64>,
    pub titulo: String,
    pub resumen: Option<String>,
    pub descripcion: Option<String>,
    pub fecha: Option<DateTime<Utc>>,
    pub direccion: Option<String>,
    pub imagen: Option<String>,
    /// Seat rows
    pub fila_asientos: Option<u32>,
    /// Seat columns
    pub columna_asientos: Option<u32>,
    pub precio_entrada: Money,
    pub activo: bool,
    pub fecha_sincronizacion: Option<DateTime<Utc>>,
    pub evento_tipo: Option<EventoTipo>,
    #[serde(default)]
    pub integrantes: Vec<Integrante>,
}

// ============================================================================
// Purchase sessions
// ============================================================================

/// A user's in-progress purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sesion {
    pub id: SesionId,
    pub usuario_id: UsuarioId,
    pub evento_id: EventoId,
    pub estado: EstadoSesion,
    pub fecha_inicio: DateTime<Utc>,
    pub ultima_actividad: DateTime<Utc>,
    pub expiracion: DateTime<Utc>,
    pub activa: bool,
}

impl Sesion {
    /// True when the session has been idle for longer than `ttl`.
    #[must_use]
    pub fn expirada(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.ultima_actividad > ttl
    }

    /// Records activity at `now` and pushes the expiration `ttl` ahead.
    pub fn tocar(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.ultima_actividad = now;
        self.expiracion = now + ttl;
    }

    /// Moves the session to [`EstadoSesion::Completado`].
    pub fn cerrar(&mut self) {
        self.estado = EstadoSesion::Completado;
        self.activa = false;
    }

    /// True while the session can still make progress.
    #[must_use]
    pub fn abierta(&self) -> bool {
        self.estado != EstadoSesion::Completado
    }
}

/// Session data before the database assigns an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NuevaSesion {
    pub usuario_id: UsuarioId,
    pub evento_id: EventoId,
    pub estado: EstadoSesion,
    pub fecha_inicio: DateTime<Utc>,
    pub ultima_actividad: DateTime<Utc>,
    pub expiracion: DateTime<Utc>,
}

impl NuevaSesion {
    /// Attaches the id assigned by storage.
    #[must_use]
    pub fn con_id(self, id: SesionId) -> Sesion {
        Sesion {
            id,
            usuario_id: self.usuario_id,
            evento_id: self.evento_id,
            estado: self.estado,
            fecha_inicio: self.fecha_inicio,
            ultima_actividad: self.ultima_actividad,
            expiracion: self.expiracion,
            activa: true,
        }
    }
}

/// A seat held by a session, optionally with the attendee's name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsientoSeleccionado {
    #[serde(flatten)]
    pub asiento: Asiento,
    pub nombre_persona: Option<String>,
}

impl AsientoSeleccionado {
    /// A freshly held seat without a name.
    #[must_use]
    pub const fn sin_nombre(asiento: Asiento) -> Self {
        Self {
            asiento,
            nombre_persona: None,
        }
    }
}

// ============================================================================
// Sales
// ============================================================================

/// A seat included in a sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsientoVendido {
    #[serde(flatten)]
    pub asiento: Asiento,
    pub nombre_persona: Option<String>,
    /// Status text reported by cátedra
    pub estado: Option<String>,
}

/// A sale attempt and its synchronization outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venta {
    pub id: VentaId,
    pub id_venta_catedra: Option<i64>,
    pub usuario_id: UsuarioId,
    pub evento_id: EventoId,
    pub fecha_venta: DateTime<Utc>,
    pub precio_total: Money,
    pub exitosa: bool,
    pub descripcion: Option<String>,
    pub estado_sincronizacion: EstadoSincronizacion,
    #[serde(default)]
    pub asientos: Vec<AsientoVendido>,
}

/// Sale data before the database assigns an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NuevaVenta {
    pub id_venta_catedra: Option<i64>,
    pub usuario_id: UsuarioId,
    pub evento_id: EventoId,
    pub fecha_venta: DateTime<Utc>,
    pub precio_total: Money,
    pub exitosa: bool,
    pub descripcion: Option<String>,
    pub estado_sincronizacion: EstadoSincronizacion,
    pub asientos: Vec<AsientoVendido>,
}

impl NuevaVenta {
    /// Attaches the id assigned by storage.
    #[must_use]
    pub fn con_id(self, id: VentaId) -> Venta {
        Venta {
            id,
            id_venta_catedra: self.id_venta_catedra,
            usuario_id: self.usuario_id,
            evento_id: self.evento_id,
            fecha_venta: self.fecha_venta,
            precio_total: self.precio_total,
            exitosa: self.exitosa,
            descripcion: self.descripcion,
            estado_sincronizacion: self.estado_sincronizacion,
            asientos: self.asientos,
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// A registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usuario {
    pub id: UsuarioId,
    pub login: String,
    /// Hex-encoded SHA-256 of the password
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub nombre: Option<String>,
    pub admin: bool,
    pub activo: bool,
}
