//! `PostgreSQL` persistence for the evento backend.
//!
//! Implements the storage ports of `evento-core` with sqlx runtime queries:
//!
//! - [`PgEventoRepository`]: events mirrored from cátedra, with category and performers
//! - [`PgSesionRepository`]: purchase sessions and their held seats
//! - [`PgVentaRepository`]: sales; a seat can only be sold once per event
//! - [`PgUsuarioRepository`]: user lookup for login
//!
//! The schema lives in `migrations/` and is applied with [`migrate`].
//!
//! # Example
//!
//! ```ignore
//! use evento_postgres::{PgEventoRepository, connect, migrate};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/evento", 10).await?;
//!     migrate(&pool).await?;
//!     let eventos = PgEventoRepository::new(pool);
//!     Ok(())
//! }
//! ```

use evento_core::repository::RepositoryError;
use evento_core::types::Money;
use sqlx::postgres::PgPoolOptions;

mod eventos;
mod sesiones;
mod usuarios;
mod ventas;

pub use eventos::PgEventoRepository;
pub use sesiones::PgSesionRepository;
pub use usuarios::PgUsuarioRepository;
pub use ventas::PgVentaRepository;
pub use sqlx::PgPool;

/// Opens a connection pool.
///
/// # Errors
///
/// Returns the sqlx error when the database cannot be reached.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

/// Applies the pending migrations.
///
/// # Errors
///
/// Returns the migration error if any script fails.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Round-trips a trivial query, for readiness checks.
///
/// # Errors
///
/// Returns [`RepositoryError::Storage`] when the database does not answer.
pub async fn ping(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::query("SELECT 1").execute(pool).await.map_err(db)?;
    Ok(())
}

// ============================================================================
// Conversions shared by the repositories
// ============================================================================

pub(crate) fn db(error: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_string());
        }
    }
    RepositoryError::Storage(error.to_string())
}

pub(crate) fn corrupt(detalle: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(format!("invalid stored value: {detalle}"))
}

pub(crate) fn a_u32(valor: i32) -> Result<u32, RepositoryError> {
    u32::try_from(valor).map_err(|_| corrupt(valor))
}

pub(crate) fn a_i32(valor: u32) -> Result<i32, RepositoryError> {
    i32::try_from(valor).map_err(|_| corrupt(valor))
}

pub(crate) fn centavos(monto: Money) -> Result<i64, RepositoryError> {
    i64::try_from(monto.cents()).map_err(|_| corrupt(monto))
}

pub(crate) fn money(centavos: i64) -> Result<Money, RepositoryError> {
    u64::try_from(centavos)
        .map(Money::from_cents)
        .map_err(|_| corrupt(centavos))
}
