//! User lookup.

use crate::db;
use async_trait::async_trait;
use evento_core::repository::{Result, UsuarioRepository};
use evento_core::types::{Usuario, UsuarioId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PostgreSQL` [`UsuarioRepository`].
#[derive(Clone)]
pub struct PgUsuarioRepository {
    pool: PgPool,
}

impl PgUsuarioRepository {
    /// Creates the repository on a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_usuario(row: &PgRow) -> Result<Usuario> {
        let hash: String = row.try_get("password_hash").map_err(db)?;
        Ok(Usuario {
            id: UsuarioId(row.try_get("id").map_err(db)?),
            login: row.try_get("login").map_err(db)?,
            password_hash: hash.trim_end().to_string(),
            nombre: row.try_get("nombre").map_err(db)?,
            admin: row.try_get("admin").map_err(db)?,
            activo: row.try_get("activo").map_err(db)?,
        })
    }
}

#[async_trait]
impl UsuarioRepository for PgUsuarioRepository {
    async fn find_by_login(&self, login: &str) -> Result<Option<Usuario>> {
        sqlx::query(
            "SELECT id, login, password_hash, nombre, admin, activo FROM usuarios WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .as_ref()
        .map(Self::row_to_usuario)
        .transpose()
    }

    async fn find(&self, id: UsuarioId) -> Result<Option<Usuario>> {
        sqlx::query(
            "SELECT id, login, password_hash, nombre, admin, activo FROM usuarios WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .as_ref()
        .map(Self::row_to_usuario)
        .transpose()
    }
}
