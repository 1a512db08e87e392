//! Purchase sessions and their held seats.

use crate::{a_i32, a_u32, corrupt, db};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evento_core::repository::{RepositoryError, Result, SesionRepository};
use evento_core::types::{
    Asiento, AsientoSeleccionado, EstadoSesion, EventoId, NuevaSesion, Sesion, SesionId, UsuarioId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const COLUMNAS: &str =
    "id, usuario_id, evento_id, estado, fecha_inicio, ultima_actividad, expiracion, activa";

/// `PostgreSQL` [`SesionRepository`].
#[derive(Clone)]
pub struct PgSesionRepository {
    pool: PgPool,
}

impl PgSesionRepository {
    /// Creates the repository on a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_sesion(row: &PgRow) -> Result<Sesion> {
        let estado: String = row.try_get("estado").map_err(db)?;
        Ok(Sesion {
            id: SesionId(row.try_get("id").map_err(db)?),
            usuario_id: UsuarioId(row.try_get("usuario_id").map_err(db)?),
            evento_id: EventoId(row.try_get("evento_id").map_err(db)?),
            estado: EstadoSesion::parse(&estado).map_err(corrupt)?,
            fecha_inicio: row.try_get("fecha_inicio").map_err(db)?,
            ultima_actividad: row.try_get("ultima_actividad").map_err(db)?,
            expiracion: row.try_get("expiracion").map_err(db)?,
            activa: row.try_get("activa").map_err(db)?,
        })
    }
}

#[async_trait]
impl SesionRepository for PgSesionRepository {
    async fn find_abierta(&self, usuario: UsuarioId) -> Result<Option<Sesion>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNAS} FROM sesiones
             WHERE usuario_id = $1 AND estado <> 'COMPLETADO'
             ORDER BY id DESC
             LIMIT 1"
        ))
        .bind(usuario.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        row.as_ref().map(Self::row_to_sesion).transpose()
    }

    async fn insert(&self, sesion: NuevaSesion) -> Result<Sesion> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO sesiones (usuario_id, evento_id, estado, fecha_inicio, ultima_actividad, expiracion, activa)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            RETURNING id
            ",
        )
        .bind(sesion.usuario_id.get())
        .bind(sesion.evento_id.get())
        .bind(sesion.estado.as_str())
        .bind(sesion.fecha_inicio)
        .bind(sesion.ultima_actividad)
        .bind(sesion.expiracion)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        Ok(sesion.con_id(SesionId(id)))
    }

    async fn update(&self, sesion: &Sesion) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE sesiones
            SET estado = $2, ultima_actividad = $3, expiracion = $4, activa = $5
            WHERE id = $1
            ",
        )
        .bind(sesion.id.get())
        .bind(sesion.estado.as_str())
        .bind(sesion.ultima_actividad)
        .bind(sesion.expiracion)
        .bind(sesion.activa)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("sesion {}", sesion.id)));
        }
        Ok(())
    }

    async fn asientos(&self, sesion: SesionId) -> Result<Vec<AsientoSeleccionado>> {
        let rows = sqlx::query(
            r"
            SELECT fila, columna, nombre_persona
            FROM asientos_seleccionados
            WHERE sesion_id = $1
            ORDER BY posicion
            ",
        )
        .bind(sesion.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter()
            .map(|row| {
                Ok(AsientoSeleccionado {
                    asiento: Asiento::new(
                        a_u32(row.try_get("fila").map_err(db)?)?,
                        a_u32(row.try_get("columna").map_err(db)?)?,
                    ),
                    nombre_persona: row.try_get("nombre_persona").map_err(db)?,
                })
            })
            .collect()
    }

    async fn reemplazar_asientos(&self, sesion: SesionId, asientos: &[AsientoSeleccionado]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query("DELETE FROM asientos_seleccionados WHERE sesion_id = $1")
            .bind(sesion.get())
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for (posicion, seleccionado) in (0_i32..).zip(asientos) {
            sqlx::query(
                r"
                INSERT INTO asientos_seleccionados (sesion_id, posicion, fila, columna, nombre_persona)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(sesion.get())
            .bind(posicion)
            .bind(a_i32(seleccionado.asiento.fila)?)
            .bind(a_i32(seleccionado.asiento.columna)?)
            .bind(&seleccionado.nombre_persona)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(())
    }

    async fn expiradas(&self, limite: DateTime<Utc>) -> Result<Vec<Sesion>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNAS} FROM sesiones
             WHERE estado <> 'COMPLETADO' AND ultima_actividad < $1
             ORDER BY id"
        ))
        .bind(limite)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(Self::row_to_sesion).collect()
    }
}
