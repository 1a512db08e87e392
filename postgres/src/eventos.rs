//! Events mirrored from cátedra.

use crate::{a_i32, a_u32, centavos, db, money};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evento_core::catedra::EventoCatedra;
use evento_core::repository::{EventoRepository, Result, Upsert};
use evento_core::types::{Evento, EventoId, EventoTipo, EventoTipoId, Integrante};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

const SELECT_EVENTO: &str = r"
    SELECT e.id, e.id_catedra, e.titulo, e.resumen, e.descripcion, e.fecha,
           e.direccion, e.imagen, e.fila_asientos, e.columna_asientos,
           e.precio_entrada_centavos, e.activo, e.fecha_sincronizacion,
           t.id AS tipo_id, t.nombre AS tipo_nombre, t.descripcion AS tipo_descripcion
    FROM eventos e
    LEFT JOIN evento_tipos t ON t.id = e.evento_tipo_id
";

/// `PostgreSQL` [`EventoRepository`].
#[derive(Clone)]
pub struct PgEventoRepository {
    pool: PgPool,
}

impl PgEventoRepository {
    /// Creates the repository on a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_evento(row: &PgRow) -> Result<Evento> {
        let tipo_id: Option<i64> = row.try_get("tipo_id").map_err(db)?;
        let evento_tipo = match tipo_id {
            Some(id) => Some(EventoTipo {
                id: EventoTipoId(id),
                nombre: row.try_get("tipo_nombre").map_err(db)?,
                descripcion: row.try_get("tipo_descripcion").map_err(db)?,
            }),
            None => None,
        };
        let filas: Option<i32> = row.try_get("fila_asientos").map_err(db)?;
        let columnas: Option<i32> = row.try_get("columna_asientos").map_err(db)?;

        Ok(Evento {
            id: EventoId(row.try_get("id").map_err(db)?),
            id_catedra: row.try_get("id_catedra").map_err(db)?,
            titulo: row.try_get("titulo").map_err(db)?,
            resumen: row.try_get("resumen").map_err(db)?,
            descripcion: row.try_get("descripcion").map_err(db)?,
            fecha: row.try_get("fecha").map_err(db)?,
            direccion: row.try_get("direccion").map_err(db)?,
            imagen: row.try_get("imagen").map_err(db)?,
            fila_asientos: filas.map(a_u32).transpose()?,
            columna_asientos: columnas.map(a_u32).transpose()?,
            precio_entrada: money(row.try_get("precio_entrada_centavos").map_err(db)?)?,
            activo: row.try_get("activo").map_err(db)?,
            fecha_sincronizacion: row.try_get("fecha_sincronizacion").map_err(db)?,
            evento_tipo,
            integrantes: Vec::new(),
        })
    }

    /// Performers of several events, in stored order.
    async fn integrantes(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<Integrante>>> {
        let rows = sqlx::query(
            r"
            SELECT evento_id, nombre, apellido, identificacion
            FROM integrantes
            WHERE evento_id = ANY($1)
            ORDER BY evento_id, posicion
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut por_evento: HashMap<i64, Vec<Integrante>> = HashMap::new();
        for row in &rows {
            por_evento
                .entry(row.try_get("evento_id").map_err(db)?)
                .or_default()
                .push(Integrante {
                    nombre: row.try_get("nombre").map_err(db)?,
                    apellido: row.try_get("apellido").map_err(db)?,
                    identificacion: row.try_get("identificacion").map_err(db)?,
                });
        }
        Ok(por_evento)
    }

    async fn tipo_id(tx: &mut Transaction<'_, Postgres>, fuente: &EventoCatedra) -> Result<Option<i64>> {
        let Some(tipo) = &fuente.evento_tipo else {
            return Ok(None);
        };
        // The no-op update makes RETURNING yield the id of an existing row too.
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO evento_tipos (nombre, descripcion)
            VALUES ($1, $2)
            ON CONFLICT (nombre) DO UPDATE SET nombre = EXCLUDED.nombre
            RETURNING id
            ",
        )
        .bind(&tipo.nombre)
        .bind(&tipo.descripcion)
        .fetch_one(&mut **tx)
        .await
        .map_err(db)?;
        Ok(Some(id))
    }
}

#[async_trait]
impl EventoRepository for PgEventoRepository {
    async fn find(&self, id: EventoId) -> Result<Option<Evento>> {
        let row = sqlx::query(&format!("{SELECT_EVENTO} WHERE e.id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut evento = Self::row_to_evento(&row)?;
        evento.integrantes = self
            .integrantes(&[id.get()])
            .await?
            .remove(&id.get())
            .unwrap_or_default();
        Ok(Some(evento))
    }

    async fn list_activos(&self) -> Result<Vec<Evento>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTO} WHERE e.activo ORDER BY e.fecha ASC NULLS LAST, e.id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut eventos = rows
            .iter()
            .map(Self::row_to_evento)
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<i64> = eventos.iter().map(|e| e.id.get()).collect();
        let mut integrantes = self.integrantes(&ids).await?;
        for evento in &mut eventos {
            evento.integrantes = integrantes.remove(&evento.id.get()).unwrap_or_default();
        }
        Ok(eventos)
    }

    async fn upsert_desde_catedra(&self, fuente: &EventoCatedra, now: DateTime<Utc>) -> Result<Upsert> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let tipo_id = Self::tipo_id(&mut tx, fuente).await?;

        // xmax is zero only for a freshly inserted row.
        let row = sqlx::query(
            r"
            INSERT INTO eventos (
                id_catedra, titulo, resumen, descripcion, fecha, direccion, imagen,
                fila_asientos, columna_asientos, precio_entrada_centavos,
                activo, fecha_sincronizacion, evento_tipo_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, $11, $12)
            ON CONFLICT (id_catedra) DO UPDATE SET
                titulo = EXCLUDED.titulo,
                resumen = EXCLUDED.resumen,
                descripcion = EXCLUDED.descripcion,
                fecha = EXCLUDED.fecha,
                direccion = EXCLUDED.direccion,
                imagen = EXCLUDED.imagen,
                fila_asientos = EXCLUDED.fila_asientos,
                columna_asientos = EXCLUDED.columna_asientos,
                precio_entrada_centavos = EXCLUDED.precio_entrada_centavos,
                activo = TRUE,
                fecha_sincronizacion = EXCLUDED.fecha_sincronizacion,
                evento_tipo_id = EXCLUDED.evento_tipo_id
            RETURNING id, (xmax = 0) AS creado
            ",
        )
        .bind(fuente.id)
        .bind(&fuente.titulo)
        .bind(&fuente.resumen)
        .bind(&fuente.descripcion)
        .bind(fuente.fecha)
        .bind(&fuente.direccion)
        .bind(&fuente.imagen)
        .bind(fuente.fila_asientos.map(a_i32).transpose()?)
        .bind(fuente.columna_asientos.map(a_i32).transpose()?)
        .bind(centavos(fuente.precio_entrada.unwrap_or_default())?)
        .bind(now)
        .bind(tipo_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;

        let id: i64 = row.try_get("id").map_err(db)?;
        let creado: bool = row.try_get("creado").map_err(db)?;

        sqlx::query("DELETE FROM integrantes WHERE evento_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        for (posicion, integrante) in (0_i32..).zip(&fuente.integrantes) {
            sqlx::query(
                r"
                INSERT INTO integrantes (evento_id, posicion, nombre, apellido, identificacion)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(id)
            .bind(posicion)
            .bind(&integrante.nombre)
            .bind(&integrante.apellido)
            .bind(&integrante.identificacion)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;

        tracing::debug!(evento_id = id, id_catedra = fuente.id, creado, "Event mirrored from cátedra");
        Ok(if creado {
            Upsert::Creado(EventoId(id))
        } else {
            Upsert::Actualizado(EventoId(id))
        })
    }

    async fn desactivar_ausentes(&self, vigentes: &[i64], now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE eventos
            SET activo = FALSE, fecha_sincronizacion = $2
            WHERE activo
              AND id_catedra IS NOT NULL
              AND NOT (id_catedra = ANY($1))
            ",
        )
        .bind(vigentes)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(result.rows_affected())
    }
}
