//! Sales and sold seats.

use crate::{a_i32, a_u32, centavos, corrupt, db, money};
use async_trait::async_trait;
use evento_core::repository::{RepositoryError, Result, VentaRepository};
use evento_core::types::{
    Asiento, AsientoVendido, EstadoSincronizacion, EventoId, NuevaVenta, UsuarioId, Venta, VentaId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

const COLUMNAS: &str = "id, id_venta_catedra, usuario_id, evento_id, fecha_venta, \
     precio_total_centavos, exitosa, descripcion, estado_sincronizacion";

/// `PostgreSQL` [`VentaRepository`].
///
/// Seats of successful sales are covered by a unique index on
/// `(evento_id, fila, columna)`, so selling a seat twice fails with
/// [`RepositoryError::Conflict`] and nothing of the second sale is stored.
#[derive(Clone)]
pub struct PgVentaRepository {
    pool: PgPool,
}

impl PgVentaRepository {
    /// Creates the repository on a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_venta(row: &PgRow) -> Result<Venta> {
        let estado: String = row.try_get("estado_sincronizacion").map_err(db)?;
        Ok(Venta {
            id: VentaId(row.try_get("id").map_err(db)?),
            id_venta_catedra: row.try_get("id_venta_catedra").map_err(db)?,
            usuario_id: UsuarioId(row.try_get("usuario_id").map_err(db)?),
            evento_id: EventoId(row.try_get("evento_id").map_err(db)?),
            fecha_venta: row.try_get("fecha_venta").map_err(db)?,
            precio_total: money(row.try_get("precio_total_centavos").map_err(db)?)?,
            exitosa: row.try_get("exitosa").map_err(db)?,
            descripcion: row.try_get("descripcion").map_err(db)?,
            estado_sincronizacion: EstadoSincronizacion::parse(&estado).map_err(corrupt)?,
            asientos: Vec::new(),
        })
    }

    async fn con_asientos(&self, mut ventas: Vec<Venta>) -> Result<Vec<Venta>> {
        let ids: Vec<i64> = ventas.iter().map(|v| v.id.get()).collect();
        let rows = sqlx::query(
            r"
            SELECT venta_id, fila, columna, nombre_persona, estado
            FROM asientos_vendidos
            WHERE venta_id = ANY($1)
            ORDER BY venta_id, posicion
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let mut por_venta: HashMap<i64, Vec<AsientoVendido>> = HashMap::new();
        for row in &rows {
            por_venta
                .entry(row.try_get("venta_id").map_err(db)?)
                .or_default()
                .push(AsientoVendido {
                    asiento: Asiento::new(
                        a_u32(row.try_get("fila").map_err(db)?)?,
                        a_u32(row.try_get("columna").map_err(db)?)?,
                    ),
                    nombre_persona: row.try_get("nombre_persona").map_err(db)?,
                    estado: row.try_get("estado").map_err(db)?,
                });
        }
        for venta in &mut ventas {
            venta.asientos = por_venta.remove(&venta.id.get()).unwrap_or_default();
        }
        Ok(ventas)
    }
}

#[async_trait]
impl VentaRepository for PgVentaRepository {
    async fn insert(&self, venta: NuevaVenta) -> Result<Venta> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO ventas (
                id_venta_catedra, usuario_id, evento_id, fecha_venta, precio_total_centavos,
                exitosa, descripcion, estado_sincronizacion
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(venta.id_venta_catedra)
        .bind(venta.usuario_id.get())
        .bind(venta.evento_id.get())
        .bind(venta.fecha_venta)
        .bind(centavos(venta.precio_total)?)
        .bind(venta.exitosa)
        .bind(&venta.descripcion)
        .bind(venta.estado_sincronizacion.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;

        for (posicion, vendido) in (0_i32..).zip(&venta.asientos) {
            sqlx::query(
                r"
                INSERT INTO asientos_vendidos (
                    venta_id, evento_id, exitosa, posicion, fila, columna, nombre_persona, estado
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(id)
            .bind(venta.evento_id.get())
            .bind(venta.exitosa)
            .bind(posicion)
            .bind(a_i32(vendido.asiento.fila)?)
            .bind(a_i32(vendido.asiento.columna)?)
            .bind(&vendido.nombre_persona)
            .bind(&vendido.estado)
            .execute(&mut *tx)
            .await
            .map_err(|e| match db(e) {
                RepositoryError::Conflict(_) => {
                    tracing::warn!(
                        evento_id = %venta.evento_id,
                        asiento = %vendido.asiento,
                        "Seat already sold, sale not stored"
                    );
                    RepositoryError::Conflict(vendido.asiento.to_string())
                },
                other => other,
            })?;
        }

        tx.commit().await.map_err(db)?;
        Ok(venta.con_id(VentaId(id)))
    }

    async fn list_por_usuario(&self, usuario: UsuarioId) -> Result<Vec<Venta>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNAS} FROM ventas
             WHERE usuario_id = $1
             ORDER BY fecha_venta DESC, id DESC"
        ))
        .bind(usuario.get())
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        let ventas = rows.iter().map(Self::row_to_venta).collect::<Result<Vec<_>>>()?;
        self.con_asientos(ventas).await
    }

    async fn find_de_usuario(&self, usuario: UsuarioId, venta: VentaId) -> Result<Option<Venta>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNAS} FROM ventas WHERE id = $1 AND usuario_id = $2"
        ))
        .bind(venta.get())
        .bind(usuario.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let venta = Self::row_to_venta(&row)?;
        Ok(self.con_asientos(vec![venta]).await?.pop())
    }
}
