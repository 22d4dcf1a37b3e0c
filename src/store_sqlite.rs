/*!
SQLite sequence store.

Durable [`SequenceStore`] implementation. Node and edge lists are stored as
JSON text columns; timestamps as fixed-width RFC 3339 text so the
`ORDER BY updated_at DESC` listing is order-correct.
*/

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{self, DbError, decode_ts, encode_ts};
use crate::graph::{Edge, Node};
use crate::store::{DEFAULT_SEQUENCE_NAME, Sequence, SequenceStore, StoreError};

/// SQLite-backed sequence store.
pub struct SqliteSequenceStore {
    pool: SqlitePool,
}

impl SqliteSequenceStore {
    /// Wrap an existing pool (schema must already be migrated).
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect (or create) a SQLite database at `database_url` and migrate it.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = db::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    fn row_to_sequence(row: &SqliteRow) -> Result<Sequence, StoreError> {
        let nodes_json: String = row.get("nodes_json");
        let edges_json: String = row.get("edges_json");
        let nodes: Vec<Node> = serde_json::from_str(&nodes_json).map_err(decode_err)?;
        let edges: Vec<Edge> = serde_json::from_str(&edges_json).map_err(decode_err)?;
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        Ok(Sequence {
            id: row.get("id"),
            name: row.get("name"),
            nodes,
            edges,
            created_at: decode_ts(&created_at),
            updated_at: decode_ts(&updated_at),
        })
    }
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        StoreError::Backend {
            message: e.to_string(),
        }
    }
}

fn decode_err(e: serde_json::Error) -> StoreError {
    StoreError::Backend {
        message: format!("corrupt graph snapshot: {e}"),
    }
}

fn encode_err(e: serde_json::Error) -> StoreError {
    StoreError::Backend {
        message: format!("graph snapshot encode: {e}"),
    }
}

fn backend(context: &str, e: sqlx::Error) -> StoreError {
    StoreError::Backend {
        message: format!("{context}: {e}"),
    }
}

#[async_trait]
impl SequenceStore for SqliteSequenceStore {
    #[instrument(skip(self, nodes, edges), err)]
    async fn create(
        &self,
        name: Option<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Sequence, StoreError> {
        let now = Utc::now();
        let sequence = Sequence {
            id: Uuid::new_v4().to_string(),
            name: name.unwrap_or_else(|| DEFAULT_SEQUENCE_NAME.to_string()),
            nodes,
            edges,
            created_at: now,
            updated_at: now,
        };
        let nodes_json = serde_json::to_string(&sequence.nodes).map_err(encode_err)?;
        let edges_json = serde_json::to_string(&sequence.edges).map_err(encode_err)?;

        sqlx::query(
            r#"
            INSERT INTO sequences (id, name, nodes_json, edges_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sequence.id)
        .bind(&sequence.name)
        .bind(&nodes_json)
        .bind(&edges_json)
        .bind(encode_ts(sequence.created_at))
        .bind(encode_ts(sequence.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| backend("insert sequence", e))?;

        Ok(sequence)
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: &str) -> Result<Sequence, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, nodes_json, edges_json, created_at, updated_at
            FROM sequences
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend("select sequence", e))?;

        match row {
            Some(row) => Self::row_to_sequence(&row),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Sequence>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, nodes_json, edges_json, created_at, updated_at
            FROM sequences
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend("list sequences", e))?;

        rows.iter().map(Self::row_to_sequence).collect()
    }

    #[instrument(skip(self, nodes, edges), err)]
    async fn update(
        &self,
        id: &str,
        name: Option<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Sequence, StoreError> {
        let nodes_json = serde_json::to_string(&nodes).map_err(encode_err)?;
        let edges_json = serde_json::to_string(&edges).map_err(encode_err)?;
        let updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sequences
            SET name = COALESCE(?2, name),
                nodes_json = ?3,
                edges_json = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(&nodes_json)
        .bind(&edges_json)
        .bind(encode_ts(updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| backend("update sequence", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        self.get(id).await
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sequences WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| backend("delete sequence", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}
