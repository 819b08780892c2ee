//! PostgreSQL-backed relation tuple store
//!
//! Tuples live in a single `relation_tuples` table:
//! - `id BIGSERIAL` gives the monotonic identity used by full-scan cursors
//! - a unique constraint over the six tuple columns backs duplicate detection
//! - two composite indexes serve the subject-side and object-side frontier
//!   queries issued by graph traversal

use crate::{
    error::{DagError, Result},
    models::*,
    repository::TupleStore,
};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

const COLUMNS: [&str; 6] = [
    "object_namespace",
    "object_name",
    "relation",
    "subject_namespace",
    "subject_name",
    "subject_relation",
];

/// PostgreSQL-backed tuple store
pub struct PostgresTupleStore {
    pool: PgPool,
}

impl PostgresTupleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create with connection string
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| DagError::StorageError(format!("Failed to connect: {}", e)))?;

        Ok(Self::new(pool))
    }

    /// Create the tuple table and its indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS relation_tuples (
                id BIGSERIAL PRIMARY KEY,
                object_namespace TEXT NOT NULL,
                object_name TEXT NOT NULL,
                relation TEXT NOT NULL,
                subject_namespace TEXT NOT NULL,
                subject_name TEXT NOT NULL,
                subject_relation TEXT NOT NULL DEFAULT '',
                CONSTRAINT relation_tuples_unique UNIQUE (
                    object_namespace, object_name, relation,
                    subject_namespace, subject_name, subject_relation
                )
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS relation_tuples_subject_idx
                ON relation_tuples (subject_namespace, subject_name, subject_relation)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS relation_tuples_object_idx
                ON relation_tuples (object_namespace, object_name, relation)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DagError::StorageError(format!("Failed to migrate: {}", e)))?;
        }

        info!("Relation tuple schema ready");
        Ok(())
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        tuple: &RelationTuple,
        ignore_existing: bool,
    ) -> Result<()> {
        let mut statement = String::from(
            "INSERT INTO relation_tuples (
                object_namespace, object_name, relation,
                subject_namespace, subject_name, subject_relation
            ) VALUES ($1, $2, $3, $4, $5, $6)",
        );
        if ignore_existing {
            statement.push_str(" ON CONFLICT ON CONSTRAINT relation_tuples_unique DO NOTHING");
        }

        bind_tuple(sqlx::query(&statement), tuple)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_write_error(e, tuple))?;
        Ok(())
    }

    async fn remove(tx: &mut Transaction<'_, Postgres>, tuple: &RelationTuple) -> Result<()> {
        bind_tuple(
            sqlx::query(
                r#"
                DELETE FROM relation_tuples
                WHERE object_namespace = $1
                  AND object_name = $2
                  AND relation = $3
                  AND subject_namespace = $4
                  AND subject_name = $5
                  AND subject_relation = $6
                "#,
            ),
            tuple,
        )
        .execute(&mut **tx)
        .await
        .map_err(|e| DagError::StorageError(format!("Failed to delete tuple: {}", e)))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| DagError::StorageError(format!("Failed to start transaction: {}", e)))
    }

    async fn commit(tx: Transaction<'_, Postgres>) -> Result<()> {
        tx.commit()
            .await
            .map_err(|e| DagError::StorageError(format!("Failed to commit transaction: {}", e)))
    }
}

fn bind_tuple<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    tuple: &'q RelationTuple,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    tuple
        .fields()
        .into_iter()
        .fold(query, |query, field| query.bind(field))
}

fn map_write_error(err: sqlx::Error, tuple: &RelationTuple) -> DagError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DagError::DuplicateKey(tuple.to_string())
        }
        _ => DagError::StorageError(format!("Failed to write tuple: {}", err)),
    }
}

fn row_to_tuple(row: &sqlx::postgres::PgRow) -> RelationTuple {
    RelationTuple {
        object_namespace: row.get("object_namespace"),
        object_name: row.get("object_name"),
        relation: row.get("relation"),
        subject_namespace: row.get("subject_namespace"),
        subject_name: row.get("subject_name"),
        subject_relation: row.get("subject_relation"),
    }
}

#[async_trait]
impl TupleStore for PostgresTupleStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DagError::StorageError(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    async fn query(&self, pattern: &RelationTuple) -> Result<Vec<RelationTuple>> {
        // Build dynamic query from the non-wildcard fields
        let mut query = String::from(
            "SELECT object_namespace, object_name, relation, \
                    subject_namespace, subject_name, subject_relation \
             FROM relation_tuples WHERE TRUE",
        );

        let mut binds = Vec::new();
        for (column, value) in COLUMNS.iter().zip(pattern.fields()) {
            if !value.is_empty() {
                binds.push(value);
                query.push_str(&format!(" AND {} = ${}", column, binds.len()));
            }
        }
        query.push_str(" ORDER BY id");

        let mut sqlx_query = sqlx::query(&query);
        for bind in binds {
            sqlx_query = sqlx_query.bind(bind);
        }

        let rows = sqlx_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DagError::StorageError(format!("Failed to query tuples: {}", e)))?;

        Ok(rows.iter().map(row_to_tuple).collect())
    }

    async fn create(&self, tuple: &RelationTuple) -> Result<()> {
        debug!("Writing tuple to PostgreSQL: {}", tuple);

        let mut tx = self.begin().await?;
        Self::insert(&mut tx, tuple, false).await?;
        Self::commit(tx).await
    }

    async fn delete(&self, tuple: &RelationTuple) -> Result<()> {
        debug!("Deleting tuple from PostgreSQL: {}", tuple);

        let mut tx = self.begin().await?;
        Self::remove(&mut tx, tuple).await?;
        Self::commit(tx).await
    }

    async fn batch_operation(&self, operations: &[Operation]) -> Result<()> {
        debug!("Batch operation: {} operations", operations.len());

        // Dropping the transaction on error rolls it back
        let mut tx = self.begin().await?;
        for operation in operations {
            match operation {
                Operation::Create(tuple) => Self::insert(&mut tx, tuple, false).await?,
                Operation::CreateIfNotExists(tuple) => Self::insert(&mut tx, tuple, true).await?,
                Operation::Delete(tuple) => Self::remove(&mut tx, tuple).await?,
            }
        }
        Self::commit(tx).await?;

        info!("Batch of {} operations committed", operations.len());
        Ok(())
    }

    async fn get_all_namespaces(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT namespace
            FROM (
                SELECT object_namespace AS namespace FROM relation_tuples
                UNION
                SELECT subject_namespace AS namespace FROM relation_tuples
            ) AS namespaces
            ORDER BY namespace
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DagError::StorageError(format!("Failed to list namespaces: {}", e)))
    }

    async fn get_all(&self, page: PageOptions) -> Result<TuplePage> {
        let limit = i64::try_from(page.page_size).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT id, object_namespace, object_name, relation,
                   subject_namespace, subject_name, subject_relation
            FROM relation_tuples
            WHERE id > $1
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(page.last_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DagError::StorageError(format!("Failed to scan tuples: {}", e)))?;

        Ok(TuplePage {
            last_id: rows.last().map(|row| row.get::<i64, _>("id")),
            tuples: rows.iter().map(row_to_tuple).collect(),
        })
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM relation_tuples")
            .execute(&self.pool)
            .await
            .map_err(|e| DagError::StorageError(format!("Failed to clear tuples: {}", e)))?;

        info!("All relation tuples deleted");
        Ok(())
    }
}
