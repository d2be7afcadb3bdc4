use crate::{
    error::{IngestError, IngestResult},
    load::{copy_statement, insert_statement, BatchOutcome, TableRef, Target},
};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgConnection},
    Connection,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

const COLUMN_TYPES_SQL: &str = "SELECT a.attname::text, format_type(a.atttypid, NULL) \
     FROM pg_attribute a \
     WHERE a.attrelid = $1::regclass AND a.attnum > 0 AND NOT a.attisdropped";

/// The single database session a run holds.
pub struct PgTarget {
    conn: PgConnection,
}

impl PgTarget {
    pub async fn connect(options: &PgConnectOptions) -> IngestResult<Self> {
        let conn = PgConnection::connect_with(options)
            .await
            .map_err(IngestError::Connection)?;
        info!("database connection established");
        Ok(Self { conn })
    }

    pub async fn close(self) -> IngestResult<()> {
        self.conn.close().await.map_err(IngestError::Connection)?;
        info!("database connection closed");
        Ok(())
    }

    /// Base type of every live column of `table`, typmod left off.
    ///
    /// Casting to `varchar(3)` would truncate; casting to `varchar` leaves the
    /// length check to the store, where COPY hits it too.
    async fn column_types(&mut self, table: &str) -> Result<HashMap<String, String>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(COLUMN_TYPES_SQL)
            .bind(table)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn try_copy(&mut self, table: TableRef<'_>, payload: Vec<u8>) -> Result<u64, sqlx::Error> {
        let statement = copy_statement(table);
        debug!(%statement, bytes = payload.len(), "starting copy");

        let mut tx = self.conn.begin().await?;
        let mut copy = tx.copy_in_raw(&statement).await?;
        let sent = copy.send(payload).await.map(|_| ());
        if let Err(e) = sent {
            copy.abort(e.to_string()).await?;
            return Err(e);
        }
        let rows = copy.finish().await?;
        tx.commit().await?;
        Ok(rows)
    }
}

#[async_trait]
impl Target for PgTarget {
    async fn copy_in(&mut self, table: TableRef<'_>, payload: Vec<u8>) -> BatchOutcome {
        match self.try_copy(table, payload).await {
            Ok(rows) => BatchOutcome::committed(rows),
            // dropping the transaction rolls it back
            Err(e) => BatchOutcome::failed(0, None, e.to_string()),
        }
    }

    async fn insert_rows(
        &mut self,
        table: TableRef<'_>,
        rows: &[Vec<Option<String>>],
    ) -> BatchOutcome {
        let types = match self.column_types(table.name).await {
            Ok(t) => t,
            Err(e) => return BatchOutcome::failed(0, None, e.to_string()),
        };
        let statement = insert_statement(table, &types);
        debug!(%statement, rows = rows.len(), "starting insert batch");

        let mut tx = match self.conn.begin().await {
            Ok(tx) => tx,
            Err(e) => return BatchOutcome::failed(0, None, e.to_string()),
        };

        let mut applied = 0u64;
        for (i, row) in rows.iter().enumerate() {
            let mut query = sqlx::query(&statement);
            for value in row {
                query = query.bind(value.as_deref());
            }
            if let Err(e) = query.execute(&mut *tx).await {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "rollback failed");
                }
                return BatchOutcome::failed(applied, Some(i), e.to_string());
            }
            applied += 1;
        }

        match tx.commit().await {
            Ok(()) => BatchOutcome::committed(applied),
            Err(e) => BatchOutcome::failed(applied, None, e.to_string()),
        }
    }
}
