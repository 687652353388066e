//! PostgreSQL database handle implementation.
//!
//! Provides the `PostgresHandle` struct that implements the `DatabaseHandle`
//! trait for PostgreSQL using a single, unpooled sqlx connection.
//!
//! Statements go over the simple query protocol, so every cell arrives
//! in the server's text format.

use crate::config::ConnectionConfig;
use crate::db::{timeout_message, DatabaseHandle, QueryResult, ResultCollector, Row, Value};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Connection, Either, Row as SqlxRow, TypeInfo, ValueRef};
use std::time::{Duration, Instant};
use tracing::debug;

/// PostgreSQL database handle.
#[derive(Debug)]
pub struct PostgresHandle {
    conn: PgConnection,
    query_timeout: Duration,
}

impl PostgresHandle {
    /// Opens a connection, bounded by the configured connect timeout.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config
            .to_connection_string()
            .map_err(|e| GatewayError::connection(e.message()))?;
        let options: PgConnectOptions = conn_str
            .parse()
            .map_err(|e: sqlx::Error| GatewayError::connection(e.to_string()))?;

        let timeout = config.connect_timeout();
        let conn = tokio::time::timeout(timeout, options.connect())
            .await
            .map_err(|_| GatewayError::connection(timeout_message("Connection", timeout)))?
            .map_err(|e| GatewayError::connection(e.to_string()))?;

        debug!("Opened PostgreSQL connection to {}", config.display_string());

        Ok(Self {
            conn,
            query_timeout: config.query_timeout(),
        })
    }
}

#[async_trait]
impl DatabaseHandle for PostgresHandle {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let timeout = self.query_timeout;
        tokio::time::timeout(timeout, run_statement(&mut self.conn, sql))
            .await
            .map_err(|_| GatewayError::query(timeout_message("Query", timeout)))?
    }

    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let timeout = self.query_timeout;

        let result = tokio::time::timeout(timeout, drain(&mut self.conn, sql))
            .await
            .map_err(|_| GatewayError::query(timeout_message("Query", timeout)))??;

        Ok(result.with_execution_time(start.elapsed()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| GatewayError::connection(e.to_string()))
    }
}

/// Runs every statement in `sql`, summing the affected row counts.
async fn run_statement(conn: &mut PgConnection, sql: &str) -> Result<u64> {
    let mut stream = sqlx::raw_sql(sql).fetch_many(conn);
    let mut rows_affected = 0;

    while let Some(step) = stream
        .try_next()
        .await
        .map_err(|e| GatewayError::query(e.to_string()))?
    {
        if let Either::Left(done) = step {
            rows_affected += done.rows_affected();
        }
    }

    Ok(rows_affected)
}

/// Walks the cursor row by row, converting each row as it arrives.
///
/// Fails if the statement yields more than one result set.
async fn drain(conn: &mut PgConnection, sql: &str) -> Result<QueryResult> {
    let mut stream = sqlx::raw_sql(sql).fetch_many(conn);
    let mut collector = ResultCollector::default();

    while let Some(step) = stream
        .try_next()
        .await
        .map_err(|e| GatewayError::query(e.to_string()))?
    {
        match step {
            Either::Left(_) => collector.end_result(),
            Either::Right(row) => {
                let layout = row
                    .columns()
                    .iter()
                    .map(|col| (col.name(), col.type_info().name()));
                collector.push(layout, convert_row(&row)?)?;
            }
        }
    }

    Ok(collector.finish())
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    (0..row.len()).map(|i| convert_value(row, i)).collect()
}

/// Reads one text-protocol cell.
fn convert_value(row: &PgRow, index: usize) -> Result<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| GatewayError::internal(e.to_string()))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    row.try_get_unchecked::<String, _>(index)
        .map(Value::String)
        .map_err(|e| GatewayError::internal(format!("Cannot decode column {index}: {e}")))
}
