//! Database abstraction layer for the gateway.
//!
//! Provides the trait-based seams the service talks to: a
//! [`ConnectionProvisioner`] that opens one fresh [`DatabaseHandle`] per
//! call, and the handle that runs statements on it. Backends are
//! interchangeable behind these traits.

mod mock;
mod mysql;
mod postgres;
mod types;

pub use mock::{MockDatabase, MockResponse};
pub use mysql::MySqlHandle;
pub use postgres::PostgresHandle;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Mysql,
    Postgres,
}

impl DatabaseBackend {
    /// Returns the backend as a string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::Mysql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Mysql => 3306,
            Self::Postgres => 5432,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

/// Opens database handles on demand.
///
/// Acquisition failures must be reported as `GatewayError::Connection`.
#[async_trait]
pub trait ConnectionProvisioner: Send + Sync {
    /// Opens a fresh handle for a single call.
    async fn acquire(&self) -> Result<Box<dyn DatabaseHandle>>;
}

/// A single open database connection.
///
/// Statement failures are `GatewayError::Query`; failures reading column
/// metadata or decoding cells are `GatewayError::Internal`. Dropping a
/// handle releases the underlying connection.
#[async_trait]
pub trait DatabaseHandle: Send {
    /// Runs a statement that returns no rows, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Runs a statement and drains its cursor.
    async fn query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Closes the connection gracefully.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Provisioner backed by sqlx, opening one unpooled connection per call.
#[derive(Debug, Clone)]
pub struct SqlxProvisioner {
    config: ConnectionConfig,
}

impl SqlxProvisioner {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionProvisioner for SqlxProvisioner {
    async fn acquire(&self) -> Result<Box<dyn DatabaseHandle>> {
        match self.config.backend {
            DatabaseBackend::Mysql => {
                let handle = MySqlHandle::connect(&self.config).await?;
                Ok(Box::new(handle))
            }
            DatabaseBackend::Postgres => {
                let handle = PostgresHandle::connect(&self.config).await?;
                Ok(Box::new(handle))
            }
        }
    }
}

/// Closes a handle, logging instead of failing if the close itself errors.
///
/// Called on every exit path once a handle has been acquired.
pub async fn release(handle: Box<dyn DatabaseHandle>) {
    if let Err(e) = handle.close().await {
        warn!("Failed to close database handle: {}", e);
    }
}

pub(crate) fn timeout_message(what: &str, timeout: Duration) -> String {
    format!("{what} timed out after {} seconds", timeout.as_secs())
}

pub(crate) const MULTIPLE_RESULT_SETS: &str = "statement returned more than one result set";

/// Accumulates the rows of a cursor that must yield exactly one result set.
///
/// Every row must share the column layout of the first row, and no row may
/// follow the end of a result.
#[derive(Debug, Default)]
pub(crate) struct ResultCollector {
    columns: Option<Vec<ColumnInfo>>,
    rows: Vec<Row>,
    result_ended: bool,
}

impl ResultCollector {
    /// Records the end of a result (a command-complete boundary).
    pub fn end_result(&mut self) {
        self.result_ended = true;
    }

    /// Accepts one row; `layout` yields its `(name, type name)` pairs.
    pub fn push<'a, I>(&mut self, layout: I, row: Row) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if self.result_ended {
            return Err(GatewayError::query(MULTIPLE_RESULT_SETS));
        }

        match &self.columns {
            None => {
                self.columns = Some(
                    layout
                        .into_iter()
                        .map(|(name, data_type)| ColumnInfo::new(name, data_type))
                        .collect(),
                );
            }
            Some(columns) => {
                let mut layout = layout.into_iter();
                let same = columns.iter().all(|col| {
                    layout.next().is_some_and(|(name, data_type)| {
                        col.name == name && col.data_type == data_type
                    })
                }) && layout.next().is_none();
                if !same {
                    return Err(GatewayError::query(MULTIPLE_RESULT_SETS));
                }
            }
        }

        self.rows.push(row);
        Ok(())
    }

    pub fn finish(self) -> QueryResult {
        QueryResult::with_data(self.columns.unwrap_or_default(), self.rows)
    }
}
