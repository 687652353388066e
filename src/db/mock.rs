//! Mock database for testing.
//!
//! Provides a scriptable in-memory provisioner so the gateway can be
//! exercised without a live database. It also counts handles so tests can
//! check that every acquired handle is closed.

use super::{ConnectionProvisioner, DatabaseHandle, QueryResult};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted outcome for one SQL string.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The statement produces these rows.
    Rows(QueryResult),
    /// The statement affects this many rows and returns none.
    Affected(u64),
    /// The statement fails with this error.
    Fail(GatewayError),
}

#[derive(Debug, Default)]
struct MockState {
    connect_error: Option<String>,
    responses: HashMap<String, MockResponse>,
    executed: Vec<String>,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    closed: AtomicUsize,
    dropped: AtomicUsize,
}

/// A mock database that returns predefined results.
///
/// Cloning shares the script and counters.
#[derive(Debug, Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<MockState>>,
    counters: Arc<Counters>,
}

impl MockDatabase {
    /// Creates a mock database with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for an exact SQL string.
    pub fn respond(self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.lock().responses.insert(sql.into(), response);
        self
    }

    /// Makes every acquisition fail with the given message.
    pub fn refuse_connections(self, message: impl Into<String>) -> Self {
        self.lock().connect_error = Some(message.into());
        self
    }

    /// Number of handles handed out so far.
    pub fn acquired(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Number of handles closed through `DatabaseHandle::close`.
    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Number of handles not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.acquired() - self.counters.dropped.load(Ordering::SeqCst)
    }

    /// SQL strings received by handles, in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the script from others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup(&self, sql: &str) -> Option<MockResponse> {
        let mut state = self.lock();
        state.executed.push(sql.to_string());
        state.responses.get(sql).cloned()
    }
}

#[async_trait]
impl ConnectionProvisioner for MockDatabase {
    async fn acquire(&self) -> Result<Box<dyn DatabaseHandle>> {
        let connect_error = self.lock().connect_error.clone();
        if let Some(message) = connect_error {
            return Err(GatewayError::connection(message));
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle { db: self.clone() }))
    }
}

/// Handle returned by [`MockDatabase`].
struct MockHandle {
    db: MockDatabase,
}

#[async_trait]
impl DatabaseHandle for MockHandle {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        match self.db.lookup(sql) {
            Some(MockResponse::Affected(n)) => Ok(n),
            Some(MockResponse::Rows(result)) => Ok(result.row_count() as u64),
            Some(MockResponse::Fail(e)) => Err(e),
            None => Ok(0),
        }
    }

    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        match self.db.lookup(sql) {
            Some(MockResponse::Rows(result)) => Ok(result),
            Some(MockResponse::Affected(_)) | None => Ok(QueryResult::new()),
            Some(MockResponse::Fail(e)) => Err(e),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.db.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.db.counters.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
