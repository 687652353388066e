//! Result materializer.
//!
//! Runs a row-returning statement whose column layout is unknown ahead of
//! time and turns the rows into a self-describing array of objects.

mod classify;
mod encode;

pub use classify::{ColumnClassifier, ColumnKind, TypeNameClassifier};
pub use encode::{encode, ColumnDescriptor, Record, ResultSet};

use crate::db::{release, ConnectionProvisioner, DatabaseHandle, QueryResult, Value};
use crate::envelope::Envelope;
use crate::error::Result;
use tracing::{debug, warn};

/// Runs `query` on a fresh handle and materializes its rows.
///
/// Zero rows is `NOT_FOUND`/`OK`, never an empty array. Any failure
/// discards the rows gathered so far.
pub async fn materialize(
    provisioner: &dyn ConnectionProvisioner,
    classifier: &dyn ColumnClassifier,
    query: &str,
) -> Envelope {
    let mut handle = match provisioner.acquire().await {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Could not open database handle: {}", e);
            return Envelope::from_error(&e);
        }
    };

    let outcome = run(handle.as_mut(), classifier, query).await;
    release(handle).await;

    match outcome {
        Ok(set) if set.is_empty() => Envelope::not_found(),
        Ok(set) => Envelope::with_payload(encode(&set)),
        Err(e) => {
            warn!("Select failed: {}", e);
            Envelope::from_error(&e)
        }
    }
}

async fn run(
    handle: &mut dyn DatabaseHandle,
    classifier: &dyn ColumnClassifier,
    query: &str,
) -> Result<ResultSet> {
    let result = handle.query(query).await?;
    debug!(
        "Select returned {} rows in {:?}",
        result.row_count(),
        result.execution_time
    );
    build_result_set(&result, classifier)
}

/// Classifies the columns once, then renders every row against them.
pub fn build_result_set(
    result: &QueryResult,
    classifier: &dyn ColumnClassifier,
) -> Result<ResultSet> {
    let columns = result
        .columns
        .iter()
        .map(|col| ColumnDescriptor::new(col.name.clone(), classifier.classify(&col.data_type)))
        .collect();

    let mut set = ResultSet::new(columns);
    for row in &result.rows {
        set.push(row.iter().map(Value::render).collect())?;
    }
    Ok(set)
}
