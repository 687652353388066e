//! Statement executor.
//!
//! Runs statements that return no rows. Insert, update, delete and raw
//! calls all share this path; only the SQL text differs.

use crate::db::{release, ConnectionProvisioner};
use crate::envelope::Envelope;
use tracing::{debug, warn};

/// Runs `query` on a fresh handle, discarding any rows it produces.
pub async fn execute(provisioner: &dyn ConnectionProvisioner, query: &str) -> Envelope {
    let mut handle = match provisioner.acquire().await {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Could not open database handle: {}", e);
            return Envelope::from_error(&e);
        }
    };

    let outcome = handle.execute(query).await;
    release(handle).await;

    match outcome {
        Ok(rows_affected) => {
            debug!("Statement affected {} rows", rows_affected);
            Envelope::ok()
        }
        Err(e) => {
            warn!("Statement failed: {}", e);
            Envelope::from_error(&e)
        }
    }
}
