//! Credential gate.
//!
//! Every operation runs [`admit`] before touching the database. The gate is a
//! pure function of the call and the configured shared secret.

use crate::config::SharedSecret;
use crate::envelope::{Envelope, ResultCode, Status, NO_ERROR};
use std::collections::HashMap;

/// Metadata key holding the caller's credential.
pub const AUTH_KEY: &str = "auth";

/// Out-of-band key/value data accompanying a call.
///
/// Keys are case-insensitive; a key may carry several values, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMetadata {
    entries: HashMap<String, Vec<String>>,
}

impl CallMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under `key`.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(key.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Builder-style variant of [`CallMetadata::insert`].
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the first value stored under `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Everything the gate looks at for one call.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    /// `None` when the transport could not extract metadata for the call.
    pub metadata: Option<&'a CallMetadata>,
    pub query: &'a str,
}

impl<'a> CallContext<'a> {
    pub fn new(metadata: Option<&'a CallMetadata>, query: &'a str) -> Self {
        Self { metadata, query }
    }
}

/// Verdict of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Ok,
    Aborted,
    Unauthorized,
}

/// Gate verdict together with the result code to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub outcome: ValidationOutcome,
    pub hint: ResultCode,
}

impl Admission {
    fn new(outcome: ValidationOutcome, hint: ResultCode) -> Self {
        Self { outcome, hint }
    }

    /// Returns true when the call may proceed to the database.
    pub fn is_admitted(&self) -> bool {
        self.outcome == ValidationOutcome::Ok
    }

    /// The envelope to return for a rejected call, or `None` if admitted.
    pub fn rejection(&self) -> Option<Envelope> {
        let status = match self.outcome {
            ValidationOutcome::Ok => return None,
            ValidationOutcome::Aborted => Status::Aborted,
            ValidationOutcome::Unauthorized => Status::Unauthorized,
        };
        Some(Envelope::new(status, self.hint, NO_ERROR))
    }
}

/// Validates a call against the shared secret.
///
/// Checks run in order and stop at the first failure. A wrong credential
/// reports `UNAUTHORIZED` with result `OK`, not `INVALID_FORM`.
pub fn admit(ctx: &CallContext<'_>, secret: &SharedSecret) -> Admission {
    let Some(metadata) = ctx.metadata else {
        return Admission::new(ValidationOutcome::Aborted, ResultCode::InternalError);
    };

    let Some(credential) = metadata.first(AUTH_KEY) else {
        return Admission::new(ValidationOutcome::Aborted, ResultCode::InvalidForm);
    };

    if ctx.query.is_empty() {
        return Admission::new(ValidationOutcome::Aborted, ResultCode::InvalidForm);
    }

    if !secret.matches(credential) {
        return Admission::new(ValidationOutcome::Unauthorized, ResultCode::Ok);
    }

    Admission::new(ValidationOutcome::Ok, ResultCode::Ok)
}
