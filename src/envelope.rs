//! The response envelope returned by every operation.
//!
//! Every call produces exactly one `Envelope` with all three fields
//! populated. "No error" is the literal [`NO_ERROR`] marker rather than an
//! absent field.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker placed in the error field when nothing went wrong.
pub const NO_ERROR: &str = "NULL";

/// Primary outcome of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Aborted,
    Unauthorized,
    NotFound,
}

impl Status {
    /// Returns the wire literal for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Aborted => "ABORTED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary result code carried in the result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    InternalError,
    InvalidForm,
    BadDbConnection,
    QueryError,
}

impl ResultCode {
    /// Returns the wire literal for this result code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InternalError => "INTERNAL_ERROR",
            Self::InvalidForm => "INVALID_FORM",
            Self::BadDbConnection => "BAD_DB_CONNECTION",
            Self::QueryError => "QUERY_ERROR",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform `{status, result, error}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: String,
    pub result: String,
    pub error: String,
}

impl Envelope {
    /// Builds an envelope from a status, result code and error text.
    pub fn new(status: Status, result: ResultCode, error: impl Into<String>) -> Self {
        Self {
            status: status.as_str().to_string(),
            result: result.as_str().to_string(),
            error: error.into(),
        }
    }

    /// `OK` / `OK` / no error.
    pub fn ok() -> Self {
        Self::new(Status::Ok, ResultCode::Ok, NO_ERROR)
    }

    /// `OK` with a serialized result set as the payload.
    pub fn with_payload(payload: String) -> Self {
        Self {
            status: Status::Ok.as_str().to_string(),
            result: payload,
            error: NO_ERROR.to_string(),
        }
    }

    /// `NOT_FOUND` / `OK`: a select that produced no rows.
    pub fn not_found() -> Self {
        Self::new(Status::NotFound, ResultCode::Ok, NO_ERROR)
    }

    /// `ABORTED` with the given result code and diagnostic text.
    pub fn aborted(result: ResultCode, error: impl Into<String>) -> Self {
        Self::new(Status::Aborted, result, error)
    }

    /// `ABORTED` envelope for a failed database step.
    ///
    /// Connection failures and statement failures stay distinguishable
    /// through the result code; anything else is an internal error.
    pub fn from_error(err: &GatewayError) -> Self {
        let code = match err {
            GatewayError::Connection(_) => ResultCode::BadDbConnection,
            GatewayError::Query(_) => ResultCode::QueryError,
            _ => ResultCode::InternalError,
        };
        Self::aborted(code, err.message())
    }
}
