//! sql-gateway - A network-facing gateway that runs raw SQL on behalf of
//! authenticated callers.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod gate;
pub mod grpc;
pub mod logging;
pub mod materialize;
pub mod server;
pub mod service;
