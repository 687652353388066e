//! Integration tests for sql-gateway.
//!
//! The database tests require a running MySQL or PostgreSQL server.
//! Set GATEWAY_TEST_DATABASE_URL to run them; they are skipped otherwise.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
