//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the durable store
//! - Cybrid HTTP client for the RemoteProvider port
//! - Demo provider for running without provider credentials
//! - File-backed keystore for the SecureStore port

pub mod cybrid;
pub mod demo;
pub mod duckdb;
pub mod keystore;
