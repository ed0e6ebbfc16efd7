//! PostgreSQL database integration
//!
//! This module provides integration with PostgreSQL for storing reconciled
//! records.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::{PgTransaction, PostgreSQLAdapter};
pub use client::PostgreSQLClient;
