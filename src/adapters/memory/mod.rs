//! In-memory record storage
//!
//! A [`RecordBackend`](crate::adapters::database::RecordBackend) that keeps
//! every table in process memory with the same uniqueness and transaction
//! semantics as the PostgreSQL adapter.

pub mod adapter;

pub use adapter::{MemoryBackend, MemoryTransaction};
