//! Database abstraction layer
//!
//! This module provides a trait-based abstraction for record storage,
//! allowing MedSync to work with PostgreSQL or an in-memory backend.

pub mod factory;
pub mod traits;

pub use factory::create_record_backend;
pub use traits::{
    RecordBackend, RecordSession, RecordTransaction, StoredRow, DEFAULT_MAX_BIND_PARAMS,
};
