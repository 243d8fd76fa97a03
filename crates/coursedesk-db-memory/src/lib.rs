//! In-memory storage backends.
//!
//! Used for development, single-process deployments without external
//! services, and tests. Data does not survive a restart.

pub mod kv;
pub mod records;

pub use kv::InMemoryKeyValueStore;
pub use records::InMemoryRecordStore;
