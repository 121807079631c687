//! Backing-store adapter for the sedge registration store.
//!
//! Records are persisted as JSON strings in a key/value store that offers
//! per-key compare-and-swap. This crate provides:
//!
//! - [`CasKeyValueStore`] - the raw store boundary (get, conditional set)
//! - [`JsonAorStore`] - the [`sedge_core::AorStore`] implementation that
//!   encodes records to the stable JSON layout and maps store outcomes
//! - [`DeterministicCasStore`] - an in-memory implementation for tests and
//!   simulation, with switchable fault injection

mod aor_store;
pub mod codec;
mod kv;
mod memory;

pub use aor_store::JsonAorStore;
pub use kv::CasKeyValueStore;
pub use kv::KvEntry;
pub use kv::KvError;
pub use memory::DeterministicCasStore;
pub use memory::KvFault;
