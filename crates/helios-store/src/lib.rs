//! SQLite-backed persistence for the Helios support domain.
//!
//! One connection behind a mutex, blocking work pushed onto the tokio
//! blocking pool. Every mutation validates through `helios-domain` and
//! commits in a single transaction together with its audit record.

pub mod config;
pub mod migrations;
pub mod store;

pub use config::StoreConfig;
pub use store::SupportStore;
