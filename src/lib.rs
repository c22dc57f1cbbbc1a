//! ca-sync - keep additional CA certificates installed in the system trust store.

pub mod bundle;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod error;
pub mod platform;
pub mod store;
pub mod sync;
pub mod trust;

pub use error::SyncError;
