//! Domain layer for the pioneer detection engine
//!
//! This module contains the detection algorithms, domain models and the port
//! traits persistence adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult};
