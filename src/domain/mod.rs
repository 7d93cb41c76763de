//! Domain layer for radcoupler
//!
//! Core models, errors and the port traits that solver adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
