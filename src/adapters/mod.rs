//! Adapters
//!
//! Implementations of the domain ports plus the file formats the external
//! solvers read and write.

pub mod cloudy;
pub mod handoff;
pub mod solvers;
