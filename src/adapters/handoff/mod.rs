//! Handoff between the two solvers.
//!
//! The radiative-transfer probe output is converted into one plain-text
//! spectrum per zone, which the photoionization decks and the convergence
//! engine both read.

pub mod directory;
pub mod probe;

pub use directory::{parse_handoff, HandoffDirectory};
pub use probe::{ConversionReport, ProbeConverter, ProbePosition, ProbeTable};
