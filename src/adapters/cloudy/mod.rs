//! Photoionization solver input generation.

pub mod deck;

pub use deck::{normalization_line, nm_to_rydberg, zone_stem, DeckBuilder, DeckVariant};
