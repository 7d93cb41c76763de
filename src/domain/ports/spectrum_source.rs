//! Spectrum source port.

use crate::domain::errors::DomainResult;
use crate::domain::models::Spectrum;

/// Supplies the current radiation field of each zone.
pub trait SpectrumSource: Send + Sync {
    /// Number of zones this source can serve.
    fn zone_count(&self) -> usize;

    /// Load the current spectrum for `zone`.
    ///
    /// Missing or malformed data is an error; there is no fallback curve.
    fn load(&self, zone: usize) -> DomainResult<Spectrum>;
}
