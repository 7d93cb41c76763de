//! Tracked quantities and convergence criteria.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::spectrum::{Spectrum, SpectrumError};

/// Where on the curve a tracked quantity is read.
///
/// A bare number interpolates at that wavelength; a two-element list integrates
/// over the band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    /// Interpolate at a single wavelength (nm).
    Single(f64),
    /// Integrate over `[lower, upper]` (nm).
    Band([f64; 2]),
}

impl WavelengthSpec {
    /// Read this quantity off a spectrum.
    pub fn evaluate(&self, spectrum: &Spectrum) -> Result<f64, SpectrumError> {
        match *self {
            Self::Single(wavelength) => spectrum.interpolate(wavelength),
            Self::Band([lower, upper]) => spectrum.integrate(lower, upper),
        }
    }

    /// Finite positive wavelength, or a finite increasing band.
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Single(wavelength) => wavelength.is_finite() && wavelength > 0.0,
            Self::Band([lower, upper]) => lower.is_finite() && upper.is_finite() && lower < upper,
        }
    }
}

impl Display for WavelengthSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(wavelength) => write!(f, "{wavelength} nm"),
            Self::Band([lower, upper]) => write!(f, "[{lower}, {upper}] nm"),
        }
    }
}

/// A named observable monitored for convergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedQuantity {
    /// Label used in diagnostics only.
    pub name: String,
    /// Where on the curve the value is read.
    pub wavelength: WavelengthSpec,
    /// Relative tolerance, strictly positive.
    pub tolerance: f64,
}

impl TrackedQuantity {
    /// Quantity with an explicit wavelength spec.
    pub fn new(name: impl Into<String>, wavelength: WavelengthSpec, tolerance: f64) -> Self {
        Self {
            name: name.into(),
            wavelength,
            tolerance,
        }
    }

    /// Quantity read at one wavelength (nm).
    pub fn single(name: impl Into<String>, wavelength: f64, tolerance: f64) -> Self {
        Self::new(name, WavelengthSpec::Single(wavelength), tolerance)
    }

    /// Quantity integrated over `[lower, upper]` nm.
    pub fn band(name: impl Into<String>, lower: f64, upper: f64, tolerance: f64) -> Self {
        Self::new(name, WavelengthSpec::Band([lower, upper]), tolerance)
    }
}

/// Convergence test applied to every (quantity, zone) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Relative change against the previous iteration.
    #[default]
    Previous,
    /// Relative standard deviation since the start iteration.
    Variance,
    /// Percentile spread standard error against the median.
    #[serde(alias = "median")]
    Statistic,
    /// `Previous` and `Variance` must both pass.
    #[serde(alias = "all")]
    Both,
}

impl Criterion {
    /// Config spelling of the criterion.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Previous => "previous",
            Self::Variance => "variance",
            Self::Statistic => "statistic",
            Self::Both => "both",
        }
    }
}

impl Display for Criterion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "previous" => Ok(Self::Previous),
            "variance" => Ok(Self::Variance),
            "statistic" | "median" => Ok(Self::Statistic),
            "both" | "all" => Ok(Self::Both),
            other => Err(format!("unknown convergence criterion '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wavelength_spec_deserializes_number_or_pair() {
        let single: WavelengthSpec = serde_yaml::from_str("500.0").unwrap();
        assert_eq!(single, WavelengthSpec::Single(500.0));

        let band: WavelengthSpec = serde_yaml::from_str("[400.0, 700.0]").unwrap();
        assert_eq!(band, WavelengthSpec::Band([400.0, 700.0]));
    }

    #[test]
    fn criterion_aliases() {
        assert_eq!("median".parse::<Criterion>().unwrap(), Criterion::Statistic);
        assert_eq!("ALL".parse::<Criterion>().unwrap(), Criterion::Both);
        assert!("newest".parse::<Criterion>().is_err());

        let parsed: Criterion = serde_yaml::from_str("all").unwrap();
        assert_eq!(parsed, Criterion::Both);
    }

    #[test]
    fn band_validity() {
        assert!(WavelengthSpec::Band([1.0, 2.0]).is_valid());
        assert!(!WavelengthSpec::Band([2.0, 2.0]).is_valid());
        assert!(!WavelengthSpec::Single(f64::INFINITY).is_valid());
    }

    #[test]
    fn evaluates_against_spectrum() {
        let spectrum = Spectrum::new(vec![0.0, 10.0], vec![0.0, 10.0]).unwrap();
        let point = TrackedQuantity::single("v", 4.0, 0.1);
        let band = TrackedQuantity::band("b", 0.0, 2.0, 0.1);
        assert!((point.wavelength.evaluate(&spectrum).unwrap() - 4.0).abs() < 1e-12);
        assert!((band.wavelength.evaluate(&spectrum).unwrap() - 2.0).abs() < 1e-12);
    }
}
