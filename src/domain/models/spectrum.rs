//! Radiation field curves exchanged between the two solvers.
//!
//! A [`Spectrum`] is a sampled `(wavelength, 4pi nu J_nu)` curve stored in ascending
//! wavelength order. Handoff files list samples from the largest wavelength to the
//! smallest, so construction always sorts.

use serde::{Deserialize, Serialize};

/// Errors raised while building or sampling a spectrum.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumError {
    #[error("spectrum requires at least 2 samples, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("spectrum length mismatch: wavelengths={wavelengths}, values={values}")]
    LengthMismatch { wavelengths: usize, values: usize },
    #[error("spectrum sample {index} must be finite, got ({wavelength}, {value})")]
    NonFiniteSample {
        index: usize,
        wavelength: f64,
        value: f64,
    },
    #[error("spectrum has duplicate wavelength {wavelength}")]
    DuplicateWavelength { wavelength: f64 },
    #[error("normalization not found: wavelength {wavelength} nm is outside [{min}, {max}] nm")]
    OutOfDomain { wavelength: f64, min: f64, max: f64 },
    #[error("wavelength band [{lower}, {upper}] nm must be finite and increasing")]
    InvalidBand { lower: f64, upper: f64 },
}

/// A sampled curve with strictly increasing wavelengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    wavelengths: Vec<f64>,
    values: Vec<f64>,
}

impl Spectrum {
    /// Build a spectrum from unordered samples.
    pub fn new(wavelengths: Vec<f64>, values: Vec<f64>) -> Result<Self, SpectrumError> {
        if wavelengths.len() != values.len() {
            return Err(SpectrumError::LengthMismatch {
                wavelengths: wavelengths.len(),
                values: values.len(),
            });
        }
        let samples = wavelengths.into_iter().zip(values).collect();
        Self::from_samples(samples)
    }

    /// Build a spectrum from unordered `(wavelength, value)` pairs.
    pub fn from_samples(mut samples: Vec<(f64, f64)>) -> Result<Self, SpectrumError> {
        if samples.len() < 2 {
            return Err(SpectrumError::InsufficientPoints {
                actual: samples.len(),
            });
        }
        for (index, &(wavelength, value)) in samples.iter().enumerate() {
            if !wavelength.is_finite() || !value.is_finite() {
                return Err(SpectrumError::NonFiniteSample {
                    index,
                    wavelength,
                    value,
                });
            }
        }

        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(pair) = samples.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(SpectrumError::DuplicateWavelength {
                wavelength: pair[0].0,
            });
        }

        let (wavelengths, values) = samples.into_iter().unzip();
        Ok(Self {
            wavelengths,
            values,
        })
    }

    /// Sample wavelengths, ascending.
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// Sample values matching [`Self::wavelengths`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    /// Always false for a constructed spectrum.
    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// Smallest and largest sampled wavelength.
    pub fn domain(&self) -> (f64, f64) {
        (self.wavelengths[0], self.wavelengths[self.wavelengths.len() - 1])
    }

    /// Linearly interpolate the curve at `wavelength`.
    ///
    /// Outside the sampled range the nearest edge value is returned.
    pub fn interpolate(&self, wavelength: f64) -> Result<f64, SpectrumError> {
        if wavelength.is_nan() {
            let (min, max) = self.domain();
            return Err(SpectrumError::OutOfDomain {
                wavelength,
                min,
                max,
            });
        }
        Ok(self.sample(wavelength))
    }

    /// Trapezoidal integral of the piecewise-linear curve over `[lower, upper]`.
    ///
    /// The endpoints are linearly interpolated; interior samples contribute whole
    /// trapezoids.
    pub fn integrate(&self, lower: f64, upper: f64) -> Result<f64, SpectrumError> {
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(SpectrumError::InvalidBand { lower, upper });
        }
        self.check_in_domain(lower)?;
        self.check_in_domain(upper)?;

        let mut sum = 0.0;
        for index in 1..self.wavelengths.len() {
            let left = self.wavelengths[index - 1];
            let right = self.wavelengths[index];
            if right <= lower || left >= upper {
                continue;
            }
            let a = left.max(lower);
            let b = right.min(upper);
            let ya = self.segment_value(index, a);
            let yb = self.segment_value(index, b);
            sum += 0.5 * (b - a) * (ya + yb);
        }
        Ok(sum)
    }

    fn check_in_domain(&self, wavelength: f64) -> Result<(), SpectrumError> {
        let (min, max) = self.domain();
        if wavelength.is_nan() || wavelength < min || wavelength > max {
            return Err(SpectrumError::OutOfDomain {
                wavelength,
                min,
                max,
            });
        }
        Ok(())
    }

    fn sample(&self, wavelength: f64) -> f64 {
        let index = self.wavelengths.partition_point(|&w| w < wavelength);
        if index == 0 {
            return self.values[0];
        }
        if index == self.wavelengths.len() {
            return self.values[index - 1];
        }
        self.segment_value(index, wavelength)
    }

    /// Value on the segment `[index - 1, index]` at `wavelength`.
    fn segment_value(&self, index: usize, wavelength: f64) -> f64 {
        let (x0, x1) = (self.wavelengths[index - 1], self.wavelengths[index]);
        let (y0, y1) = (self.values[index - 1], self.values[index]);
        let t = (wavelength - x0) / (x1 - x0);
        t.mul_add(y1 - y0, y0)
    }
}
