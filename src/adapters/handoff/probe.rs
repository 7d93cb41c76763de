//! Mean-intensity probe files and their conversion into handoff files.
//!
//! The radiative-transfer solver writes one probe table per run: comment lines
//! naming each wavelength column (`... at lambda = <microns> micron ...`) and
//! one row `x y z v1 .. vN` per probed position, positions in pc and values
//! `lambda * J_lambda` in W/m2/sr.

use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PhotoionizationConfig, RadiativeTransferConfig};

const MICRONS_TO_NM: f64 = 1000.0;
const W_PER_M2_TO_ERG_PER_CM2: f64 = 1000.0;
/// The photoionization solver cannot read zero.
const VALUE_FLOOR: f64 = 1e-300;

// ---------------------------------------------------------------------------
// ProbeTable
// ---------------------------------------------------------------------------

/// One probed position.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbePosition {
    /// Cartesian position in pc.
    pub position: [f64; 3],
    /// `lambda * J_lambda` per wavelength column, W/m2/sr.
    pub values: Vec<f64>,
}

impl ProbePosition {
    /// Distance from the origin in pc.
    pub fn radius(&self) -> f64 {
        let [x, y, z] = self.position;
        z.mul_add(z, x.mul_add(x, y * y)).sqrt()
    }
}

/// Parsed mean-intensity probe output.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeTable {
    /// Column wavelengths in microns.
    pub wavelengths: Vec<f64>,
    /// Probe rows in file order.
    pub positions: Vec<ProbePosition>,
}

impl ProbeTable {
    /// Read and parse a probe file from disk.
    pub fn load(path: &Path) -> DomainResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => DomainError::HandoffMissing(path.to_path_buf()),
            _ => DomainError::Io(err),
        })?;
        Self::parse(path, &text)
    }

    /// Parse probe text. `path` is used for error messages only.
    pub fn parse(path: &Path, text: &str) -> DomainResult<Self> {
        let malformed = |line: usize, reason: String| DomainError::MalformedHandoff {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut wavelengths = Vec::new();
        let mut positions = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if let Some((_, rest)) = comment.split_once("lambda =") {
                    let wavelength = rest
                        .split_whitespace()
                        .next()
                        .and_then(|token| token.parse::<f64>().ok())
                        .ok_or_else(|| {
                            malformed(index + 1, "unreadable wavelength column".to_string())
                        })?;
                    wavelengths.push(wavelength);
                }
                continue;
            }

            let numbers = line
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| malformed(index + 1, err.to_string()))?;
            if numbers.len() != wavelengths.len() + 3 {
                return Err(malformed(
                    index + 1,
                    format!(
                        "expected {} columns, found {}",
                        wavelengths.len() + 3,
                        numbers.len()
                    ),
                ));
            }
            positions.push(ProbePosition {
                position: [numbers[0], numbers[1], numbers[2]],
                values: numbers[3..].to_vec(),
            });
        }

        if wavelengths.len() < 2 {
            return Err(malformed(0, "fewer than two wavelength columns".to_string()));
        }
        Ok(Self {
            wavelengths,
            positions,
        })
    }

    /// Render in the solver's own layout.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (column, axis) in ["x", "y", "z"].iter().enumerate() {
            let _ = writeln!(out, "# column {}: position {axis} (pc)", column + 1);
        }
        for (index, wavelength) in self.wavelengths.iter().enumerate() {
            let _ = writeln!(
                out,
                "# column {}: lambda*J_lambda at lambda = {wavelength} micron (W/m2/sr)",
                index + 4
            );
        }
        for position in &self.positions {
            let [x, y, z] = position.position;
            let _ = write!(out, "{x} {y} {z}");
            for value in &position.values {
                let _ = write!(out, " {value:e}");
            }
            out.push('\n');
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ProbeConverter
// ---------------------------------------------------------------------------

/// Files written by one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Handoff files written for table zones.
    pub zone_files: Vec<PathBuf>,
    /// Handoff files written for probe rows beyond the zone list.
    pub extra_files: Vec<PathBuf>,
}

/// Turns a probe table into one handoff file per zone.
#[derive(Debug, Clone)]
pub struct ProbeConverter {
    significant_digits: u32,
    extra_prefix: String,
}

impl ProbeConverter {
    /// Converter rounding to `significant_digits` and naming extra rows with `extra_prefix`.
    pub fn new(significant_digits: u32, extra_prefix: impl Into<String>) -> Self {
        Self {
            significant_digits: significant_digits.max(1),
            extra_prefix: extra_prefix.into(),
        }
    }

    /// Converter built from the two solver config sections.
    pub fn from_config(
        photoionization: &PhotoionizationConfig,
        radiative_transfer: &RadiativeTransferConfig,
    ) -> Self {
        Self::new(
            photoionization.significant_digits,
            radiative_transfer.extra_prefix.clone(),
        )
    }

    /// Read `probe_path` and write handoff files under `out_dir`.
    pub fn convert_file(
        &self,
        probe_path: &Path,
        zone_files: &[PathBuf],
        out_dir: &Path,
    ) -> DomainResult<ConversionReport> {
        let table = ProbeTable::load(probe_path)?;
        self.convert(&table, zone_files, out_dir)
    }

    /// Write position `i` to `zone_files[i]`; positions past the zone list go to
    /// `<prefix><R>pc.sed`.
    pub fn convert(
        &self,
        table: &ProbeTable,
        zone_files: &[PathBuf],
        out_dir: &Path,
    ) -> DomainResult<ConversionReport> {
        if table.positions.len() < zone_files.len() {
            return Err(DomainError::ZoneCountMismatch {
                expected: zone_files.len(),
                actual: table.positions.len(),
            });
        }

        let wavelengths: Vec<f64> = table
            .wavelengths
            .iter()
            .map(|wavelength| wavelength * MICRONS_TO_NM)
            .collect();

        let mut report = ConversionReport::default();
        for (index, position) in table.positions.iter().enumerate() {
            let values: Vec<f64> = position
                .values
                .iter()
                .map(|value| value * W_PER_M2_TO_ERG_PER_CM2)
                .collect();
            let text = self.render_handoff(&wavelengths, &values);

            let path = match zone_files.get(index) {
                Some(file) => {
                    let path = out_dir.join(file);
                    report.zone_files.push(path.clone());
                    path
                }
                None => {
                    let path =
                        out_dir.join(format!("{}{}pc.sed", self.extra_prefix, position.radius()));
                    report.extra_files.push(path.clone());
                    path
                }
            };
            std::fs::write(&path, text)?;
        }

        tracing::debug!(
            zones = report.zone_files.len(),
            extra = report.extra_files.len(),
            "handoff files written"
        );
        Ok(report)
    }

    /// Render one handoff file.
    ///
    /// `values` are `nu * J_nu` in erg/cm2/s/sr; the file carries `4pi` times
    /// that, from the largest wavelength to the smallest.
    pub fn render_handoff(&self, wavelengths_nm: &[f64], values: &[f64]) -> String {
        let mut samples: Vec<(f64, f64)> = wavelengths_nm
            .iter()
            .copied()
            .zip(values.iter().copied())
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        // integral of J_lambda = (lambda J_lambda) / lambda over lambda
        let total: f64 = samples
            .windows(2)
            .map(|pair| {
                let (x0, y0) = pair[0];
                let (x1, y1) = pair[1];
                0.5 * (x1 - x0) * (y0 / x0 + y1 / x1)
            })
            .sum();
        let intensity = (4.0 * PI * total).max(VALUE_FLOOR).log10();

        let digits = self.significant_digits;
        let mut out = String::new();
        out.push_str("# column 1: wavelength (nm)\n");
        out.push_str("# column 2: 4pi*nu*J_nu (erg/cm2/s)\n");
        if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
            let _ = writeln!(
                out,
                "# intensity {} range {} to {} nm",
                format_number(round_significant(intensity, digits)),
                format_number(first.0),
                format_number(last.0)
            );
        }
        for (row, &(wavelength, value)) in samples.iter().rev().enumerate() {
            let _ = write!(
                out,
                "{} {}",
                format_number(round_significant(wavelength, digits)),
                format_number(round_significant(4.0 * PI * value.max(VALUE_FLOOR), digits))
            );
            if row == 0 {
                out.push_str(" nuFnu units nm");
            }
            out.push('\n');
        }
        out
    }
}

/// Round to `digits` significant digits.
pub fn round_significant(value: f64, digits: u32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let precision = digits.saturating_sub(1) as usize;
    format!("{value:.precision$e}").parse().unwrap_or(value)
}

/// Plain decimals for moderate magnitudes, scientific notation otherwise.
fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 || (1e-4..1e6).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: &str = "\
# column 1: position x (pc)
# column 2: position y (pc)
# column 3: position z (pc)
# column 4: lambda*J_lambda at lambda = 0.1 micron (W/m2/sr)
# column 5: lambda*J_lambda at lambda = 0.5 micron (W/m2/sr)
# column 6: lambda*J_lambda at lambda = 1 micron (W/m2/sr)
1 0 0 1e-3 2e-3 0
3 4 0 1e-3 1e-3 1e-3
";

    #[test]
    fn parses_wavelength_columns_and_rows() {
        let table = ProbeTable::parse(Path::new("probe.dat"), PROBE).unwrap();
        assert_eq!(table.wavelengths, vec![0.1, 0.5, 1.0]);
        assert_eq!(table.positions.len(), 2);
        assert!((table.positions[1].radius() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn render_parses_back() {
        let table = ProbeTable::parse(Path::new("probe.dat"), PROBE).unwrap();
        let again = ProbeTable::parse(Path::new("probe.dat"), &table.render()).unwrap();
        assert_eq!(again, table);
    }

    #[test]
    fn short_row_is_malformed() {
        let text = "# a at lambda = 0.1 micron\n# b at lambda = 0.2 micron\n0 0 0 1\n";
        let err = ProbeTable::parse(Path::new("p"), text).unwrap_err();
        assert!(matches!(err, DomainError::MalformedHandoff { line: 3, .. }));
    }

    #[test]
    fn handoff_is_descending_with_header() {
        let converter = ProbeConverter::new(4, "extra_");
        let text = converter.render_handoff(&[100.0, 500.0, 1000.0], &[1.0, 2.0, 0.0]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# column 1: wavelength (nm)");
        assert!(lines[2].starts_with("# intensity "));
        assert!(lines[2].ends_with(" range 100 to 1000 nm"));
        assert_eq!(lines[3], "1000 1.257e-299 nuFnu units nm");
        assert_eq!(lines[4], "500 25.13");
        assert_eq!(lines[5], "100 12.57");
    }

    #[test]
    fn converts_zone_and_extra_positions() {
        let dir = tempfile::tempdir().unwrap();
        let table = ProbeTable::parse(Path::new("probe.dat"), PROBE).unwrap();
        let converter = ProbeConverter::new(4, "extra_");
        let report = converter
            .convert(&table, &[PathBuf::from("zone0.sed")], dir.path())
            .unwrap();
        assert_eq!(report.zone_files, vec![dir.path().join("zone0.sed")]);
        assert_eq!(report.extra_files, vec![dir.path().join("extra_5pc.sed")]);
        assert!(dir.path().join("extra_5pc.sed").exists());
    }

    #[test]
    fn too_few_positions_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = ProbeTable::parse(Path::new("probe.dat"), PROBE).unwrap();
        let files: Vec<PathBuf> = (0..3).map(|z| PathBuf::from(format!("zone{z}.sed"))).collect();
        assert!(matches!(
            ProbeConverter::new(4, "extra_").convert(&table, &files, dir.path()),
            Err(DomainError::ZoneCountMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn significant_digit_rounding() {
        assert_eq!(round_significant(12.566_37, 4), 12.57);
        assert_eq!(round_significant(123_456.0, 2), 120_000.0);
        assert_eq!(round_significant(0.0, 4), 0.0);
    }
}
