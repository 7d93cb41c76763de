//! Per-zone handoff files on disk.

use std::path::{Path, PathBuf};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Spectrum, ZoneParameterTable};
use crate::domain::ports::SpectrumSource;

/// Reads each zone's handoff file from a working directory.
#[derive(Debug, Clone)]
pub struct HandoffDirectory {
    work_dir: PathBuf,
    files: Vec<PathBuf>,
}

impl HandoffDirectory {
    /// `files[z]` is the handoff file of zone `z`, relative to `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            files,
        }
    }

    /// Use the handoff files named in the zone parameter table.
    pub fn from_table(work_dir: impl Into<PathBuf>, table: &ZoneParameterTable) -> Self {
        let files = table
            .zones()
            .iter()
            .map(|zone| zone.sed_file.clone())
            .collect();
        Self::new(work_dir, files)
    }

    /// Relative file names, one per zone.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Absolute handoff path for `zone`, if the zone exists.
    pub fn path(&self, zone: usize) -> Option<PathBuf> {
        self.files.get(zone).map(|file| self.work_dir.join(file))
    }
}

impl SpectrumSource for HandoffDirectory {
    fn zone_count(&self) -> usize {
        self.files.len()
    }

    fn load(&self, zone: usize) -> DomainResult<Spectrum> {
        let path = self.path(zone).ok_or(DomainError::ZoneCountMismatch {
            expected: zone + 1,
            actual: self.files.len(),
        })?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DomainError::HandoffMissing(path));
            }
            Err(err) => return Err(err.into()),
        };
        parse_handoff(&path, &text)
    }
}

/// Parse handoff text into an ascending spectrum.
///
/// Comment lines are skipped. Each data row contributes its first two columns;
/// anything after them (such as the `nuFnu units nm` marker) is ignored.
pub fn parse_handoff(path: &Path, text: &str) -> DomainResult<Spectrum> {
    let malformed = |line: usize, reason: String| DomainError::MalformedHandoff {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut samples = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut columns = line.split_whitespace();
        let mut next_number = |name: &str| -> DomainResult<f64> {
            let token = columns
                .next()
                .ok_or_else(|| malformed(index + 1, format!("missing {name} column")))?;
            token
                .parse::<f64>()
                .map_err(|_| malformed(index + 1, format!("{name} '{token}' is not a number")))
        };
        let wavelength = next_number("wavelength")?;
        let value = next_number("value")?;
        samples.push((wavelength, value));
    }

    Spectrum::from_samples(samples).map_err(|err| malformed(0, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANDOFF: &str = "\
# column 1: wavelength (nm)
# column 2: 4pi*nu*J_nu (erg/cm2/s)
# intensity 1.5 range 100 to 1000 nm
1000 3.0 nuFnu units nm
500 2.0
100 1.0
";

    #[test]
    fn parses_descending_file_into_ascending_curve() {
        let spectrum = parse_handoff(Path::new("zone0.sed"), HANDOFF).unwrap();
        assert_eq!(spectrum.wavelengths(), &[100.0, 500.0, 1000.0]);
        assert_eq!(spectrum.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn bad_row_reports_line_number() {
        let text = "# c1\n# c2\n1000 3.0\n500 abc\n";
        let err = parse_handoff(Path::new("z.sed"), text).unwrap_err();
        assert!(matches!(err, DomainError::MalformedHandoff { line: 4, .. }));
    }

    #[test]
    fn single_sample_is_malformed() {
        let err = parse_handoff(Path::new("z.sed"), "# c\n1000 3.0\n").unwrap_err();
        assert!(matches!(err, DomainError::MalformedHandoff { line: 0, .. }));
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = HandoffDirectory::new(dir.path(), vec![PathBuf::from("zone0.sed")]);
        let err = source.load(0).unwrap_err();
        assert!(matches!(err, DomainError::HandoffMissing(path) if path.ends_with("zone0.sed")));
    }

    #[test]
    fn loads_from_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zone0.sed"), HANDOFF).unwrap();
        let source = HandoffDirectory::new(dir.path(), vec![PathBuf::from("zone0.sed")]);
        assert_eq!(source.zone_count(), 1);
        assert_eq!(source.load(0).unwrap().len(), 3);
        assert!(source.load(1).is_err());
    }
}
