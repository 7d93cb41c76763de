//! Zone parameter table.
//!
//! Holds, per spatial zone, the physical inputs (geometry, density, composition)
//! needed to build solver decks. The table is parsed once at startup and its zone
//! count is fixed for the rest of the run.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Geometry family shared by every zone in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    /// Spherical shells between two radii.
    Shell,
    /// Rings with a radius, width and height.
    Ring,
}

/// Abundance set shared by every zone in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChemistryKind {
    /// The solver's built-in ISM abundance set.
    AbundancesIsm,
    /// Per-zone helium fraction and metallicity.
    Metals,
}

/// Dust treatment shared by every zone in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DustKind {
    /// No grains.
    #[default]
    None,
    /// The solver's built-in ISM grains.
    GrainsIsm,
    /// Grains scaled by a per-zone dust-to-gas ratio.
    DustToGas,
}

/// Header options recognised in a parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableOption {
    Geometry(GeometryKind),
    Chemistry(ChemistryKind),
    Dust(DustKind),
}

impl TableOption {
    /// Map a `(key, value)` header pair onto a known option. Both arguments are
    /// already lower-cased with spaces removed.
    fn from_pair(key: &str, value: &str) -> DomainResult<Self> {
        let option = match (key, value) {
            ("geometry", "shell") => Self::Geometry(GeometryKind::Shell),
            ("geometry", "ring") => Self::Geometry(GeometryKind::Ring),
            ("chemistry", "abundancesism") => Self::Chemistry(ChemistryKind::AbundancesIsm),
            ("chemistry", "metals") => Self::Chemistry(ChemistryKind::Metals),
            ("dust", "no" | "false") => Self::Dust(DustKind::None),
            ("dust", "grainsism") => Self::Dust(DustKind::GrainsIsm),
            ("dust", "dusttogas") => Self::Dust(DustKind::DustToGas),
            _ => {
                return Err(DomainError::UnknownOption {
                    option: key.to_string(),
                    value: value.to_string(),
                })
            }
        };
        Ok(option)
    }
}

/// Table-wide options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Geometry family.
    pub geometry: GeometryKind,
    /// Abundance set.
    pub chemistry: ChemistryKind,
    /// Dust treatment.
    pub dust: DustKind,
}

/// Geometry of a single zone, in parsecs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneGeometry {
    /// Spherical shell.
    Shell {
        /// Inner radius.
        min_radius: f64,
        /// Outer radius.
        max_radius: f64,
    },
    /// Ring in the disk plane.
    Ring {
        /// Distance from the centre.
        radius: f64,
        /// Radial extent.
        width: f64,
        /// Vertical extent.
        height: f64,
    },
}

impl ZoneGeometry {
    /// Slab thickness handed to the photoionization solver.
    pub fn thickness(&self) -> f64 {
        match *self {
            Self::Shell {
                min_radius,
                max_radius,
            } => (max_radius - min_radius) / 2.0,
            Self::Ring { width, .. } => width,
        }
    }
}

/// Composition of a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneComposition {
    /// Built-in ISM abundances.
    AbundancesIsm,
    /// Scaled abundances.
    Metals {
        /// Helium mass fraction.
        helium_fraction: f64,
        /// Metal mass fraction.
        metallicity: f64,
    },
}

/// Physical inputs for one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneParameters {
    /// Handoff file carrying the incident radiation field for this zone.
    pub sed_file: PathBuf,
    /// Cloud mass in solar masses.
    pub mass: f64,
    /// Hydrogen density in cm^-3.
    pub hydrogen_density: f64,
    /// Zone extent.
    pub geometry: ZoneGeometry,
    /// Abundances used for the zone.
    pub composition: ZoneComposition,
    /// Dust-to-gas ratio; negative means unknown (fall back to ISM grains).
    pub dust_to_gas: Option<f64>,
}

impl ZoneParameters {
    /// Dust-to-gas ratio when it is known for this zone.
    pub fn known_dust_to_gas(&self) -> Option<f64> {
        self.dust_to_gas.filter(|dtg| *dtg >= 0.0)
    }
}

/// Per-zone parameters plus the table-wide options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneParameterTable {
    options: TableOptions,
    zones: Vec<ZoneParameters>,
}

impl ZoneParameterTable {
    /// Table from already-parsed parts.
    pub fn new(options: TableOptions, zones: Vec<ZoneParameters>) -> Self {
        Self { options, zones }
    }

    /// Read and parse a table from disk.
    pub fn load(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::parse(path, &text)
    }

    /// Parse table text. `path` is used for error messages only.
    pub fn parse(path: &Path, text: &str) -> DomainResult<Self> {
        let mut geometry = None;
        let mut chemistry = None;
        let mut dust = DustKind::default();
        let mut zones = Vec::new();

        let table_error = |line: usize, reason: String| DomainError::ParameterTable {
            path: path.to_path_buf(),
            line,
            reason,
        };

        for (index, raw) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('#') {
                let header = header.trim();
                if header.to_lowercase().starts_with("column") {
                    continue;
                }
                let Some((key, value)) = header.split_once(':') else {
                    continue;
                };
                if !zones.is_empty() {
                    return Err(table_error(
                        line_number,
                        "options must precede zone rows".to_string(),
                    ));
                }
                let key = key.trim().to_lowercase();
                let value: String = value
                    .split_whitespace()
                    .collect::<String>()
                    .to_lowercase();
                match TableOption::from_pair(&key, &value)? {
                    TableOption::Geometry(kind) => geometry = Some(kind),
                    TableOption::Chemistry(kind) => chemistry = Some(kind),
                    TableOption::Dust(kind) => dust = kind,
                }
                continue;
            }

            let geometry = geometry.ok_or_else(|| {
                table_error(line_number, "geometry option missing before rows".to_string())
            })?;
            let chemistry = chemistry.ok_or_else(|| {
                table_error(line_number, "chemistry option missing before rows".to_string())
            })?;
            let options = TableOptions {
                geometry,
                chemistry,
                dust,
            };
            let zone = parse_row(line, options).map_err(|reason| table_error(line_number, reason))?;
            zones.push(zone);
        }

        let options = TableOptions {
            geometry: geometry.ok_or_else(|| table_error(0, "geometry option missing".to_string()))?,
            chemistry: chemistry
                .ok_or_else(|| table_error(0, "chemistry option missing".to_string()))?,
            dust,
        };
        if zones.is_empty() {
            return Err(table_error(0, "table contains no zones".to_string()));
        }

        Ok(Self { options, zones })
    }

    /// Table-wide options.
    pub const fn options(&self) -> TableOptions {
        self.options
    }

    /// Every zone, in table order.
    pub fn zones(&self) -> &[ZoneParameters] {
        &self.zones
    }

    /// Zone at `index`.
    pub fn zone(&self, index: usize) -> Option<&ZoneParameters> {
        self.zones.get(index)
    }

    /// Number of zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// True for a table without zones.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zone indices `0..N`.
    pub fn zone_indices(&self) -> Vec<usize> {
        (0..self.zones.len()).collect()
    }

    /// Reject incompatible option combinations and return non-fatal warnings.
    pub fn check_compatibility(&self) -> DomainResult<Vec<String>> {
        let mut warnings = Vec::new();
        match (self.options.chemistry, self.options.dust) {
            (ChemistryKind::AbundancesIsm, DustKind::DustToGas) => {
                return Err(DomainError::IncompatibleOptions(
                    "a dust-to-gas ratio cannot be combined with ISM abundances".to_string(),
                ));
            }
            (ChemistryKind::Metals, DustKind::GrainsIsm) => warnings.push(
                "custom metallicity combined with ISM grains; grain abundances are not rescaled"
                    .to_string(),
            ),
            _ => {}
        }
        if self.options.dust == DustKind::DustToGas
            && self
                .zones
                .iter()
                .any(|zone| zone.dust_to_gas.is_some_and(|dtg| dtg < 0.0))
        {
            warnings.push(
                "partial dust-to-gas data; zones without a ratio fall back to ISM grains"
                    .to_string(),
            );
        }
        Ok(warnings)
    }
}

fn parse_row(line: &str, options: TableOptions) -> Result<ZoneParameters, String> {
    let columns: Vec<&str> = line.split_whitespace().collect();
    let mut cursor = Columns {
        columns: &columns,
        next: 1,
    };
    let sed_file = PathBuf::from(columns[0]);
    let mass = cursor.take("mass")?;
    let hydrogen_density = cursor.take("hydrogen density")?;

    let geometry = match options.geometry {
        GeometryKind::Shell => ZoneGeometry::Shell {
            min_radius: cursor.take("minimum radius")?,
            max_radius: cursor.take("maximum radius")?,
        },
        GeometryKind::Ring => ZoneGeometry::Ring {
            radius: cursor.take("ring radius")?,
            width: cursor.take("ring width")?,
            height: cursor.take("ring height")?,
        },
    };

    let composition = match options.chemistry {
        ChemistryKind::AbundancesIsm => ZoneComposition::AbundancesIsm,
        ChemistryKind::Metals => ZoneComposition::Metals {
            helium_fraction: cursor.take("helium fraction")?,
            metallicity: cursor.take("metallicity")?,
        },
    };

    let dust_to_gas = match options.dust {
        DustKind::DustToGas => Some(cursor.take("dust-to-gas ratio")?),
        DustKind::None | DustKind::GrainsIsm => None,
    };

    if hydrogen_density <= 0.0 {
        return Err(format!("hydrogen density must be positive, got {hydrogen_density}"));
    }

    Ok(ZoneParameters {
        sed_file,
        mass,
        hydrogen_density,
        geometry,
        composition,
        dust_to_gas,
    })
}

struct Columns<'a> {
    columns: &'a [&'a str],
    next: usize,
}

impl Columns<'_> {
    fn take(&mut self, field: &str) -> Result<f64, String> {
        let raw = self
            .columns
            .get(self.next)
            .ok_or_else(|| format!("missing column {} ({field})", self.next + 1))?;
        self.next += 1;
        raw.parse::<f64>()
            .map_err(|_| format!("column {} ({field}) is not a number: '{raw}'", self.next))
    }
}

impl Display for GeometryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shell => "shell",
            Self::Ring => "ring",
        })
    }
}

impl Display for ChemistryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AbundancesIsm => "abundances ism",
            Self::Metals => "metals",
        })
    }
}

impl Display for DustKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::GrainsIsm => "grains ism",
            Self::DustToGas => "dust to gas",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHELL_TABLE: &str = "\
# geometry : shell
# chemistry : metals
# dust : dust to gas
# column 1: sed file
zone0.sed 1.0e4 100.0 0.0 2.0 0.26 0.014 0.007
zone1.sed 2.0e4 50.0  2.0 6.0 0.25 0.020 -1
";

    #[test]
    fn parses_shell_metals_dtg_table() {
        let table = ZoneParameterTable::parse(Path::new("gas.dat"), SHELL_TABLE).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.options().geometry, GeometryKind::Shell);
        assert_eq!(table.options().chemistry, ChemistryKind::Metals);
        assert_eq!(table.options().dust, DustKind::DustToGas);

        let zone = table.zone(1).unwrap();
        assert_eq!(zone.sed_file, PathBuf::from("zone1.sed"));
        assert!((zone.geometry.thickness() - 2.0).abs() < 1e-12);
        assert_eq!(zone.known_dust_to_gas(), None);
        assert_eq!(
            zone.composition,
            ZoneComposition::Metals {
                helium_fraction: 0.25,
                metallicity: 0.020
            }
        );

        let warnings = table.check_compatibility().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("partial dust-to-gas"));
    }

    #[test]
    fn parses_ring_table_with_default_dust() {
        let text = "# geometry : ring\n# chemistry : abundances ism\nz.sed 1 10 5 0.5 0.1\n";
        let table = ZoneParameterTable::parse(Path::new("t"), text).unwrap();
        assert_eq!(table.options().dust, DustKind::None);
        assert!((table.zone(0).unwrap().geometry.thickness() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_option_fails_fast() {
        let text = "# geometry : torus\n";
        let err = ZoneParameterTable::parse(Path::new("t"), text).unwrap_err();
        assert!(matches!(err, DomainError::UnknownOption { ref value, .. } if value == "torus"));
    }

    #[test]
    fn missing_column_reports_line() {
        let text = "# geometry : shell\n# chemistry : metals\nz.sed 1 10 0 1 0.25\n";
        let err = ZoneParameterTable::parse(Path::new("t"), text).unwrap_err();
        match err {
            DomainError::ParameterTable { line, reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("metallicity"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ism_abundances_with_dtg_are_incompatible() {
        let text = "# geometry : ring\n# chemistry : abundancesism\n# dust : dusttogas\nz.sed 1 10 5 0.5 0.1 0.01\n";
        let table = ZoneParameterTable::parse(Path::new("t"), text).unwrap();
        assert!(matches!(
            table.check_compatibility(),
            Err(DomainError::IncompatibleOptions(_))
        ));
    }
}
