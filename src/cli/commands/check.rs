//! Implementation of the `radcoupler check` command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{list_table, output, sci, CommandOutput};
use crate::domain::models::{
    Criterion, TableOptions, ZoneComposition, ZoneGeometry, ZoneParameters,
};

use super::{load_config, load_table};

/// Arguments for `radcoupler check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Configuration file (defaults to radcoupler.yaml plus environment overrides)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Summary of a validated configuration and parameter table.
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    /// Parameter table that was read.
    pub parameters: PathBuf,
    /// Table-wide options.
    pub options: TableOptions,
    /// Configured convergence criterion.
    pub criterion: Criterion,
    /// Configured iteration cap.
    pub max_iterations: usize,
    /// Configured worker count.
    pub workers: usize,
    /// Non-fatal option compatibility warnings.
    pub warnings: Vec<String>,
    /// Parsed zones, in table order.
    pub zones: Vec<ZoneParameters>,
}

fn geometry_cell(geometry: &ZoneGeometry) -> String {
    match *geometry {
        ZoneGeometry::Shell {
            min_radius,
            max_radius,
        } => format!("shell {min_radius}-{max_radius} pc"),
        ZoneGeometry::Ring {
            radius,
            width,
            height,
        } => format!("ring r={radius} w={width} h={height} pc"),
    }
}

fn composition_cell(composition: &ZoneComposition) -> String {
    match *composition {
        ZoneComposition::AbundancesIsm => "ism".to_string(),
        ZoneComposition::Metals {
            helium_fraction,
            metallicity,
        } => format!("He {} Z {}", sci(helium_fraction), sci(metallicity)),
    }
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{} zone(s) in {} (geometry {}, chemistry {}, dust {})",
            self.zones.len(),
            self.parameters.display(),
            self.options.geometry,
            self.options.chemistry,
            self.options.dust
        )];
        lines.push(format!(
            "criterion {}, max iterations {}, workers {}",
            self.criterion, self.max_iterations, self.workers
        ));
        for warning in &self.warnings {
            lines.push(format!("warning: {warning}"));
        }

        let mut table = list_table(&[
            "zone", "sed file", "mass", "n_h", "geometry", "thickness", "composition", "dtg",
        ]);
        for (zone, params) in self.zones.iter().enumerate() {
            table.add_row(vec![
                zone.to_string(),
                params.sed_file.display().to_string(),
                sci(params.mass),
                sci(params.hydrogen_density),
                geometry_cell(&params.geometry),
                sci(params.geometry.thickness()),
                composition_cell(&params.composition),
                params
                    .dust_to_gas
                    .map_or_else(|| "-".to_string(), sci),
            ]);
        }
        lines.push(table.to_string());
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Validate config and table and print the summary.
pub async fn execute(args: CheckArgs, json_mode: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let table = load_table(&config)?;
    let warnings = table.check_compatibility()?;

    let result = CheckOutput {
        parameters: config.work_dir.join(&config.parameters),
        options: table.options(),
        criterion: config.convergence.criterion,
        max_iterations: config.convergence.max_iterations,
        workers: config.scheduler.workers,
        warnings,
        zones: table.zones().to_vec(),
    };
    output(&result, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ChemistryKind, DustKind, GeometryKind};

    #[test]
    fn human_output_lists_every_zone() {
        let zone = |radius: f64| ZoneParameters {
            sed_file: PathBuf::from(format!("zone{radius}.sed")),
            mass: 1.0e4,
            hydrogen_density: 100.0,
            geometry: ZoneGeometry::Shell {
                min_radius: radius,
                max_radius: radius + 2.0,
            },
            composition: ZoneComposition::AbundancesIsm,
            dust_to_gas: None,
        };
        let result = CheckOutput {
            parameters: PathBuf::from("gas.dat"),
            options: TableOptions {
                geometry: GeometryKind::Shell,
                chemistry: ChemistryKind::AbundancesIsm,
                dust: DustKind::None,
            },
            criterion: Criterion::Previous,
            max_iterations: 10,
            workers: 4,
            warnings: vec![],
            zones: vec![zone(0.0), zone(2.0)],
        };
        let text = result.to_human();
        assert!(text.starts_with("2 zone(s) in gas.dat"));
        assert!(text.contains("zone2.sed"));
        assert!(text.contains("shell 2-4 pc"));
    }
}
