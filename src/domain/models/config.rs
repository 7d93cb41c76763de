use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::quantity::{Criterion, TrackedQuantity};

/// Main configuration structure for radcoupler.
///
/// Built once at startup and handed to each component by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory where decks, logs and handoff files live
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Zone parameter table path
    #[serde(default = "default_parameters")]
    pub parameters: PathBuf,

    /// Photoionization solver configuration
    #[serde(default)]
    pub photoionization: PhotoionizationConfig,

    /// Radiative-transfer solver configuration
    #[serde(default)]
    pub radiative_transfer: RadiativeTransferConfig,

    /// Parallel execution configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Convergence detection configuration
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Outer loop configuration
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_parameters() -> PathBuf {
    PathBuf::from("input_data/params/gas.dat")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            parameters: default_parameters(),
            photoionization: PhotoionizationConfig::default(),
            radiative_transfer: RadiativeTransferConfig::default(),
            scheduler: SchedulerConfig::default(),
            convergence: ConvergenceConfig::default(),
            run: RunConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Photoionization solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PhotoionizationConfig {
    /// Path to the solver executable
    #[serde(default = "default_photoionization_binary")]
    pub binary: String,

    /// Argument template; `{stem}` is replaced by the zone's file stem
    #[serde(default = "default_photoionization_args")]
    pub args: Vec<String>,

    /// Literal string the solver writes to `<stem>.out` when it crashes
    #[serde(default = "default_fatal_marker")]
    pub fatal_marker: String,

    /// Disable quantum heating of grains for every zone
    #[serde(default)]
    pub disable_qheat: bool,

    /// Include PAH grains
    #[serde(default = "default_true")]
    pub enable_pah: bool,

    /// Add the cosmic-ray background
    #[serde(default = "default_true")]
    pub cosmic_rays: bool,

    /// Add the cosmic microwave background
    #[serde(default = "default_true")]
    pub cmb: bool,

    /// Significant digits used when writing tabulated values
    #[serde(default = "default_significant_digits")]
    pub significant_digits: u32,

    /// Optional extra solver outputs
    #[serde(default)]
    pub extra_outputs: ExtraOutputs,
}

fn default_photoionization_binary() -> String {
    "cloudy.exe".to_string()
}

fn default_photoionization_args() -> Vec<String> {
    vec!["-r".to_string(), "{stem}".to_string()]
}

fn default_fatal_marker() -> String {
    "PROBLEM DISASTER".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_significant_digits() -> u32 {
    4
}

impl Default for PhotoionizationConfig {
    fn default() -> Self {
        Self {
            binary: default_photoionization_binary(),
            args: default_photoionization_args(),
            fatal_marker: default_fatal_marker(),
            disable_qheat: false,
            enable_pah: true,
            cosmic_rays: true,
            cmb: true,
            significant_digits: default_significant_digits(),
            extra_outputs: ExtraOutputs::default(),
        }
    }
}

/// Extra outputs requested from the photoionization solver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExtraOutputs {
    /// Diffuse emissivity at the last zone
    #[serde(default)]
    pub emissivity: bool,

    /// Total opacity at the last zone
    #[serde(default)]
    pub opacity: bool,

    /// Grain abundances
    #[serde(default)]
    pub grain_abundances: bool,

    /// Grain dust-to-gas ratio
    #[serde(default)]
    pub grain_dust_to_gas: bool,

    /// Continuum emissivity versus depth at these wavelengths (nm)
    #[serde(default)]
    pub radiative_transfer_wavelengths: Vec<f64>,
}

/// Radiative-transfer solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RadiativeTransferConfig {
    /// Path to the solver executable
    #[serde(default = "default_radiative_transfer_binary")]
    pub binary: String,

    /// Argument template; `{threads}` and `{ski}` are substituted
    #[serde(default = "default_radiative_transfer_args")]
    pub args: Vec<String>,

    /// Threads handed to the solver
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Simulation description file
    #[serde(default = "default_ski_file")]
    pub ski_file: PathBuf,

    /// Mean-intensity probe file written by the solver
    #[serde(default = "default_probe_output")]
    pub probe_output: PathBuf,

    /// File name prefix for probe positions beyond the zone list
    #[serde(default = "default_extra_prefix")]
    pub extra_prefix: String,
}

fn default_radiative_transfer_binary() -> String {
    "skirt".to_string()
}

fn default_radiative_transfer_args() -> Vec<String> {
    vec!["-t".to_string(), "{threads}".to_string(), "{ski}".to_string()]
}

const fn default_threads() -> usize {
    4
}

fn default_ski_file() -> PathBuf {
    PathBuf::from("skirt_file.ski")
}

fn default_probe_output() -> PathBuf {
    PathBuf::from("skirt_file_nuJnu_J.dat")
}

fn default_extra_prefix() -> String {
    "extra_".to_string()
}

impl Default for RadiativeTransferConfig {
    fn default() -> Self {
        Self {
            binary: default_radiative_transfer_binary(),
            args: default_radiative_transfer_args(),
            threads: default_threads(),
            ski_file: default_ski_file(),
            probe_output: default_probe_output(),
            extra_prefix: default_extra_prefix(),
        }
    }
}

/// How zone solves are overlapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// Fixed batches of `workers` zones, each joined before the next starts
    #[default]
    Barrier,
    /// Rolling pool of `workers` slots
    Pool,
}

/// Parallel execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Maximum concurrent solver processes
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Batch scheduling mode
    #[serde(default)]
    pub mode: SchedulingMode,

    /// Kill a zone solve after this many seconds
    #[serde(default)]
    pub solver_timeout_secs: Option<u64>,
}

const fn default_workers() -> usize {
    4
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            mode: SchedulingMode::default(),
            solver_timeout_secs: None,
        }
    }
}

/// Convergence detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceConfig {
    /// Criterion applied to every (quantity, zone) pair
    #[serde(default)]
    pub criterion: Criterion,

    /// Quantities monitored for convergence
    #[serde(default = "default_quantities")]
    pub quantities: Vec<TrackedQuantity>,

    /// Iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// First iteration that takes part in convergence checks
    #[serde(default = "default_start_iteration")]
    pub start_iteration: usize,

    /// Optional human-readable dump of the convergence records
    #[serde(default)]
    pub diagnostics_file: Option<PathBuf>,
}

fn default_quantities() -> Vec<TrackedQuantity> {
    vec![TrackedQuantity::single("visible", 550.0, 0.1)]
}

const fn default_max_iterations() -> usize {
    10
}

const fn default_start_iteration() -> usize {
    1
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            criterion: Criterion::default(),
            quantities: default_quantities(),
            max_iterations: default_max_iterations(),
            start_iteration: default_start_iteration(),
            diagnostics_file: None,
        }
    }
}

/// Outer loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    /// Run the radiative-transfer-only seed iteration first
    #[serde(default = "default_true")]
    pub seed: bool,

    /// Offset added to iteration labels when resuming a previous run
    #[serde(default)]
    pub first_iteration: usize,

    /// Copy each iteration's files into `iteration<N>`
    #[serde(default = "default_true")]
    pub archive: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: true,
            first_iteration: 0,
            archive: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
