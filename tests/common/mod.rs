//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use radcoupler::domain::models::{Config, Criterion, TrackedQuantity};
use tempfile::TempDir;

pub const FATAL_MARKER: &str = "PROBLEM DISASTER";

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Write a handoff file: two column comments, then rows from the largest
/// wavelength to the smallest.
pub fn write_handoff(dir: &Path, name: &str, samples: &[(f64, f64)]) -> PathBuf {
    let mut rows = samples.to_vec();
    rows.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut text = String::from("# column 1: wavelength (nm)\n# column 2: 4pi*nu*J_nu (erg/cm2/s)\n");
    for (wavelength, value) in rows {
        let _ = writeln!(text, "{wavelength} {value}");
    }
    let path = dir.join(name);
    std::fs::write(&path, text).expect("Failed to write handoff file");
    path
}

/// A flat handoff curve at `level` between 100 and 1000 nm.
pub fn write_flat_handoff(dir: &Path, name: &str, level: f64) -> PathBuf {
    write_handoff(dir, name, &[(100.0, level), (500.0, level), (1000.0, level)])
}

/// Write a shell / ISM parameter table with `zones` zones to `gas.dat`.
pub fn write_parameter_table(dir: &Path, zones: usize) -> PathBuf {
    let mut text = String::from(
        "# geometry : shell\n# chemistry : abundances ism\n# dust : grains ism\n# column 1: sed file\n",
    );
    for zone in 0..zones {
        let inner = zone as f64 * 2.0;
        let _ = writeln!(text, "zone{zone}.sed 1e4 100 {inner} {}", inner + 2.0);
    }
    let path = dir.join("gas.dat");
    std::fs::write(&path, text).expect("Failed to write parameter table");
    path
}

/// Config rooted at `work_dir` with a single 500 nm quantity and no archive.
pub fn test_config(work_dir: &Path, criterion: Criterion, tolerance: f64, max_iterations: usize) -> Config {
    let mut config = Config {
        work_dir: work_dir.to_path_buf(),
        parameters: PathBuf::from("gas.dat"),
        ..Config::default()
    };
    config.convergence.criterion = criterion;
    config.convergence.quantities = vec![TrackedQuantity::single("v500", 500.0, tolerance)];
    config.convergence.max_iterations = max_iterations;
    config.convergence.start_iteration = 1;
    config.scheduler.workers = 2;
    config.run.archive = false;
    config
}

/// Log sink shared between a scoped subscriber and the test body.
#[derive(Clone, Default)]
pub struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture warnings and errors on the current thread until the guard drops.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
