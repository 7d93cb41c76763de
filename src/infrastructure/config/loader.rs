use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid workers: {0}. Must be at least 1")]
    InvalidWorkers(usize),

    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(usize),

    #[error("Invalid start_iteration: {start}. Must not exceed max_iterations ({max})")]
    InvalidStartIteration { start: usize, max: usize },

    #[error("At least one tracked quantity is required")]
    NoQuantities,

    #[error("Invalid tolerance for quantity '{name}': {tolerance}. Must be positive and finite")]
    InvalidTolerance { name: String, tolerance: f64 },

    #[error("Invalid wavelength for quantity '{name}': {wavelength}")]
    InvalidWavelength { name: String, wavelength: String },

    #[error("Invalid threads: {0}. Must be at least 1")]
    InvalidThreads(usize),

    #[error("{0} binary cannot be empty")]
    EmptyBinary(&'static str),

    #[error("Fatal marker cannot be empty")]
    EmptyFatalMarker,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. radcoupler.yaml (run config)
    /// 3. radcoupler.local.yaml (local overrides, optional)
    /// 4. Environment variables (RADCOUPLER_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("radcoupler.yaml"))
            .merge(Yaml::file("radcoupler.local.yaml"))
            .merge(Env::prefixed("RADCOUPLER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.scheduler.workers == 0 {
            return Err(ConfigError::InvalidWorkers(config.scheduler.workers));
        }

        let convergence = &config.convergence;
        if convergence.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(convergence.max_iterations));
        }
        if convergence.start_iteration > convergence.max_iterations {
            return Err(ConfigError::InvalidStartIteration {
                start: convergence.start_iteration,
                max: convergence.max_iterations,
            });
        }
        if convergence.quantities.is_empty() {
            return Err(ConfigError::NoQuantities);
        }
        for quantity in &convergence.quantities {
            if !quantity.tolerance.is_finite() || quantity.tolerance <= 0.0 {
                return Err(ConfigError::InvalidTolerance {
                    name: quantity.name.clone(),
                    tolerance: quantity.tolerance,
                });
            }
            if !quantity.wavelength.is_valid() {
                return Err(ConfigError::InvalidWavelength {
                    name: quantity.name.clone(),
                    wavelength: quantity.wavelength.to_string(),
                });
            }
        }

        if config.photoionization.binary.trim().is_empty() {
            return Err(ConfigError::EmptyBinary("photoionization"));
        }
        if config.photoionization.fatal_marker.is_empty() {
            return Err(ConfigError::EmptyFatalMarker);
        }
        if config.radiative_transfer.binary.trim().is_empty() {
            return Err(ConfigError::EmptyBinary("radiative_transfer"));
        }
        if config.radiative_transfer.threads == 0 {
            return Err(ConfigError::InvalidThreads(config.radiative_transfer.threads));
        }
        if config.scheduler.solver_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "scheduler.solver_timeout_secs must be positive when set".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Criterion, SchedulingMode, TrackedQuantity};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(config.convergence.max_iterations, 10);
        assert_eq!(config.photoionization.fatal_marker, "PROBLEM DISASTER");
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
work_dir: /data/run1
scheduler:
  workers: 8
  mode: pool
convergence:
  criterion: all
  max_iterations: 6
  quantities:
    - name: halpha
      wavelength: 656.3
      tolerance: 0.05
    - name: optical
      wavelength: [400.0, 700.0]
      tolerance: 0.1
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.work_dir, std::path::PathBuf::from("/data/run1"));
        assert_eq!(config.scheduler.workers, 8);
        assert_eq!(config.scheduler.mode, SchedulingMode::Pool);
        assert_eq!(config.convergence.criterion, Criterion::Both);
        assert_eq!(config.convergence.quantities.len(), 2);
        assert_eq!(
            config.convergence.quantities[1],
            TrackedQuantity::band("optical", 400.0, 700.0, 0.1)
        );
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_workers() {
        let mut config = Config::default();
        config.scheduler.workers = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidWorkers(0)
        ));
    }

    #[test]
    fn test_validate_zero_max_iterations() {
        let mut config = Config::default();
        config.convergence.max_iterations = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxIterations(0)
        ));
    }

    #[test]
    fn test_validate_start_beyond_max() {
        let mut config = Config::default();
        config.convergence.max_iterations = 3;
        config.convergence.start_iteration = 4;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidStartIteration { start: 4, max: 3 }
        ));
    }

    #[test]
    fn test_validate_zero_tolerance() {
        let mut config = Config::default();
        config.convergence.quantities = vec![TrackedQuantity::single("v", 550.0, 0.0)];

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidTolerance { .. }
        ));
    }

    #[test]
    fn test_validate_inverted_band() {
        let mut config = Config::default();
        config.convergence.quantities = vec![TrackedQuantity::band("b", 700.0, 400.0, 0.1)];

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidWavelength { .. }
        ));
    }

    #[test]
    fn test_validate_empty_marker() {
        let mut config = Config::default();
        config.photoionization.fatal_marker = String::new();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyFatalMarker
        ));
    }

    #[test]
    fn test_validate_bad_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidRotation(_)
        ));
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            [
                ("RADCOUPLER_SCHEDULER__WORKERS", Some("12")),
                ("RADCOUPLER_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config: Config = Figment::new()
                    .merge(Serialized::defaults(Config::default()))
                    .merge(Env::prefixed("RADCOUPLER_").split("__"))
                    .extract()
                    .unwrap();
                assert_eq!(config.scheduler.workers, 12);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "scheduler:\n  workers: 2\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "scheduler:\n  workers: 6\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.scheduler.workers, 6, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_load_from_file_validates() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "scheduler:\n  workers: 0").unwrap();
        file.flush().unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }
}
