// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Configuration file handling.
//!
//! Selects the sensor, the PWM output and the calibration curve, and sets
//! the control period. Default path: `/etc/thermofan/config.toml`

use crate::actuator::{ActuatorOutput, HWMON_PWM_MAX, MemoryOutput};
use crate::curve::{self, CurveTable, LoadError, LoadSummary};
use crate::hwmon::{self, HwmonPwm, HwmonSensor};
use crate::sensor::{SensorInitError, SensorSource, SimulatedSensor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/thermofan/config.toml";

/// Default delay between control cycles, in milliseconds.
pub const DEFAULT_PERIOD_MS: u64 = 2000;

/// hwmon device name of the default sensor.
pub const DEFAULT_SENSOR_DEVICE: &str = "hdc3020";

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub curve: CurveConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub actuator: ActuatorConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Control loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Delay after each cycle, in milliseconds.
    #[serde(default = "default_period")]
    pub period_ms: u64,

    /// Stop after this many cycles. Runs until signalled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<u64>,
}

impl ControlConfig {
    /// The delay as a [`Duration`].
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            max_cycles: None,
        }
    }
}

/// Where the calibration curve comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveConfig {
    /// External CSV file. The built-in curve is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Maximum number of points accepted.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            file: None,
            capacity: curve::DEFAULT_CAPACITY,
        }
    }
}

impl CurveConfig {
    /// Load the configured curve, or the built-in one.
    pub fn load(&self) -> Result<(CurveTable, LoadSummary), LoadError> {
        match &self.file {
            Some(path) => {
                log::info!("Loading fan curve from {}", path.display());
                CurveTable::load_file(path, self.capacity)
            }
            None => CurveTable::load(curve::DEFAULT_CURVE_CSV.lines(), self.capacity),
        }
    }
}

/// Which sensor to sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SensorConfig {
    /// hwmon sysfs inputs, given either by device name or by explicit path.
    #[serde(rename = "hwmon")]
    Hwmon {
        /// Name of the hwmon device (its `name` attribute)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device: Option<String>,
        /// Path to a `tempN_input` file; takes precedence over `device`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temp_input: Option<PathBuf>,
        /// Path to a `humidityN_input` file
        #[serde(default, skip_serializing_if = "Option::is_none")]
        humidity_input: Option<PathBuf>,
        /// hwmon root to search when resolving `device`
        #[serde(default = "default_hwmon_root")]
        root: PathBuf,
    },

    /// Replays fixed temperatures.
    #[serde(rename = "simulated")]
    Simulated {
        temps: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        humidity_pct: Option<f64>,
    },
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::Hwmon {
            device: Some(DEFAULT_SENSOR_DEVICE.to_string()),
            temp_input: None,
            humidity_input: None,
            root: default_hwmon_root(),
        }
    }
}

impl SensorConfig {
    /// Construct the configured sensor. Does not probe it.
    pub fn build(&self) -> Result<Box<dyn SensorSource>, SensorInitError> {
        match self {
            Self::Hwmon {
                temp_input: Some(temp_input),
                humidity_input,
                ..
            } => Ok(Box::new(HwmonSensor::new(
                temp_input.clone(),
                humidity_input.clone(),
            ))),
            Self::Hwmon {
                device: Some(device),
                humidity_input,
                root,
                ..
            } => {
                let mut sensor = HwmonSensor::from_device(root, device)?;
                if let Some(path) = humidity_input {
                    sensor = sensor.with_humidity_input(path.clone());
                }
                Ok(Box::new(sensor))
            }
            Self::Hwmon { .. } => Err(SensorInitError::Misconfigured(
                "hwmon sensor needs `device` or `temp_input`".to_string(),
            )),
            Self::Simulated {
                temps,
                humidity_pct,
            } => Ok(Box::new(SimulatedSensor::new(temps.clone(), *humidity_pct))),
        }
    }
}

/// Where duty commands are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActuatorConfig {
    /// A hwmon `pwmN` attribute.
    #[serde(rename = "hwmon")]
    Hwmon {
        /// Path to the `pwmN` file
        pwm: PathBuf,
        /// Path to the `pwmN_enable` file; defaults to `<pwm>_enable`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pwm_enable: Option<PathBuf>,
        /// Whether to restore automatic control on exit.
        #[serde(default = "default_true")]
        restore_on_exit: bool,
    },

    /// Keep commands in memory (dry run).
    #[serde(rename = "memory")]
    Memory {
        #[serde(default = "default_resolution")]
        resolution: u32,
    },
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self::Memory {
            resolution: HWMON_PWM_MAX,
        }
    }
}

impl ActuatorConfig {
    /// Construct the configured output.
    pub fn build(&self) -> Box<dyn ActuatorOutput> {
        match self {
            Self::Hwmon {
                pwm,
                pwm_enable,
                restore_on_exit,
            } => Box::new(HwmonPwm::new(
                pwm.clone(),
                pwm_enable.clone(),
                *restore_on_exit,
            )),
            Self::Memory { resolution } => {
                log::warn!("No PWM output configured, duty commands are not written to hardware");
                Box::new(MemoryOutput::new(*resolution))
            }
        }
    }
}

/// How cycle reports are rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable lines through the logger
    #[default]
    Log,
    /// One JSON object per line on stdout
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Load / Save
// ---------------------------------------------------------------------------

/// Load config from a TOML file, or return the default if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        log::info!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Save config to a TOML file, creating parent directories if needed.
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents).map_err(write_err)?;
    log::info!("Saved config to {}", path.display());
    Ok(())
}

/// Resolve the config file path from CLI arg or default.
pub fn resolve_config_path(cli_path: Option<&str>) -> PathBuf {
    cli_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_period() -> u64 {
    DEFAULT_PERIOD_MS
}

fn default_capacity() -> usize {
    curve::DEFAULT_CAPACITY
}

fn default_hwmon_root() -> PathBuf {
    PathBuf::from(hwmon::HWMON_ROOT)
}

fn default_resolution() -> u32 {
    HWMON_PWM_MAX
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.control.period_ms, DEFAULT_PERIOD_MS);
        assert_eq!(config.curve.capacity, curve::DEFAULT_CAPACITY);
        assert!(matches!(
            config.sensor,
            SensorConfig::Hwmon { device: Some(ref d), .. } if d == DEFAULT_SENSOR_DEVICE
        ));
        assert_eq!(config.report.format, ReportFormat::Log);
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"
            [control]
            period_ms = 500
            max_cycles = 3

            [curve]
            file = "/etc/thermofan/curve.csv"
            capacity = 8

            [sensor]
            kind = "simulated"
            temps = [25.0, 45.0]
            humidity_pct = 40.0

            [actuator]
            kind = "hwmon"
            pwm = "/sys/class/hwmon/hwmon2/pwm1"

            [report]
            format = "json"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.control.period(), Duration::from_millis(500));
        assert_eq!(config.control.max_cycles, Some(3));
        assert_eq!(config.curve.capacity, 8);
        assert!(matches!(config.sensor, SensorConfig::Simulated { ref temps, .. } if temps.len() == 2));
        assert!(matches!(
            config.actuator,
            ActuatorConfig::Hwmon { restore_on_exit: true, pwm_enable: None, .. }
        ));
        assert_eq!(config.report.format, ReportFormat::Json);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[control\nperiod_ms = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.control.period_ms = 750;
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.control.period_ms, 750);
    }

    #[test]
    fn test_curve_config_uses_builtin_curve() {
        let (table, _) = CurveConfig::default().load().unwrap();
        assert_eq!(table.size(), 7);
    }

    #[test]
    fn test_curve_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.csv");
        fs::write(&path, "bogus\n10,0.1\n20,0.2\n30,0.3\n").unwrap();
        let config = CurveConfig {
            file: Some(path),
            capacity: 2,
        };
        let (table, summary) = config.load().unwrap();
        assert_eq!(table.size(), 2);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.truncated, 1);
    }

    #[test]
    fn test_hwmon_sensor_requires_a_source() {
        let config = SensorConfig::Hwmon {
            device: None,
            temp_input: None,
            humidity_input: None,
            root: default_hwmon_root(),
        };
        assert!(matches!(config.build(), Err(SensorInitError::Misconfigured(_))));
    }

    #[test]
    fn test_hwmon_sensor_by_device_name() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("hwmon0");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("name"), "hdc3020\n").unwrap();
        fs::write(dir.join("temp1_input"), "31500\n").unwrap();

        let config = SensorConfig::Hwmon {
            device: Some("hdc3020".to_string()),
            temp_input: None,
            humidity_input: None,
            root: root.path().to_path_buf(),
        };
        let mut sensor = config.build().unwrap();
        sensor.init().unwrap();
        assert_eq!(sensor.read().unwrap().temp_c, 31.5);
    }
}
