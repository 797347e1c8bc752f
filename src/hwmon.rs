// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! hwmon sysfs discovery, sensor input and PWM output.
//!
//! Scans `/sys/class/hwmon/` for temperature, humidity and PWM entries.
//! Temperatures are reported in millidegrees Celsius and humidity in
//! milli-percent; PWM duty is 0-255.

use crate::actuator::{ActuatorError, ActuatorOutput, HWMON_PWM_MAX};
use crate::sensor::{SensorInitError, SensorReadError, SensorReading, SensorSource};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// `pwmN_enable` value for manual control.
const PWM_ENABLE_MANUAL: u8 = 1;
/// `pwmN_enable` value for automatic (firmware) control.
const PWM_ENABLE_AUTO: u8 = 2;

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// A numbered sensor attribute, e.g. `temp1_input`.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub index: u32,
    pub label: Option<String>,
    pub input_path: PathBuf,
    /// Current value in natural units (C or %RH)
    pub value: Option<f64>,
}

/// A `pwmN` output.
#[derive(Debug, Clone, Serialize)]
pub struct PwmChannel {
    pub index: u32,
    pub pwm_path: PathBuf,
    pub pwm_enable_path: PathBuf,
    /// Current PWM value 0-255
    pub pwm: Option<u8>,
    /// Current PWM enable mode: 0=off, 1=manual, 2=auto
    pub pwm_enable: Option<u8>,
}

/// One hwmon device and everything found under it.
#[derive(Debug, Clone, Serialize)]
pub struct HwmonDevice {
    /// Directory name, e.g. "hwmon3"
    pub id: String,
    /// Contents of the `name` attribute
    pub name: String,
    pub path: PathBuf,
    pub temps: Vec<Channel>,
    pub humidity: Vec<Channel>,
    pub pwms: Vec<PwmChannel>,
}

impl HwmonDevice {
    /// No temperature, humidity or PWM entries.
    pub fn is_empty(&self) -> bool {
        self.temps.is_empty() && self.humidity.is_empty() && self.pwms.is_empty()
    }
}

/// Scan an hwmon root and return every device, sorted by id.
pub fn scan(root: &Path) -> io::Result<Vec<HwmonDevice>> {
    let mut devices = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let dir = entry.path();
        let name = read_trimmed(&dir.join("name")).unwrap_or_default();
        let id = entry.file_name().to_string_lossy().to_string();

        devices.push(HwmonDevice {
            temps: scan_channels(&dir, "temp", 32),
            humidity: scan_channels(&dir, "humidity", 8),
            pwms: scan_pwms(&dir),
            id,
            name,
            path: dir,
        });
    }

    devices.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(devices)
}

/// Find the first device whose `name` matches.
pub fn find_device(root: &Path, name: &str) -> io::Result<Option<HwmonDevice>> {
    Ok(scan(root)?.into_iter().find(|d| d.name == name))
}

fn scan_channels(dir: &Path, kind: &str, max: u32) -> Vec<Channel> {
    let mut channels = Vec::new();
    for n in 1..=max {
        let input_path = dir.join(format!("{kind}{n}_input"));
        if !input_path.exists() {
            break;
        }
        channels.push(Channel {
            index: n,
            label: read_trimmed(&dir.join(format!("{kind}{n}_label"))),
            value: read_milli(&input_path).ok(),
            input_path,
        });
    }
    channels
}

fn scan_pwms(dir: &Path) -> Vec<PwmChannel> {
    let mut pwms = Vec::new();
    for n in 1..=16 {
        let pwm_path = dir.join(format!("pwm{n}"));
        if !pwm_path.exists() {
            break;
        }
        let pwm_enable_path = dir.join(format!("pwm{n}_enable"));
        pwms.push(PwmChannel {
            index: n,
            pwm: read_trimmed(&pwm_path).and_then(|s| s.parse().ok()),
            pwm_enable: read_trimmed(&pwm_enable_path).and_then(|s| s.parse().ok()),
            pwm_path,
            pwm_enable_path,
        });
    }
    pwms
}

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

/// Temperature (and optionally humidity) read from hwmon `*_input` files.
#[derive(Debug, Clone)]
pub struct HwmonSensor {
    temp_input: PathBuf,
    humidity_input: Option<PathBuf>,
    initialized: bool,
}

impl HwmonSensor {
    /// Read from explicit `*_input` paths.
    pub fn new(temp_input: PathBuf, humidity_input: Option<PathBuf>) -> Self {
        Self {
            temp_input,
            humidity_input,
            initialized: false,
        }
    }

    /// Use the first temperature and humidity inputs of a named device.
    pub fn from_device(root: &Path, name: &str) -> Result<Self, SensorInitError> {
        let device = find_device(root, name)
            .map_err(|source| SensorInitError::Scan {
                root: root.to_path_buf(),
                source,
            })?
            .ok_or_else(|| SensorInitError::DeviceNotFound {
                name: name.to_string(),
            })?;
        let temp = device
            .temps
            .first()
            .ok_or_else(|| SensorInitError::NoTemperatureInput {
                name: name.to_string(),
            })?;
        Ok(Self::new(
            temp.input_path.clone(),
            device.humidity.first().map(|h| h.input_path.clone()),
        ))
    }

    /// Read humidity from `path` instead.
    pub fn with_humidity_input(mut self, path: PathBuf) -> Self {
        self.humidity_input = Some(path);
        self
    }
}

impl SensorSource for HwmonSensor {
    fn init(&mut self) -> Result<(), SensorInitError> {
        for path in std::iter::once(&self.temp_input).chain(self.humidity_input.as_ref()) {
            if !path.exists() {
                return Err(SensorInitError::NotFound { path: path.clone() });
            }
        }
        read_milli(&self.temp_input).map_err(SensorInitError::NotResponding)?;
        self.initialized = true;
        Ok(())
    }

    fn read(&mut self) -> Result<SensorReading, SensorReadError> {
        if !self.initialized {
            return Err(SensorReadError::NotInitialized);
        }
        let temp_c = read_milli(&self.temp_input)?;
        let humidity_pct = self
            .humidity_input
            .as_deref()
            .map(read_milli)
            .transpose()?;
        Ok(SensorReading {
            temp_c,
            humidity_pct,
        })
    }

    fn describe(&self) -> String {
        self.temp_input.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// PWM output
// ---------------------------------------------------------------------------

/// A hwmon `pwmN` attribute driven in manual mode.
#[derive(Debug, Clone)]
pub struct HwmonPwm {
    pwm_path: PathBuf,
    pwm_enable_path: PathBuf,
    restore_on_exit: bool,
    manual: bool,
}

impl HwmonPwm {
    /// Drive `pwm_path`. The enable file defaults to `<pwm>_enable`.
    pub fn new(pwm_path: PathBuf, pwm_enable_path: Option<PathBuf>, restore_on_exit: bool) -> Self {
        let pwm_enable_path = pwm_enable_path.unwrap_or_else(|| {
            let mut name = pwm_path.as_os_str().to_owned();
            name.push("_enable");
            PathBuf::from(name)
        });
        Self {
            pwm_path,
            pwm_enable_path,
            restore_on_exit,
            manual: false,
        }
    }

    fn set_pwm_enable(&self, mode: u8) -> Result<(), ActuatorError> {
        fs::write(&self.pwm_enable_path, format!("{mode}")).map_err(|source| {
            ActuatorError::Write {
                path: self.pwm_enable_path.clone(),
                value: mode.into(),
                source,
            }
        })
    }
}

impl ActuatorOutput for HwmonPwm {
    fn resolution(&self) -> u32 {
        HWMON_PWM_MAX
    }

    fn write(&mut self, command: u32) -> Result<(), ActuatorError> {
        if command > HWMON_PWM_MAX {
            return Err(ActuatorError::Rejected(command));
        }
        if !self.manual {
            self.set_pwm_enable(PWM_ENABLE_MANUAL)?;
            self.manual = true;
        }
        fs::write(&self.pwm_path, format!("{command}")).map_err(|source| ActuatorError::Write {
            path: self.pwm_path.clone(),
            value: command,
            source,
        })
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        if !self.restore_on_exit || !self.manual {
            return Ok(());
        }
        self.set_pwm_enable(PWM_ENABLE_AUTO)?;
        self.manual = false;
        log::info!("Restored {} to automatic control", self.pwm_path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.pwm_path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Read a milli-unit integer attribute and scale it to units.
fn read_milli(path: &Path) -> Result<f64, SensorReadError> {
    let raw = fs::read_to_string(path).map_err(|source| SensorReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = raw.trim();
    value
        .parse::<i64>()
        .map(|milli| milli as f64 / 1000.0)
        .map_err(|_| SensorReadError::Parse {
            path: path.to_path_buf(),
            value: value.to_string(),
        })
}
