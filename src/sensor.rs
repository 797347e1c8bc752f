// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Sensor port: where temperature and humidity readings come from.
//!
//! The controller only sees [`SensorSource`]. The hwmon-backed source lives
//! in [`crate::hwmon`]; [`SimulatedSensor`] replays a fixed sequence for
//! hosts without the sensor attached and for tests.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;

/// One temperature/humidity sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Temperature in degrees Celsius
    pub temp_c: f64,
    /// Relative humidity in percent, if the sensor reports it
    pub humidity_pct: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SensorInitError {
    #[error("sensor input {} not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to scan {}: {source}", .root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no hwmon device named '{name}'")]
    DeviceNotFound { name: String },

    #[error("hwmon device '{name}' has no temperature input")]
    NoTemperatureInput { name: String },

    #[error("sensor did not respond: {0}")]
    NotResponding(#[source] SensorReadError),

    #[error("sensor configuration is incomplete: {0}")]
    Misconfigured(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SensorReadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected value {value:?} in {}", .path.display())]
    Parse { path: PathBuf, value: String },

    #[error("sensor has not been initialized")]
    NotInitialized,

    #[error("simulated read failure")]
    Simulated,
}

/// A blocking source of readings.
pub trait SensorSource {
    /// Probe the device. Called once before the first read.
    fn init(&mut self) -> Result<(), SensorInitError>;

    /// Take one reading. Bounded-time and blocking.
    fn read(&mut self) -> Result<SensorReading, SensorReadError>;

    /// Short human-readable name for logs.
    fn describe(&self) -> String;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn init(&mut self) -> Result<(), SensorInitError> {
        (**self).init()
    }

    fn read(&mut self) -> Result<SensorReading, SensorReadError> {
        (**self).read()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ---------------------------------------------------------------------------
// Simulated sensor
// ---------------------------------------------------------------------------

/// Replays a list of temperatures, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    temps: Vec<f64>,
    humidity_pct: Option<f64>,
    failing_reads: Vec<usize>,
    present: bool,
    initialized: bool,
    reads: usize,
}

impl SimulatedSensor {
    /// Replay `temps` with a fixed humidity.
    pub fn new(temps: Vec<f64>, humidity_pct: Option<f64>) -> Self {
        Self {
            temps,
            humidity_pct,
            failing_reads: Vec::new(),
            present: true,
            initialized: false,
            reads: 0,
        }
    }

    /// A sensor that never answers the init probe.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new(Vec::new(), None)
        }
    }

    /// Fail the reads at these zero-based positions.
    pub fn with_failures(mut self, reads: impl IntoIterator<Item = usize>) -> Self {
        self.failing_reads.extend(reads);
        self
    }

    /// Number of read attempts so far, failed ones included.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl SensorSource for SimulatedSensor {
    fn init(&mut self) -> Result<(), SensorInitError> {
        if !self.present {
            return Err(SensorInitError::NotResponding(SensorReadError::Simulated));
        }
        if self.temps.is_empty() {
            return Err(SensorInitError::Misconfigured(
                "simulated sensor needs at least one temperature".to_string(),
            ));
        }
        self.initialized = true;
        Ok(())
    }

    fn read(&mut self) -> Result<SensorReading, SensorReadError> {
        if !self.initialized {
            return Err(SensorReadError::NotInitialized);
        }
        let n = self.reads;
        self.reads += 1;
        if self.failing_reads.contains(&n) {
            return Err(SensorReadError::Simulated);
        }

        Ok(SensorReading {
            temp_c: self.temps[n % self.temps.len()],
            humidity_pct: self.humidity_pct,
        })
    }

    fn describe(&self) -> String {
        format!("simulated sensor ({} sample(s))", self.temps.len())
    }
}
