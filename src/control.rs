// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! The sense → decide → act loop.
//!
//! A [`ControlLoop`] starts `Uninitialized`. [`ControlLoop::start`] installs
//! the calibration table and probes the sensor; on success the loop is
//! `Running`, on failure it is `Halted` for good. Each cycle reads the
//! sensor, evaluates the curve and drives the output. A failed read skips
//! actuation for that cycle only.
//!
//! Cycles are separated by a fixed delay taken after the cycle's work, so
//! the effective period is the delay plus the time spent in the cycle.

use crate::actuator::{ActuatorDriver, ActuatorError, ActuatorOutput};
use crate::curve::{Calibration, CurveTable};
use crate::interpolate::EvaluateError;
use crate::report::Reporter;
use crate::sensor::{SensorInitError, SensorReadError, SensorReading, SensorSource};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Longest single sleep while waiting out the period, so a shutdown
/// request is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Uninitialized,
    Running,
    /// Startup failed. Terminal.
    Halted,
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number, failed cycles included
    pub cycle: u64,
    pub reading: SensorReading,
    /// Duty cycle from the curve (0.0-1.0)
    pub duty: f64,
    /// Native command written to the output
    pub command: u32,
}

/// Totals for a finished [`ControlLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("sensor initialization failed: {0}")]
    Sensor(#[from] SensorInitError),

    #[error("control loop cannot start from state {0:?}")]
    InvalidState(LoopState),
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("control loop is not running (state {0:?})")]
    NotRunning(LoopState),

    #[error("sensor read failed: {0}")]
    Sensor(#[from] SensorReadError),

    #[error("cannot compute duty cycle: {0}")]
    Evaluate(#[from] EvaluateError),

    #[error("actuator write failed: {0}")]
    Actuator(#[from] ActuatorError),
}

pub struct ControlLoop<S, O> {
    sensor: S,
    driver: ActuatorDriver<O>,
    calibration: Calibration,
    state: LoopState,
    period: Duration,
    cycles: u64,
}

impl<S: SensorSource, O: ActuatorOutput> ControlLoop<S, O> {
    /// A loop in the `Uninitialized` state.
    pub fn new(sensor: S, output: O, period: Duration) -> Self {
        Self {
            sensor,
            driver: ActuatorDriver::new(output),
            calibration: Calibration::Unloaded,
            state: LoopState::Uninitialized,
            period,
            cycles: 0,
        }
    }

    /// Install the curve and probe the sensor. Only valid once, from
    /// `Uninitialized`.
    pub fn start(&mut self, table: CurveTable) -> Result<(), StartupError> {
        if self.state != LoopState::Uninitialized {
            return Err(StartupError::InvalidState(self.state));
        }

        if let Err(e) = self.sensor.init() {
            log::error!("Sensor {} failed to initialize: {e}", self.sensor.describe());
            self.state = LoopState::Halted;
            return Err(e.into());
        }

        log::info!(
            "Sensor {} initialized, driving {} with a {}-point curve",
            self.sensor.describe(),
            self.driver.output().describe(),
            table.size()
        );
        self.calibration = Calibration::Loaded(table);
        self.state = LoopState::Running;
        Ok(())
    }

    /// One sense → decide → act pass. Nothing is written when the read or
    /// the evaluation fails.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        if self.state != LoopState::Running {
            return Err(CycleError::NotRunning(self.state));
        }
        self.cycles += 1;

        let reading = self.sensor.read()?;
        let duty = self.calibration.evaluate(reading.temp_c)?;
        let command = self.driver.drive(duty)?;

        Ok(CycleReport {
            cycle: self.cycles,
            reading,
            duty,
            command,
        })
    }

    /// Run cycles until `shutdown` is set or `max_cycles` have been
    /// attempted. Per-cycle failures are reported and the loop carries on.
    pub fn run<R: Reporter + ?Sized>(
        &mut self,
        reporter: &mut R,
        shutdown: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> Result<LoopSummary, CycleError> {
        if self.state != LoopState::Running {
            return Err(CycleError::NotRunning(self.state));
        }

        let mut summary = LoopSummary::default();
        while !shutdown.load(Ordering::Relaxed) {
            match self.run_cycle() {
                Ok(report) => {
                    summary.completed += 1;
                    reporter.cycle(&report);
                }
                Err(e) => {
                    summary.failed += 1;
                    reporter.cycle_failed(self.cycles, &e);
                }
            }

            if max_cycles.is_some_and(|max| summary.completed + summary.failed >= max) {
                break;
            }
            self.pause(shutdown);
        }

        Ok(summary)
    }

    fn pause(&self, shutdown: &AtomicBool) {
        let mut remaining = self.period;
        while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
            let step = remaining.min(SLEEP_SLICE);
            thread::sleep(step);
            remaining -= step;
        }
    }

    /// Return the output to its previous owner.
    pub fn shutdown(&mut self) -> Result<(), ActuatorError> {
        self.driver.release()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Calibration installed by [`start`](Self::start).
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// The actuator driver and its output.
    pub fn driver(&self) -> &ActuatorDriver<O> {
        &self.driver
    }

    /// The sensor being sampled.
    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// Cycles attempted so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Delay after each cycle.
    pub fn period(&self) -> Duration {
        self.period
    }
}
