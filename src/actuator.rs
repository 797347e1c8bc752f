// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Actuator port and duty-cycle driver.
//!
//! [`ActuatorDriver`] clamps a normalized duty cycle and converts it to the
//! output's native command range. Conversion truncates toward zero, so a
//! duty of 0.5 on an 8-bit PWM is 127, not 128.

use serde::Serialize;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;

/// PWM resolution of a hwmon `pwmN` attribute.
pub const HWMON_PWM_MAX: u32 = 255;

/// Number of recent commands a [`MemoryOutput`] keeps.
pub const MEMORY_HISTORY_LEN: usize = 16;

/// A normalized fan speed, always in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DutyCommand {
    normalized_speed: f64,
}

impl DutyCommand {
    /// Clamp `speed` into range. NaN maps to full speed.
    pub fn new(speed: f64) -> Self {
        let normalized_speed = if speed.is_nan() {
            1.0
        } else {
            speed.clamp(0.0, 1.0)
        };
        Self { normalized_speed }
    }

    /// Speed in `0.0..=1.0`.
    pub fn normalized_speed(&self) -> f64 {
        self.normalized_speed
    }

    /// Scale to `0..=max`, truncating.
    pub fn to_native(&self, max: u32) -> u32 {
        (self.normalized_speed * max as f64) as u32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("failed to write {value} to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        value: u32,
        #[source]
        source: io::Error,
    },

    #[error("actuator rejected command {0}")]
    Rejected(u32),
}

/// Write side of the actuator.
pub trait ActuatorOutput {
    /// Largest native command. A duty of 1.0 maps to this value.
    fn resolution(&self) -> u32;

    /// Write a native command in `0..=resolution()`.
    fn write(&mut self, command: u32) -> Result<(), ActuatorError>;

    /// Hand the output back to whatever controlled it before us.
    fn release(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }

    fn describe(&self) -> String;
}

impl<O: ActuatorOutput + ?Sized> ActuatorOutput for Box<O> {
    fn resolution(&self) -> u32 {
        (**self).resolution()
    }

    fn write(&mut self, command: u32) -> Result<(), ActuatorError> {
        (**self).write(command)
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct ActuatorDriver<O> {
    output: O,
    last_command: Option<u32>,
}

impl<O: ActuatorOutput> ActuatorDriver<O> {
    /// Wrap `output`. Nothing is written until the first [`drive`](Self::drive).
    pub fn new(output: O) -> Self {
        Self {
            output,
            last_command: None,
        }
    }

    /// Native command for `speed`, without writing it.
    pub fn command_for(&self, speed: f64) -> u32 {
        DutyCommand::new(speed).to_native(self.output.resolution())
    }

    /// Clamp, convert and write `speed`. Returns the command written.
    pub fn drive(&mut self, speed: f64) -> Result<u32, ActuatorError> {
        let command = self.command_for(speed);
        self.output.write(command)?;
        self.last_command = Some(command);
        Ok(command)
    }

    /// The last command successfully written.
    pub fn last_command(&self) -> Option<u32> {
        self.last_command
    }

    /// Release the underlying output.
    pub fn release(&mut self) -> Result<(), ActuatorError> {
        self.output.release()
    }

    /// The wrapped output.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Unwrap the output.
    pub fn into_inner(self) -> O {
        self.output
    }
}

// ---------------------------------------------------------------------------
// In-memory output
// ---------------------------------------------------------------------------

/// Records commands instead of touching hardware.
///
/// Only the last [`MEMORY_HISTORY_LEN`] commands are kept, so a dry run can
/// go on indefinitely.
#[derive(Debug, Clone)]
pub struct MemoryOutput {
    resolution: u32,
    recent: VecDeque<u32>,
    writes: u64,
    fail_writes: bool,
    released: bool,
}

impl MemoryOutput {
    /// An output accepting commands in `0..=resolution`.
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            recent: VecDeque::with_capacity(MEMORY_HISTORY_LEN),
            writes: 0,
            fail_writes: false,
            released: false,
        }
    }

    /// Reject every write.
    pub fn failing(resolution: u32) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(resolution)
        }
    }

    /// The last command written.
    pub fn value(&self) -> Option<u32> {
        self.recent.back().copied()
    }

    /// Recent commands, oldest first.
    pub fn recent(&self) -> Vec<u32> {
        self.recent.iter().copied().collect()
    }

    /// Total number of accepted writes.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Whether [`ActuatorOutput::release`] has been called.
    pub fn released(&self) -> bool {
        self.released
    }
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new(HWMON_PWM_MAX)
    }
}

impl ActuatorOutput for MemoryOutput {
    fn resolution(&self) -> u32 {
        self.resolution
    }

    fn write(&mut self, command: u32) -> Result<(), ActuatorError> {
        if self.fail_writes || command > self.resolution {
            return Err(ActuatorError::Rejected(command));
        }
        if self.recent.len() == MEMORY_HISTORY_LEN {
            self.recent.pop_front();
        }
        self.recent.push_back(command);
        self.writes += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.released = true;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-memory output (0-{})", self.resolution)
    }
}
