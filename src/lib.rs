// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! thermofan: a temperature-driven fan controller.
//!
//! A sensor is sampled on a fixed period, the temperature is mapped to a
//! duty cycle through a piecewise-linear calibration curve, and the result
//! is written to a PWM output.
//!
//! ```text
//!   CSV text ──▶ CurveTable ──▶ interpolate ──▶ ActuatorDriver ──▶ PWM
//!                                   ▲
//!                  SensorSource ────┘   (ControlLoop, once per period)
//! ```

pub mod actuator;
pub mod config;
pub mod control;
pub mod curve;
pub mod hwmon;
pub mod interpolate;
pub mod report;
pub mod sensor;
