// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Calibration curve definitions and loading.
//!
//! A curve maps temperature readings to a normalized duty cycle (0.0-1.0).
//! Curves are loaded from line-oriented text where each line is
//! `temperature,duty`. Lines that don't parse are skipped, so a curve file
//! can carry a header or comments without breaking the load.

use crate::interpolate::{self, EvaluateError, Segment};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum number of points a table accepts unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 20;

/// The built-in calibration curve.
pub const DEFAULT_CURVE_CSV: &str = "\
# temperature (C), fan speed (0.0-1.0)
30.0,0.00
40.0,0.20
50.0,0.35
60.0,0.50
70.0,0.70
80.0,0.85
90.0,1.00
";

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single knot on a calibration curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CalibrationPoint {
    /// Temperature in degrees Celsius
    pub temp_c: f64,
    /// Duty cycle (0.0-1.0)
    pub duty: f64,
}

impl CalibrationPoint {
    /// A point, unchecked. See [`CurveTable::from_points`] for validation.
    pub fn new(temp_c: f64, duty: f64) -> Self {
        Self { temp_c, duty }
    }

    /// Parse a `temperature,duty` line.
    ///
    /// Returns `None` unless the line holds exactly two numeric fields, the
    /// temperature is finite and the duty lies in `0.0..=1.0`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split(',');
        let temp_c = fields.next()?.trim().parse::<f64>().ok()?;
        let duty = fields.next()?.trim().parse::<f64>().ok()?;
        if fields.next().is_some() {
            return None;
        }

        let point = Self { temp_c, duty };
        point.is_valid().then_some(point)
    }

    fn is_valid(&self) -> bool {
        self.temp_c.is_finite() && (0.0..=1.0).contains(&self.duty)
    }
}

/// Line counts collected while loading a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Points kept in the table.
    pub accepted: usize,
    /// Lines that didn't parse as a valid point.
    pub malformed: usize,
    /// Blank lines and `#` comments.
    pub comments: usize,
    /// Points dropped because an earlier line used the same temperature.
    pub duplicates: usize,
    /// Valid points dropped because the table was full.
    pub truncated: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no valid calibration points in {lines} line(s)")]
    Empty { lines: usize },

    #[error("calibration point {index} is invalid (temp {temp_c}, duty {duty})")]
    InvalidPoint { index: usize, temp_c: f64, duty: f64 },

    #[error("failed to read curve file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A loaded calibration curve.
///
/// Invariants: at least one point, temperatures strictly increasing, at
/// most `capacity` points at load time. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveTable {
    points: Vec<CalibrationPoint>,
}

impl CurveTable {
    /// Load a table from `temperature,duty` lines.
    ///
    /// Malformed lines are skipped. Points beyond `capacity` are dropped in
    /// input order, and a repeated temperature keeps its first occurrence.
    /// The result is sorted by temperature.
    pub fn load<I, S>(lines: I, capacity: usize) -> Result<(Self, LoadSummary), LoadError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = LoadSummary::default();
        let mut points: Vec<CalibrationPoint> = Vec::new();
        let mut total = 0;

        for (idx, line) in lines.into_iter().enumerate() {
            total += 1;
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                summary.comments += 1;
                continue;
            }

            let Some(point) = CalibrationPoint::parse(line) else {
                log::debug!("Skipping malformed calibration line {}: {line:?}", idx + 1);
                summary.malformed += 1;
                continue;
            };

            if points.iter().any(|p| p.temp_c == point.temp_c) {
                log::debug!("Skipping duplicate calibration point at {} C", point.temp_c);
                summary.duplicates += 1;
                continue;
            }

            if points.len() >= capacity {
                summary.truncated += 1;
                continue;
            }

            points.push(point);
        }

        if summary.truncated > 0 {
            log::warn!(
                "Calibration table full at {capacity} point(s), dropped {}",
                summary.truncated
            );
        }
        if points.is_empty() {
            return Err(LoadError::Empty { lines: total });
        }

        summary.accepted = points.len();
        Ok((Self::sorted(points), summary))
    }

    /// Parse a whole text blob with the default capacity.
    pub fn parse(text: &str) -> Result<(Self, LoadSummary), LoadError> {
        Self::load(text.lines(), DEFAULT_CAPACITY)
    }

    /// Load a table from a CSV file on disk.
    pub fn load_file(path: &Path, capacity: usize) -> Result<(Self, LoadSummary), LoadError> {
        let contents = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load(contents.lines(), capacity)
    }

    /// Build a table from points already in memory. Unlike [`load`](Self::load)
    /// an invalid point is an error rather than skipped.
    pub fn from_points(points: Vec<CalibrationPoint>) -> Result<Self, LoadError> {
        if points.is_empty() {
            return Err(LoadError::Empty { lines: 0 });
        }
        if let Some((index, p)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(LoadError::InvalidPoint {
                index,
                temp_c: p.temp_c,
                duty: p.duty,
            });
        }

        let mut unique: Vec<CalibrationPoint> = Vec::with_capacity(points.len());
        for p in points {
            if !unique.iter().any(|u| u.temp_c == p.temp_c) {
                unique.push(p);
            }
        }
        Ok(Self::sorted(unique))
    }

    fn sorted(mut points: Vec<CalibrationPoint>) -> Self {
        points.sort_by(|a, b| a.temp_c.total_cmp(&b.temp_c));
        Self { points }
    }

    /// Number of loaded points.
    pub fn size(&self) -> usize {
        self.points.len()
    }

    /// Points in ascending temperature order.
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Lowest-temperature point.
    pub fn first(&self) -> &CalibrationPoint {
        &self.points[0]
    }

    /// Highest-temperature point.
    pub fn last(&self) -> &CalibrationPoint {
        &self.points[self.points.len() - 1]
    }

    /// The point or pair of points that govern `temp_c`.
    pub fn bracket(&self, temp_c: f64) -> Result<Segment<'_>, EvaluateError> {
        interpolate::locate(&self.points, temp_c)
    }

    /// Duty cycle for `temp_c`. See [`interpolate::evaluate`].
    pub fn evaluate(&self, temp_c: f64) -> Result<f64, EvaluateError> {
        interpolate::evaluate(&self.points, temp_c)
    }
}

/// Whether calibration data is available to the controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Calibration {
    #[default]
    Unloaded,
    Loaded(CurveTable),
}

impl Calibration {
    /// The loaded table, if any.
    pub fn table(&self) -> Option<&CurveTable> {
        match self {
            Self::Unloaded => None,
            Self::Loaded(table) => Some(table),
        }
    }

    /// Whether a table has been loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Evaluate the loaded table. Fails while unloaded.
    pub fn evaluate(&self, temp_c: f64) -> Result<f64, EvaluateError> {
        match self {
            Self::Unloaded => Err(EvaluateError::NoCalibrationData),
            Self::Loaded(table) => table.evaluate(temp_c),
        }
    }
}

/// The built-in curve, parsed.
pub fn default_table() -> Result<CurveTable, LoadError> {
    CurveTable::parse(DEFAULT_CURVE_CSV).map(|(table, _)| table)
}
