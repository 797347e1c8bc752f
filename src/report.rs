// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Diagnostics output for the control loop.
//!
//! A [`Reporter`] receives the loaded curve once and then every cycle
//! outcome. [`LogReporter`] renders human-readable lines through the logger;
//! [`JsonReporter`] writes newline-delimited JSON records.

use crate::control::{CycleError, CycleReport};
use crate::curve::{CalibrationPoint, CurveTable, LoadSummary};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;

/// Temperatures evaluated by the startup self-test.
pub const SELF_TEST_TEMPS: [f64; 8] = [25.0, 35.0, 45.0, 55.0, 65.0, 75.0, 85.0, 95.0];

pub trait Reporter {
    fn curve_loaded(&mut self, table: &CurveTable, summary: &LoadSummary);

    fn cycle(&mut self, report: &CycleReport);

    fn cycle_failed(&mut self, cycle: u64, err: &CycleError);
}

// ---------------------------------------------------------------------------
// Log reporter
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn curve_loaded(&mut self, table: &CurveTable, summary: &LoadSummary) {
        log::info!(
            "Loaded {} calibration point(s) ({} malformed, {} duplicate, {} over capacity)",
            summary.accepted,
            summary.malformed,
            summary.duplicates,
            summary.truncated
        );
        for line in render_curve(table).lines() {
            log::info!("{line}");
        }
        for line in render_self_test(table, &SELF_TEST_TEMPS).lines() {
            log::info!("{line}");
        }
    }

    fn cycle(&mut self, report: &CycleReport) {
        log::info!("{}", render_cycle(report));
    }

    fn cycle_failed(&mut self, cycle: u64, err: &CycleError) {
        log::warn!("Cycle {cycle} skipped: {err}");
    }
}

// ---------------------------------------------------------------------------
// JSON reporter
// ---------------------------------------------------------------------------

/// One line of JSON output.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Record<'a> {
    #[serde(rename = "curve")]
    Curve {
        points: &'a [CalibrationPoint],
        summary: &'a LoadSummary,
    },

    #[serde(rename = "cycle")]
    Cycle(&'a CycleReport),

    #[serde(rename = "cycle_error")]
    CycleError { cycle: u64, message: String },
}

pub struct JsonReporter<W> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    /// Write records to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, record: &Record<'_>) {
        let line = match encode(record) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to encode report: {e}");
                return;
            }
        };
        if let Err(e) = self.out.write_all(line.as_bytes()).and_then(|()| self.out.flush()) {
            log::error!("Failed to write report: {e}");
        }
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn curve_loaded(&mut self, table: &CurveTable, summary: &LoadSummary) {
        self.emit(&Record::Curve {
            points: table.points(),
            summary,
        });
    }

    fn cycle(&mut self, report: &CycleReport) {
        self.emit(&Record::Cycle(report));
    }

    fn cycle_failed(&mut self, cycle: u64, err: &CycleError) {
        self.emit(&Record::CycleError {
            cycle,
            message: err.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

/// Encode a message as a newline-delimited JSON string.
pub fn encode<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    let mut s = serde_json::to_string(msg)?;
    s.push('\n');
    Ok(s)
}

/// The curve as a two-column table.
pub fn render_curve(table: &CurveTable) -> String {
    let mut out = String::from("Fan Cooling Curve:\nTemp (C)\tFan Speed\n------------------------\n");
    for p in table.points() {
        let _ = writeln!(out, "{:.1}\t\t{:.2}", p.temp_c, p.duty);
    }
    out
}

/// The curve evaluated at each of `temps`.
pub fn render_self_test(table: &CurveTable, temps: &[f64]) -> String {
    let mut out =
        String::from("Testing fan speed interpolation:\nTemp (C)\tFan Speed\n------------------------\n");
    for &t in temps {
        match table.evaluate(t) {
            Ok(duty) => {
                let _ = writeln!(out, "{t:.1}\t\t{duty:.2}");
            }
            Err(e) => {
                let _ = writeln!(out, "{t:.1}\t\t{e}");
            }
        }
    }
    out
}

/// One status line for a cycle.
pub fn render_cycle(report: &CycleReport) -> String {
    let humidity = report
        .reading
        .humidity_pct
        .map(|h| format!("{h:.1} %"))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "Temperature: {:.2} °C\tHumidity: {humidity}\tFan Speed: {:.0} %",
        report.reading.temp_c,
        report.duty * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::default_table;
    use crate::interpolate::EvaluateError;
    use crate::sensor::SensorReading;

    fn report(temp_c: f64, humidity_pct: Option<f64>, duty: f64) -> CycleReport {
        CycleReport {
            cycle: 3,
            reading: SensorReading {
                temp_c,
                humidity_pct,
            },
            duty,
            command: 0,
        }
    }

    #[test]
    fn test_render_cycle() {
        assert_eq!(
            render_cycle(&report(23.456, Some(41.23), 0.12)),
            "Temperature: 23.46 °C\tHumidity: 41.2 %\tFan Speed: 12 %"
        );
        assert!(render_cycle(&report(20.0, None, 0.0)).contains("Humidity: n/a"));
    }

    #[test]
    fn test_render_curve() {
        let text = render_curve(&default_table().unwrap());
        assert!(text.starts_with("Fan Cooling Curve:"));
        assert!(text.contains("30.0\t\t0.00"));
        assert!(text.contains("90.0\t\t1.00"));
        assert_eq!(text.lines().count(), 3 + 7);
    }

    #[test]
    fn test_render_self_test() {
        let text = render_self_test(&default_table().unwrap(), &SELF_TEST_TEMPS);
        assert!(text.contains("25.0\t\t0.00"));
        assert!(text.contains("35.0\t\t0.10"));
        assert!(text.contains("95.0\t\t1.00"));
    }

    #[test]
    fn test_json_reporter_writes_lines() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.cycle(&report(45.0, Some(50.0), 0.275));
        reporter.cycle_failed(4, &CycleError::Evaluate(EvaluateError::InvalidTemperature));

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "cycle");
        assert_eq!(lines[0]["reading"]["temp_c"], 45.0);
        assert_eq!(lines[1]["type"], "cycle_error");
        assert_eq!(lines[1]["cycle"], 4);
    }

    #[test]
    fn test_json_reporter_curve_record() {
        let table = default_table().unwrap();
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.curve_loaded(&table, &LoadSummary::default());
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["type"], "curve");
        assert_eq!(value["points"].as_array().unwrap().len(), 7);
    }
}
