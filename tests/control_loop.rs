// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

use std::fs;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use thermofan::actuator::{MEMORY_HISTORY_LEN, MemoryOutput};
use thermofan::config::{ActuatorConfig, SensorConfig};
use thermofan::control::{ControlLoop, CycleError, CycleReport, LoopState};
use thermofan::curve::{CurveTable, DEFAULT_CURVE_CSV, LoadSummary};
use thermofan::hwmon::{HwmonPwm, HwmonSensor};
use thermofan::report::{LogReporter, Reporter};
use thermofan::sensor::SimulatedSensor;

#[derive(Default)]
struct Recorder {
    reports: Vec<CycleReport>,
    failures: Vec<u64>,
}

impl Reporter for Recorder {
    fn curve_loaded(&mut self, _table: &CurveTable, _summary: &LoadSummary) {}

    fn cycle(&mut self, report: &CycleReport) {
        self.reports.push(*report);
    }

    fn cycle_failed(&mut self, cycle: u64, _err: &CycleError) {
        self.failures.push(cycle);
    }
}

fn table() -> CurveTable {
    CurveTable::parse(DEFAULT_CURVE_CSV).unwrap().0
}

#[test]
fn reference_temperatures_drive_expected_commands() {
    let temps = vec![25.0, 35.0, 45.0, 95.0, 90.0];
    let mut ctl = ControlLoop::new(
        SimulatedSensor::new(temps, Some(50.0)),
        MemoryOutput::new(1000),
        Duration::ZERO,
    );
    ctl.start(table()).unwrap();

    let mut recorder = Recorder::default();
    let never = AtomicBool::new(false);
    let summary = ctl.run(&mut recorder, &never, Some(5)).unwrap();

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed, 0);
    let duties: Vec<f64> = recorder.reports.iter().map(|r| r.duty).collect();
    assert_eq!(duties[0], 0.0);
    assert!((duties[1] - 0.10).abs() < 1e-9);
    assert!((duties[2] - 0.275).abs() < 1e-9);
    assert_eq!(duties[3], 1.0);
    assert_eq!(duties[4], 1.0);
    let written = ctl.driver().output().recent();
    assert_eq!(written[0], 0);
    assert_eq!(written[3], 1000);
}

#[test]
fn failed_reads_are_skipped_and_the_loop_continues() {
    let mut ctl = ControlLoop::new(
        SimulatedSensor::new(vec![70.0], None).with_failures([1, 2]),
        MemoryOutput::default(),
        Duration::ZERO,
    );
    ctl.start(table()).unwrap();

    let mut recorder = Recorder::default();
    let summary = ctl
        .run(&mut recorder, &AtomicBool::new(false), Some(4))
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(recorder.failures, vec![2, 3]);
    assert_eq!(ctl.driver().output().writes(), 2);
    assert_eq!(ctl.cycles(), 4);
}

#[test]
fn shutdown_flag_stops_before_first_cycle() {
    let mut ctl = ControlLoop::new(
        SimulatedSensor::new(vec![40.0], None),
        MemoryOutput::default(),
        Duration::from_secs(60),
    );
    ctl.start(table()).unwrap();

    let summary = ctl
        .run(&mut Recorder::default(), &AtomicBool::new(true), None)
        .unwrap();
    assert_eq!(summary.completed + summary.failed, 0);
}

#[test]
fn long_dry_run_keeps_bounded_history() {
    let mut ctl = ControlLoop::new(
        SimulatedSensor::new(vec![25.0, 45.0, 95.0], None),
        MemoryOutput::default(),
        Duration::ZERO,
    );
    ctl.start(table()).unwrap();

    let summary = ctl
        .run(&mut LogReporter, &AtomicBool::new(false), Some(50_000))
        .unwrap();

    assert_eq!(summary.completed, 50_000);
    let output = ctl.driver().output();
    assert_eq!(output.writes(), 50_000);
    assert_eq!(output.recent().len(), MEMORY_HISTORY_LEN);
    // 50_000 cycles over three samples ends on the second one (45 C).
    assert_eq!(output.value(), Some(70));
}

#[test]
fn delay_separates_cycles() {
    let mut ctl = ControlLoop::new(
        SimulatedSensor::new(vec![40.0], None),
        MemoryOutput::default(),
        Duration::from_millis(30),
    );
    ctl.start(table()).unwrap();

    let started = Instant::now();
    ctl.run(&mut Recorder::default(), &AtomicBool::new(false), Some(3))
        .unwrap();
    // Two delays between three cycles, none after the last.
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[test]
fn halted_loop_refuses_to_run() {
    let mut ctl = ControlLoop::new(
        SimulatedSensor::absent(),
        MemoryOutput::default(),
        Duration::ZERO,
    );
    assert!(ctl.start(table()).is_err());
    assert_eq!(ctl.state(), LoopState::Halted);
    assert!(matches!(
        ctl.run(&mut Recorder::default(), &AtomicBool::new(false), Some(1)),
        Err(CycleError::NotRunning(LoopState::Halted))
    ));
}

#[test]
fn hwmon_sensor_to_hwmon_pwm() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("hwmon2");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("name"), "hdc3020\n").unwrap();
    fs::write(dir.join("temp1_input"), "60000\n").unwrap();
    fs::write(dir.join("humidity1_input"), "38500\n").unwrap();
    fs::write(dir.join("pwm1"), "0\n").unwrap();
    fs::write(dir.join("pwm1_enable"), "2\n").unwrap();

    let sensor = HwmonSensor::from_device(root.path(), "hdc3020").unwrap();
    let output = HwmonPwm::new(dir.join("pwm1"), None, true);
    let mut ctl = ControlLoop::new(sensor, output, Duration::ZERO);
    ctl.start(table()).unwrap();

    let report = ctl.run_cycle().unwrap();
    assert_eq!(report.reading.humidity_pct, Some(38.5));
    assert_eq!(report.command, 127);
    assert_eq!(fs::read_to_string(dir.join("pwm1")).unwrap(), "127");
    assert_eq!(fs::read_to_string(dir.join("pwm1_enable")).unwrap(), "1");

    // Sensor disappears mid-run: the cycle fails and the output is untouched.
    fs::remove_file(dir.join("temp1_input")).unwrap();
    assert!(matches!(ctl.run_cycle(), Err(CycleError::Sensor(_))));
    assert_eq!(fs::read_to_string(dir.join("pwm1")).unwrap(), "127");

    ctl.shutdown().unwrap();
    assert_eq!(fs::read_to_string(dir.join("pwm1_enable")).unwrap(), "2");
}

#[test]
fn boxed_sources_from_config() {
    let sensor = SensorConfig::Simulated {
        temps: vec![55.0],
        humidity_pct: None,
    }
    .build()
    .unwrap();
    let output = ActuatorConfig::Memory { resolution: 100 }.build();
    let mut ctl = ControlLoop::new(sensor, output, Duration::ZERO);
    ctl.start(table()).unwrap();

    let report = ctl.run_cycle().unwrap();
    assert!((report.duty - 0.425).abs() < 1e-9);
    assert_eq!(report.command, 42);
}
