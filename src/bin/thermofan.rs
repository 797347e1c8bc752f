// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! thermofan: samples the sensor, maps temperature through the calibration
//! curve and drives the fan PWM until interrupted.

use anyhow::Context;
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use thermofan::config::{self, ActuatorConfig, Config, ReportFormat, SensorConfig};
use thermofan::control::ControlLoop;
use thermofan::report::{self, JsonReporter, LogReporter, Reporter};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "thermofan", about = "Temperature-driven fan controller")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the calibration curve file.
    #[arg(long)]
    curve: Option<PathBuf>,

    /// Override the delay between cycles, in milliseconds.
    #[arg(short, long)]
    period_ms: Option<u64>,

    /// Stop after this many cycles.
    #[arg(short = 'n', long)]
    max_cycles: Option<u64>,

    /// Override the report format.
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Replay the self-test temperatures instead of reading hardware, and
    /// keep commands in memory.
    #[arg(long)]
    simulate: bool,

    /// Print the curve and self-test, then exit.
    #[arg(long)]
    check: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = config::resolve_config_path(Some(&cli.config));
    let mut cfg = config::load_config(&config_path).unwrap_or_else(|e| {
        log::warn!("Could not load config: {e}, using defaults");
        Config::default()
    });
    apply_overrides(&mut cfg, &cli);

    if cli.write_config {
        config::save_config(&config_path, &cfg).context("failed to write configuration")?;
        return Ok(());
    }

    log::info!("=== thermofan ===");

    let (table, summary) = cfg.curve.load().context("failed to load fan curve")?;

    if cli.check {
        print!("{}", report::render_curve(&table));
        print!("{}", report::render_self_test(&table, &report::SELF_TEST_TEMPS));
        return Ok(());
    }

    let mut reporter: Box<dyn Reporter> = match cfg.report.format {
        ReportFormat::Log => Box::new(LogReporter),
        ReportFormat::Json => Box::new(JsonReporter::new(std::io::stdout())),
    };
    reporter.curve_loaded(&table, &summary);

    let sensor = cfg.sensor.build().context("failed to set up sensor")?;
    let output = cfg.actuator.build();
    let mut ctl = ControlLoop::new(sensor, output, cfg.control.period());

    ctl.start(table)
        .context("sensor not detected, check wiring and that its driver is loaded")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .with_context(|| format!("failed to register handler for signal {signal}"))?;
    }

    log::info!(
        "Starting temperature monitoring every {} ms",
        cfg.control.period_ms
    );
    let totals = ctl.run(reporter.as_mut(), &shutdown, cfg.control.max_cycles)?;

    if let Err(e) = ctl.shutdown() {
        log::error!("Failed to release fan output: {e}");
    }
    log::info!(
        "Stopped after {} cycle(s), {} skipped",
        totals.completed + totals.failed,
        totals.failed
    );
    Ok(())
}

fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(path) = &cli.curve {
        cfg.curve.file = Some(path.clone());
    }
    if let Some(period_ms) = cli.period_ms {
        cfg.control.period_ms = period_ms;
    }
    if cli.max_cycles.is_some() {
        cfg.control.max_cycles = cli.max_cycles;
    }
    if let Some(format) = cli.format {
        cfg.report.format = format;
    }
    if cli.simulate {
        cfg.sensor = SensorConfig::Simulated {
            temps: report::SELF_TEST_TEMPS.to_vec(),
            humidity_pct: Some(45.0),
        };
        cfg.actuator = ActuatorConfig::default();
    }
}
