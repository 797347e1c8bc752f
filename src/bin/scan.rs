// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! thermofan-scan: lists hwmon devices with their temperature, humidity and
//! PWM channels, to find the paths to put in the thermofan config.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use thermofan::config::DEFAULT_SENSOR_DEVICE;
use thermofan::hwmon::{self, Channel, HwmonDevice};

#[derive(Parser, Debug)]
#[command(name = "thermofan-scan", about = "List hwmon sensors and PWM outputs")]
struct Cli {
    /// hwmon root directory.
    #[arg(long, default_value = hwmon::HWMON_ROOT)]
    root: PathBuf,

    /// Device name to highlight.
    #[arg(short, long, default_value = DEFAULT_SENSOR_DEVICE)]
    device: String,

    /// Print the scan as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let devices: Vec<HwmonDevice> = hwmon::scan(&cli.root)
        .with_context(|| format!("failed to scan {}", cli.root.display()))?
        .into_iter()
        .filter(|d| !d.is_empty())
        .collect();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    println!("=== hwmon scanner ===");
    println!("Scanning {} ...", cli.root.display());

    for device in &devices {
        println!("\n{} ({}) at {}", device.id, device.name, device.path.display());
        if device.name == cli.device {
            println!("  ^ This is the configured sensor!");
        }
        print_channels("temp", &device.temps, "°C");
        print_channels("humidity", &device.humidity, "%");
        for pwm in &device.pwms {
            println!(
                "  pwm{}: {} (enable {})  {}",
                pwm.index,
                fmt_opt(pwm.pwm),
                fmt_opt(pwm.pwm_enable),
                pwm.pwm_path.display()
            );
        }
    }

    if devices.is_empty() {
        println!("\nNo hwmon sensors or fan outputs found!");
        println!("\nCheck your setup:");
        println!("  - the sensor driver is loaded (e.g. `modprobe {}`)", cli.device);
        println!("  - the sensor is wired to the expected bus");
        println!("  - the board's fan controller driver is loaded");
    } else {
        println!("\nFound {} device(s)", devices.len());
        if !devices.iter().any(|d| d.name == cli.device) {
            println!("Configured sensor '{}' was not found", cli.device);
        }
    }

    println!("\nScan complete!");
    Ok(())
}

fn print_channels(kind: &str, channels: &[Channel], unit: &str) {
    for ch in channels {
        let value = ch
            .value
            .map(|v| format!("{v:.1} {unit}"))
            .unwrap_or_else(|| "unreadable".to_string());
        let label = ch
            .label
            .as_deref()
            .map(|l| format!(" [{l}]"))
            .unwrap_or_default();
        println!(
            "  {kind}{}{label}: {value}  {}",
            ch.index,
            ch.input_path.display()
        );
    }
}

fn fmt_opt<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}
