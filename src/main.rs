/*
 * This file is part of SimpleChamber.
 *
 * Copyright (C) 2025 SimpleChamber contributors
 *
 * SimpleChamber is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * SimpleChamber is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with SimpleChamber. If not, see <https://www.gnu.org/licenses/>.
 */

//! SimpleChamber daemon (chamberd)
//!
//! Regulates the printer chamber fan from a DHT sensor on a Raspberry Pi.
//!
//! # Signals
//! - **SIGINT / SIGTERM**: stop the loop, stop the fan, release the sensor
//! - **SIGHUP**: reload the configuration file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use sc_core::hardware::rpi::RpiHardware;
use sc_core::constants::paths::SYSTEM_CONFIG;
use sc_core::{config_path, load_config, reload_config};
use simplechamber::{logging, Chamber};

const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Options {
    config: Option<PathBuf>,
    check: bool,
}

fn print_help() {
    eprintln!("chamberd {} - chamber fan controller", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    chamberd [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Configuration file");
    eprintln!("                        (default: $SIMPLECHAMBER_CONFIG or {})", SYSTEM_CONFIG);
    eprintln!("        --check         Validate the configuration and exit");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    {}         Log level (trace, debug, info, warn, error)", logging::LOG_ENV);
}

/// `None` when the process should exit after printing help or version
fn parse_args(args: &[String]) -> anyhow::Result<Option<Options>> {
    let mut options = Options { config: None, check: false };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-v" | "--version" => {
                println!("chamberd {}", VERSION);
                return Ok(None);
            }
            "--check" => options.check = true,
            "-c" | "--config" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    bail!("--config requires a path argument");
                };
                options.config = Some(PathBuf::from(path));
            }
            arg => {
                print_help();
                bail!("unknown argument: {}", arg);
            }
        }
        i += 1;
    }
    Ok(Some(options))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(options) = parse_args(&args)? else {
        return Ok(());
    };

    let log_level = logging::log_level();
    let target = logging::init(&log_level);
    info!("STARTUP: chamberd {} starting", VERSION);
    info!("STARTUP: Logging to {} at {}", target.describe(), log_level);

    let path = options.config.unwrap_or_else(config_path);
    let config = load_config(&path).with_context(|| format!("loading {}", path.display()))?;

    if options.check {
        println!("{} is valid", path.display());
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!(
        "STARTUP: setpoint {:.1}C, sensor {} via {} on GPIO{}, fan on header pin {}{}",
        config.max_temp,
        config.sensor_type,
        config.dht_driver,
        config.sensor_pin,
        config.fan_pin,
        if config.fan_enabled { "" } else { " (disabled)" }
    );

    let hardware = RpiHardware::new().context("opening GPIO")?;
    let handle = Chamber::start(Arc::new(hardware), config).await?;

    let stop = Arc::new(Notify::new());
    let stop_signal = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT - initiating shutdown");
        stop_signal.notify_one();
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }
    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = stop.notified() => break,
            _ = terminate.recv() => {
                info!("SIGNAL: Received SIGTERM - initiating shutdown");
                break;
            }
            _ = hangup.recv() => {
                info!("SIGNAL: Configuration reload requested");
                match reload_config(&path) {
                    Ok(config) => {
                        if let Err(e) = handle.request_reload(config).await {
                            error!("Reload rejected: {}", e);
                        }
                    }
                    Err(e) => {
                        warn!("Config reload failed: {} - continuing with existing config", e)
                    }
                }
            }
        }
    }

    handle.shutdown().await?;
    info!("SHUTDOWN: chamberd terminated gracefully");
    Ok(())
}
