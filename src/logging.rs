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

//! Log output setup: systemd journal when present, stdout otherwise.

use std::env;
use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Log filter, e.g. `debug` or `simplechamber=debug,sc_core=info`
pub const LOG_ENV: &str = "CHAMBER_LOG";

const DEFAULT_LEVEL: &str = "info";
const JOURNAL_SOCKET: &str = "/run/systemd/journal/socket";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Journald,
    Stdout,
}

impl LogTarget {
    pub fn describe(self) -> &'static str {
        match self {
            LogTarget::Journald => "systemd journal",
            LogTarget::Stdout => "stdout",
        }
    }
}

/// Filter directive from `CHAMBER_LOG`, `info` when unset or empty
pub fn log_level() -> String {
    match env::var(LOG_ENV) {
        Ok(level) if !level.trim().is_empty() => level,
        _ => DEFAULT_LEVEL.to_string(),
    }
}

/// Install the global subscriber. Must be called once, before any logging.
pub fn init(level: &str) -> LogTarget {
    if Path::new(JOURNAL_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(journald)
                    .with(EnvFilter::new(level))
                    .init();
                return LogTarget::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(EnvFilter::new(level))
        .init();
    LogTarget::Stdout
}
