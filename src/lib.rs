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

//! SimpleChamber - chamber temperature regulated fan control
//!
//! Runtime around `sc-core`: the hardware session, the 2 s control loop and
//! the status handle a host uses to report chamber temperature.

pub mod logging;
pub mod scheduler;
pub mod session;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

pub use scheduler::{apply_plan, Chamber, ChamberHandle, Command};
pub use session::{HardwareSession, SessionState};
pub use telemetry::{
    inject_temperatures, ChamberStatus, StatusBoard, TemperatureMap, CHAMBER_SENSOR_KEY,
};
