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

//! Status published by the control loop for the host.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;

use sc_core::ChamberConfig;

/// Key the chamber reading is reported under in the host's temperature map
pub const CHAMBER_SENSOR_KEY: &str = "C";

/// Host temperature map: name to (actual, target)
pub type TemperatureMap = HashMap<String, (f64, Option<f64>)>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChamberStatus {
    /// Last accepted chamber temperature in °C
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub duty_cycle: u8,
    pub fan_enabled: bool,
    pub setpoint: f64,
}

/// Latest status, written by the control loop and read by anyone
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: RwLock<ChamberStatus>,
}

impl StatusBoard {
    pub fn new(config: &ChamberConfig) -> Self {
        let board = Self::default();
        board.reconfigured(config, None);
        board
    }

    pub fn snapshot(&self) -> ChamberStatus {
        self.inner.read().clone()
    }

    pub(crate) fn record(&self, temperature: Option<f64>, humidity: Option<f64>, duty_cycle: u8) {
        let mut status = self.inner.write();
        status.temperature = temperature;
        status.humidity = humidity;
        status.duty_cycle = duty_cycle;
    }

    pub(crate) fn reconfigured(&self, config: &ChamberConfig, temperature: Option<f64>) {
        let mut status = self.inner.write();
        if temperature.is_none() {
            status.humidity = None;
        }
        status.temperature = temperature;
        status.duty_cycle = 0;
        status.fan_enabled = config.fan_enabled;
        status.setpoint = config.max_temp;
    }
}

/// Copy of `temps` with the chamber reading added, once one is known.
/// The entry carries no target.
pub fn inject_temperatures(status: &ChamberStatus, temps: &TemperatureMap) -> TemperatureMap {
    let mut out = temps.clone();
    if let Some(t) = status.temperature {
        out.insert(CHAMBER_SENSOR_KEY.to_string(), (t, None));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_temps() -> TemperatureMap {
        let mut temps = TemperatureMap::new();
        temps.insert("T0".to_string(), (210.0, Some(215.0)));
        temps.insert("B".to_string(), (60.0, Some(60.0)));
        temps
    }

    #[test]
    fn test_inject_adds_chamber_entry() {
        let status = ChamberStatus { temperature: Some(31.5), ..ChamberStatus::default() };
        let temps = host_temps();
        let out = inject_temperatures(&status, &temps);
        assert_eq!(out.len(), 3);
        assert_eq!(out.get("C"), Some(&(31.5, None)));
        assert_eq!(out.get("T0"), Some(&(210.0, Some(215.0))));
        // input untouched
        assert!(!temps.contains_key("C"));
    }

    #[test]
    fn test_inject_without_reading() {
        let status = ChamberStatus::default();
        assert_eq!(inject_temperatures(&status, &host_temps()), host_temps());
    }

    #[test]
    fn test_inject_overrides_stale_entry() {
        let mut temps = host_temps();
        temps.insert("C".to_string(), (0.0, Some(1.0)));
        let status = ChamberStatus { temperature: Some(28.0), ..ChamberStatus::default() };
        assert_eq!(inject_temperatures(&status, &temps).get("C"), Some(&(28.0, None)));
    }

    #[test]
    fn test_board_follows_configuration() {
        let config = ChamberConfig {
            fan_enabled: false,
            max_temp: 35.0,
            ..ChamberConfig::default()
        };
        let board = StatusBoard::new(&config);
        let status = board.snapshot();
        assert!(!status.fan_enabled);
        assert_eq!(status.setpoint, 35.0);
        assert_eq!(status.temperature, None);

        board.record(Some(33.0), Some(41.0), 0);
        board.reconfigured(&ChamberConfig::default(), Some(33.0));
        let status = board.snapshot();
        assert!(status.fan_enabled);
        assert_eq!(status.temperature, Some(33.0));
        assert_eq!(status.humidity, Some(41.0));

        board.reconfigured(&ChamberConfig::default(), None);
        assert_eq!(board.snapshot().humidity, None);
    }

    #[test]
    fn test_status_serializes() {
        let status = ChamberStatus {
            temperature: Some(30.5),
            humidity: None,
            duty_cycle: 22,
            fan_enabled: true,
            setpoint: 30.0,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["duty_cycle"], 22);
        assert_eq!(json["temperature"], 30.5);
        assert!(json["humidity"].is_null());
    }
}
