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

//! Hardware session
//!
//! Owns the sensor and the fan output for one configuration. Both are torn
//! down together (fan stopped first, then sensor released) before being
//! recreated for a new configuration.
//!
//! Every call here may block on GPIO or sysfs and must run off the async
//! executor.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use sc_core::constants::pwm::FREQUENCY_HZ;
use sc_core::pins::resolve_pin;
use sc_core::{
    ChamberConfig, ChamberError, Hardware, OverlaySensor, PwmChannel, Result, Sample,
    SensorBackendKind, SensorError, SensorReader,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Reinitializing,
    Stopped,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Active => "active",
            SessionState::Reinitializing => "reinitializing",
            SessionState::Stopped => "stopped",
        }
    }

    fn can_become(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Uninitialized, Active)
                | (Active, Reinitializing)
                | (Reinitializing, Active)
                | (Active, Stopped)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct HardwareSession {
    hardware: Arc<dyn Hardware>,
    state: SessionState,
    config: ChamberConfig,
    sensor: Option<SensorReader>,
    fan: Option<Box<dyn PwmChannel>>,
}

impl HardwareSession {
    pub fn new(hardware: Arc<dyn Hardware>) -> Self {
        Self {
            hardware,
            state: SessionState::Uninitialized,
            config: ChamberConfig::default(),
            sensor: None,
            fan: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ChamberConfig {
        &self.config
    }

    /// Whether a fan output is currently running
    pub fn has_fan(&self) -> bool {
        self.fan.is_some()
    }

    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_become(next) {
            return Err(ChamberError::InvalidState { from: self.state.name(), to: next.name() });
        }
        debug!(from = self.state.name(), to = next.name(), "Session transition");
        self.state = next;
        Ok(())
    }

    /// Acquire hardware for the first configuration
    pub fn setup(&mut self, config: ChamberConfig) -> Result<()> {
        self.transition(SessionState::Active)?;
        self.acquire(config);
        Ok(())
    }

    /// Swap to a new configuration, recreating sensor and fan output
    pub fn reinitialize(&mut self, config: ChamberConfig) -> Result<()> {
        self.transition(SessionState::Reinitializing)?;
        self.teardown();
        self.acquire(config);
        self.transition(SessionState::Active)
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.transition(SessionState::Stopped)?;
        self.teardown();
        info!("Hardware session stopped");
        Ok(())
    }

    /// One sample with the reader's retry budget
    pub fn read_sample(&mut self) -> Result<Sample> {
        let sensor = self
            .sensor
            .as_mut()
            .ok_or_else(|| SensorError::unavailable("sensor backend could not be opened"))?;
        Ok(sensor.read()?)
    }

    /// Write a duty cycle. Without a fan output this does nothing.
    pub fn set_duty(&mut self, percent: u8) -> Result<()> {
        match self.fan.as_mut() {
            Some(fan) => fan.set_duty(percent),
            None => {
                debug!(percent, "No fan output, duty cycle not applied");
                Ok(())
            }
        }
    }

    fn acquire(&mut self, config: ChamberConfig) {
        self.sensor = match self.open_sensor(&config) {
            Ok(reader) => {
                info!(backend = reader.backend_name(), model = %config.sensor_type, "Sensor ready");
                Some(reader)
            }
            Err(e) => {
                error!("Could not open {} sensor: {}", config.dht_driver, e);
                None
            }
        };

        self.fan = if config.fan_enabled {
            match self.open_fan(&config) {
                Ok(fan) => {
                    info!(header_pin = config.fan_pin, line = fan.line(), "Fan output started");
                    Some(fan)
                }
                Err(e) => {
                    error!("Could not start fan output: {}", e);
                    None
                }
            }
        } else {
            info!("Fan disabled, output not started");
            None
        };

        self.config = config;
    }

    fn open_sensor(&self, config: &ChamberConfig) -> Result<SensorReader> {
        match config.dht_driver {
            SensorBackendKind::Overlay => {
                let overlay = OverlaySensor::discover(self.hardware.platform_devices_root());
                if overlay.device().is_none() {
                    warn!("No sensor detected by Device Tree Overlay yet");
                }
                Ok(SensorReader::new(Box::new(overlay)))
            }
            SensorBackendKind::Direct => {
                let mut backend =
                    self.hardware.open_direct_sensor(config.sensor_type, config.sensor_pin)?;
                // Probe once so wiring problems show up at startup
                match backend.read() {
                    Ok(sample) => {
                        debug!(temperature = sample.temperature, "Sensor probe succeeded")
                    }
                    Err(e) if e.is_retriable() => debug!("Sensor probe: {}", e),
                    Err(e) => error!("Sensor probe failed: {}", e),
                }
                Ok(SensorReader::new(backend))
            }
        }
    }

    fn open_fan(&self, config: &ChamberConfig) -> Result<Box<dyn PwmChannel>> {
        let line = resolve_pin(config.fan_pin, self.hardware.numbering())?;
        self.hardware.open_pwm(line, FREQUENCY_HZ)
    }

    #[cfg(test)]
    pub(crate) fn replace_fan(&mut self, fan: Box<dyn PwmChannel>) {
        self.fan = Some(fan);
    }

    fn teardown(&mut self) {
        if let Some(mut fan) = self.fan.take() {
            if let Err(e) = fan.stop() {
                warn!(line = fan.line(), "Failed to stop fan output: {}", e);
            }
        }
        if let Some(mut sensor) = self.sensor.take() {
            sensor.release();
        }
    }
}

impl Drop for HardwareSession {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Active | SessionState::Reinitializing) {
            self.teardown();
        }
    }
}
