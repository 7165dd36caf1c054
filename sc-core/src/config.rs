//! Chamber configuration
//!
//! A flat JSON document, read-only to the control loop. Every key is
//! optional; missing keys take the defaults below.
//!
//! ```json
//! {
//!   "fan_enabled": true,
//!   "max_temp": 30,
//!   "sensor_type": 22,
//!   "sensor_pin": 23,
//!   "fan_pin": 19,
//!   "dht_driver": "dtoverlay"
//! }
//! ```

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{defaults, paths};
use crate::error::{ChamberError, Result};

/// Supported DHT sensor models
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SensorModel {
    Dht11,
    Dht21,
    Dht22,
}

impl SensorModel {
    pub fn number(self) -> u8 {
        match self {
            Self::Dht11 => 11,
            Self::Dht21 => 21,
            Self::Dht22 => 22,
        }
    }
}

impl TryFrom<u8> for SensorModel {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            11 => Ok(Self::Dht11),
            21 => Ok(Self::Dht21),
            22 => Ok(Self::Dht22),
            other => Err(format!("unsupported sensor type {} (expected 11, 21 or 22)", other)),
        }
    }
}

impl From<SensorModel> for u8 {
    fn from(model: SensorModel) -> Self {
        model.number()
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DHT{}", self.number())
    }
}

/// Acquisition path for the sensor
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorBackendKind {
    /// Kernel device-tree overlay exposing IIO files
    #[serde(rename = "dtoverlay", alias = "overlay")]
    Overlay,
    /// Timing-based driver talking to the data line directly
    #[serde(rename = "adafruit_dht", alias = "direct")]
    Direct,
}

impl fmt::Display for SensorBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlay => f.write_str("dtoverlay"),
            Self::Direct => f.write_str("direct"),
        }
    }
}

fn default_fan_enabled() -> bool {
    defaults::FAN_ENABLED
}

fn default_max_temp() -> f64 {
    defaults::MAX_TEMP_CELSIUS
}

fn default_sensor_pin() -> u8 {
    defaults::SENSOR_PIN
}

fn default_fan_pin() -> i32 {
    defaults::FAN_PIN
}

fn default_settings_version() -> u32 {
    defaults::SETTINGS_VERSION
}

fn default_sensor_type() -> SensorModel {
    SensorModel::Dht22
}

fn default_dht_driver() -> SensorBackendKind {
    SensorBackendKind::Overlay
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChamberConfig {
    #[serde(default = "default_settings_version")]
    pub settings_version: u32,
    #[serde(default = "default_fan_enabled")]
    pub fan_enabled: bool,
    /// Chamber setpoint in °C
    #[serde(default = "default_max_temp")]
    pub max_temp: f64,
    #[serde(default = "default_sensor_type")]
    pub sensor_type: SensorModel,
    /// Native (BCM) line of the sensor data pin
    #[serde(default = "default_sensor_pin")]
    pub sensor_pin: u8,
    /// Header position of the fan PWM pin
    #[serde(default = "default_fan_pin")]
    pub fan_pin: i32,
    #[serde(default = "default_dht_driver")]
    pub dht_driver: SensorBackendKind,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            settings_version: default_settings_version(),
            fan_enabled: default_fan_enabled(),
            max_temp: default_max_temp(),
            sensor_type: default_sensor_type(),
            sensor_pin: default_sensor_pin(),
            fan_pin: default_fan_pin(),
            dht_driver: default_dht_driver(),
        }
    }
}

/// What identifies the physical sensor. Readings from a different identity
/// are not comparable with the last good one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SensorIdentity {
    pub backend: SensorBackendKind,
    pub model: SensorModel,
    pub pin: u8,
}

impl ChamberConfig {
    pub fn sensor_identity(&self) -> SensorIdentity {
        SensorIdentity {
            backend: self.dht_driver,
            model: self.sensor_type,
            pin: self.sensor_pin,
        }
    }
}

/// Configuration file location: `$SIMPLECHAMBER_CONFIG`, else the system path
pub fn config_path() -> PathBuf {
    match env::var(paths::CONFIG_ENV) {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from(paths::SYSTEM_CONFIG),
    }
}

pub fn validate_config(cfg: &ChamberConfig) -> Result<()> {
    if cfg.settings_version != defaults::SETTINGS_VERSION {
        return Err(ChamberError::invalid_config(
            "settings_version",
            format!(
                "unsupported version {} (expected {})",
                cfg.settings_version,
                defaults::SETTINGS_VERSION
            ),
        ));
    }
    if !cfg.max_temp.is_finite() {
        return Err(ChamberError::invalid_config("max_temp", "must be a finite number"));
    }
    if !(defaults::MIN_SETPOINT_CELSIUS..=defaults::MAX_SETPOINT_CELSIUS).contains(&cfg.max_temp) {
        return Err(ChamberError::invalid_config(
            "max_temp",
            format!(
                "{:.1}°C outside {:.0}..={:.0}°C",
                cfg.max_temp,
                defaults::MIN_SETPOINT_CELSIUS,
                defaults::MAX_SETPOINT_CELSIUS
            ),
        ));
    }
    if !(1..=40).contains(&cfg.fan_pin) {
        return Err(ChamberError::invalid_config(
            "fan_pin",
            format!("header position {} outside 1..=40", cfg.fan_pin),
        ));
    }
    if cfg.sensor_pin > defaults::MAX_BCM_LINE {
        return Err(ChamberError::invalid_config(
            "sensor_pin",
            format!("GPIO line {} above {}", cfg.sensor_pin, defaults::MAX_BCM_LINE),
        ));
    }
    Ok(())
}

pub fn parse_config(data: &str) -> Result<ChamberConfig> {
    let cfg: ChamberConfig = serde_json::from_str(data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load and validate the configuration at `path`.
///
/// A missing file yields the defaults; an unreadable or invalid file is an error.
pub fn load_config(path: &Path) -> Result<ChamberConfig> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No configuration at {}, using defaults", path.display());
            return Ok(ChamberConfig::default());
        }
        Err(e) => {
            return Err(ChamberError::FileRead { path: path.to_path_buf(), source: e });
        }
    };
    debug!("Loaded {} bytes of configuration from {}", data.len(), path.display());
    parse_config(&data)
}

/// Re-read the configuration of a running chamber.
///
/// Unlike [`load_config`] a missing file is an error, so that deleting the
/// file never silently resets a running chamber to the defaults.
pub fn reload_config(path: &Path) -> Result<ChamberConfig> {
    let data = fs::read_to_string(path)
        .map_err(|e| ChamberError::FileRead { path: path.to_path_buf(), source: e })?;
    parse_config(&data)
}
