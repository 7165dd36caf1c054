//! Unified error handling for SimpleChamber
//!
//! Two error types live here:
//! - [`SensorError`]: the outcome of a single sensor acquisition attempt.
//!   The reader retries the transient variant and gives up on the others.
//! - [`ChamberError`]: everything else (configuration, GPIO, PWM, I/O).
//!
//! Both use thiserror for Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using ChamberError
pub type Result<T> = std::result::Result<T, ChamberError>;

/// Failure of a single sensor acquisition
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// No driver or endpoint present. The tick simply has no reading.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    /// Timing or read glitch. Worth another attempt.
    #[error("sensor read failed, try again: {0}")]
    Transient(String),

    /// Non-retriable driver fault
    #[error("sensor fault: {0}")]
    HardFault(String),
}

impl SensorError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn hard(msg: impl Into<String>) -> Self {
        Self::HardFault(msg.into())
    }

    /// Whether another attempt within the same tick may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Unified error type for all SimpleChamber operations
#[derive(thiserror::Error, Debug)]
pub enum ChamberError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Pin {pin} cannot be used: {reason}")]
    InvalidPin {
        pin: i32,
        reason: String,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("Failed to write duty cycle {duty}% to fan pin {pin}: {reason}")]
    PwmWrite {
        pin: u8,
        duty: u8,
        reason: String,
    },

    // ============================================================================
    // Runtime Errors
    // ============================================================================
    #[error("Invalid session transition from {from} to {to}")]
    InvalidState {
        from: &'static str,
        to: &'static str,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ChamberError {
    /// Create an invalid configuration value error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid pin error
    pub fn invalid_pin(pin: i32, reason: impl Into<String>) -> Self {
        Self::InvalidPin {
            pin,
            reason: reason.into(),
        }
    }

    /// Create a GPIO error from anything displayable
    pub fn gpio(err: impl std::fmt::Display) -> Self {
        Self::Gpio(err.to_string())
    }

    /// True for the ConfigInvalid class (bad value or unmapped pin)
    pub fn is_config_invalid(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidPin { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retriable() {
        assert!(SensorError::transient("checksum").is_retriable());
        assert!(!SensorError::unavailable("no overlay").is_retriable());
        assert!(!SensorError::hard("gpio busy").is_retriable());
    }

    #[test]
    fn test_sensor_error_display() {
        let e = SensorError::transient("checksum mismatch");
        assert_eq!(e.to_string(), "sensor read failed, try again: checksum mismatch");
    }

    #[test]
    fn test_sensor_error_converts_into_chamber_error() {
        let e: ChamberError = SensorError::hard("boom").into();
        assert!(matches!(e, ChamberError::Sensor(SensorError::HardFault(_))));
        assert!(!e.is_config_invalid());
    }

    #[test]
    fn test_invalid_pin_is_config_invalid() {
        let e = ChamberError::invalid_pin(41, "not a GPIO header position");
        assert!(e.is_config_invalid());
        assert_eq!(e.to_string(), "Pin 41 cannot be used: not a GPIO header position");
    }
}
