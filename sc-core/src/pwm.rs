//! Fan PWM output
//!
//! The fan is driven by a PWM line whose duty cycle is in percent. 0 stops
//! the fan, 100 is full speed.

use crate::error::Result;

/// Write-only fan output owned by the hardware session
pub trait PwmChannel: Send {
    /// Native line number, for logs
    fn line(&self) -> u8;

    /// Apply a duty cycle in percent (0..=100)
    fn set_duty(&mut self, percent: u8) -> Result<()>;

    /// Stop the output and leave the line low
    fn stop(&mut self) -> Result<()>;
}

/// Percent to the 0.0..=1.0 ratio used by PWM hardware
pub fn duty_ratio(percent: u8) -> f64 {
    f64::from(percent.min(100)) / 100.0
}
