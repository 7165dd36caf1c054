//! Chamber sensor acquisition
//!
//! Two interchangeable backends deliver a [`Sample`]:
//! - [`OverlaySensor`]: reads the IIO files of the kernel DHT overlay.
//! - [`DirectSensor`]: bit-bangs the DHT single-wire protocol.
//!
//! [`SensorReader`] wraps whichever backend the configuration selected and
//! applies the per-tick retry budget.

mod dht;
mod direct;
mod overlay;

pub use dht::{decode_frame, decode_pulses, verify_checksum};
pub use direct::{DhtLine, DirectSensor};
pub use overlay::{find_overlay_device, OverlaySensor};

use tracing::debug;

use crate::constants::timing::SENSOR_ATTEMPTS;
use crate::error::SensorError;

/// One reading. Humidity is informational only.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sample {
    /// °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: Option<f64>,
}

/// A single acquisition strategy
pub trait SensorBackend: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// One acquisition attempt
    fn read(&mut self) -> Result<Sample, SensorError>;

    /// Give the underlying resource back before the backend is dropped
    fn release(&mut self) {}
}

/// Backend plus retry policy
pub struct SensorReader {
    backend: Box<dyn SensorBackend>,
    attempts: u8,
}

impl SensorReader {
    pub fn new(backend: Box<dyn SensorBackend>) -> Self {
        Self { backend, attempts: SENSOR_ATTEMPTS }
    }

    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Read a sample, retrying transient faults within the attempt budget.
    ///
    /// Unavailable and hard faults end the attempt loop immediately.
    pub fn read(&mut self) -> Result<Sample, SensorError> {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.backend.read() {
                Ok(sample) => {
                    debug!(
                        backend = self.backend.name(),
                        attempt,
                        "H={:?} T={:.1}",
                        sample.humidity,
                        sample.temperature
                    );
                    return Ok(sample);
                }
                Err(e) if e.is_retriable() => {
                    debug!(backend = self.backend.name(), attempt, "Sensor reading error: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| SensorError::transient("no attempt made")))
    }

    /// Release the backend. The reader must not be used afterwards.
    pub fn release(&mut self) {
        debug!(backend = self.backend.name(), "Releasing sensor");
        self.backend.release();
    }
}
