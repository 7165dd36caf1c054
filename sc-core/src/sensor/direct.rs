//! Direct DHT driver
//!
//! Talks to the sensor's single data line from user space:
//!
//! 1. Host drives the line low for the model's start pulse, then releases it.
//! 2. Sensor answers with ~80 us low, ~80 us high.
//! 3. Sensor sends 40 bits, each a ~50 us low followed by a ~27 us (0) or
//!    ~70 us (1) high.
//!
//! User-space timing is not real-time, so frames are regularly lost or
//! corrupted. Those outcomes are reported as retriable.

use std::thread;
use std::time::{Duration, Instant};

use super::dht::{decode_frame, decode_pulses};
use super::{Sample, SensorBackend};
use crate::config::SensorModel;
use crate::constants::dht;
use crate::error::SensorError;

/// A GPIO line that can drive low or float with a pull-up
pub trait DhtLine: Send {
    fn drive_low(&mut self) -> Result<(), SensorError>;

    /// Switch to input with pull-up
    fn release(&mut self) -> Result<(), SensorError>;

    fn is_high(&mut self) -> bool;
}

pub struct DirectSensor<L: DhtLine> {
    model: SensorModel,
    line: L,
    last_success: Option<(Instant, Sample)>,
}

impl<L: DhtLine> DirectSensor<L> {
    pub fn new(model: SensorModel, line: L) -> Self {
        Self { model, line, last_success: None }
    }

    fn start_pulse(&self) -> Duration {
        match self.model {
            SensorModel::Dht11 => dht::START_PULSE_DHT11,
            SensorModel::Dht21 | SensorModel::Dht22 => dht::START_PULSE_DHT22,
        }
    }

    fn min_interval(&self) -> Duration {
        match self.model {
            SensorModel::Dht11 => dht::MIN_INTERVAL_DHT11,
            SensorModel::Dht21 | SensorModel::Dht22 => dht::MIN_INTERVAL_DHT22,
        }
    }

    /// Record the width of each high level until a full frame or the timeout
    fn capture_high_pulses(&mut self) -> Vec<Duration> {
        let mut highs = Vec::with_capacity(dht::FRAME_HIGH_PULSES);
        let start = Instant::now();
        let mut level = self.line.is_high();
        let mut since = start;

        while highs.len() < dht::FRAME_HIGH_PULSES && start.elapsed() < dht::FRAME_TIMEOUT {
            let now_high = self.line.is_high();
            if now_high != level {
                let now = Instant::now();
                if level {
                    highs.push(now - since);
                }
                level = now_high;
                since = now;
            }
        }
        highs
    }

    fn measure(&mut self) -> Result<Sample, SensorError> {
        self.line.drive_low()?;
        thread::sleep(self.start_pulse());
        self.line.release()?;

        let highs = self.capture_high_pulses();
        if highs.len() <= 1 {
            // Only the pull-up after release: nobody answered
            return Err(SensorError::unavailable(format!(
                "{} sensor not found, check wiring",
                self.model
            )));
        }
        let frame = decode_pulses(&highs)?;
        decode_frame(self.model, &frame)
    }

    /// Read with `started` as the time the measurement begins. The cache is
    /// stamped with the start so tick-spaced reads always measure.
    fn read_at(&mut self, started: Instant) -> Result<Sample, SensorError> {
        if let Some((at, sample)) = self.last_success {
            if started.saturating_duration_since(at) < self.min_interval() {
                return Ok(sample);
            }
        }
        let sample = self.measure()?;
        self.last_success = Some((started, sample));
        Ok(sample)
    }
}

impl<L: DhtLine> SensorBackend for DirectSensor<L> {
    fn name(&self) -> &'static str {
        "direct"
    }

    /// One physical read, or the cached reading while the sensor is resting
    fn read(&mut self) -> Result<Sample, SensorError> {
        self.read_at(Instant::now())
    }

    fn release(&mut self) {
        let _ = self.line.release();
    }
}
