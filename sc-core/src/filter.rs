//! Temperature glitch filter
//!
//! DHT sensors occasionally report a reading several degrees too low. A
//! chamber heated by a printer does not cool that fast within one sample, so
//! a large negative step is treated as a sensor glitch and the last good
//! reading is kept. Rises are always trusted.

use crate::constants::filter::GLITCH_DROP_CELSIUS;

/// Return the value to keep as the last good temperature.
pub fn accept(candidate: f64, previous: Option<f64>) -> Option<f64> {
    match previous {
        Some(prev) if candidate - prev <= -GLITCH_DROP_CELSIUS => Some(prev),
        _ => Some(candidate),
    }
}
