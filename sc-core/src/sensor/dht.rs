//! DHT frame decoding
//!
//! A frame is 40 bits, most significant first: humidity (2 bytes),
//! temperature (2 bytes) and a checksum equal to the low byte of the sum of
//! the first four. Bit value is carried by the width of each high pulse.

use std::time::Duration;

use super::Sample;
use crate::config::SensorModel;
use crate::constants::dht::{FRAME_BITS, ONE_BIT_THRESHOLD};
use crate::error::SensorError;

/// Turn measured high pulse widths into frame bytes.
///
/// Leading pulses (host release, sensor response) are skipped; the last
/// 40 pulses are the data bits.
pub fn decode_pulses(highs: &[Duration]) -> Result<[u8; 5], SensorError> {
    if highs.len() < FRAME_BITS {
        return Err(SensorError::transient(format!(
            "a full buffer was not returned ({} of {} bits)",
            highs.len(),
            FRAME_BITS
        )));
    }
    let bits = &highs[highs.len() - FRAME_BITS..];
    let mut frame = [0u8; 5];
    for (i, width) in bits.iter().enumerate() {
        if *width > ONE_BIT_THRESHOLD {
            frame[i / 8] |= 0x80 >> (i % 8);
        }
    }
    Ok(frame)
}

pub fn verify_checksum(frame: &[u8; 5]) -> Result<(), SensorError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum == frame[4] {
        Ok(())
    } else {
        Err(SensorError::transient(format!(
            "checksum did not validate (computed {:#04x}, received {:#04x})",
            sum, frame[4]
        )))
    }
}

fn plausible_range(model: SensorModel) -> (f64, f64) {
    match model {
        SensorModel::Dht11 => (-20.0, 60.0),
        SensorModel::Dht21 | SensorModel::Dht22 => (-40.0, 80.0),
    }
}

/// Convert a checksummed frame into physical units for `model`.
pub fn decode_frame(model: SensorModel, frame: &[u8; 5]) -> Result<Sample, SensorError> {
    verify_checksum(frame)?;

    let (humidity, temperature) = match model {
        SensorModel::Dht11 => {
            let humidity = f64::from(frame[0]) + f64::from(frame[1]) / 10.0;
            let mut temperature = f64::from(frame[2]) + f64::from(frame[3] & 0x0F) / 10.0;
            if frame[3] & 0x80 != 0 {
                temperature = -temperature;
            }
            (humidity, temperature)
        }
        SensorModel::Dht21 | SensorModel::Dht22 => {
            let humidity = f64::from((u16::from(frame[0]) << 8) | u16::from(frame[1])) / 10.0;
            let magnitude = (u16::from(frame[2] & 0x7F) << 8) | u16::from(frame[3]);
            let mut temperature = f64::from(magnitude) / 10.0;
            if frame[2] & 0x80 != 0 {
                temperature = -temperature;
            }
            (humidity, temperature)
        }
    };

    let (low, high) = plausible_range(model);
    if !(low..=high).contains(&temperature) || !(0.0..=100.0).contains(&humidity) {
        return Err(SensorError::transient(format!(
            "received implausible data (T={:.1} H={:.1})",
            temperature, humidity
        )));
    }

    Ok(Sample { temperature, humidity: Some(humidity) })
}
