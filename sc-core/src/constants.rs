//! Constants and configuration values for SimpleChamber
//!
//! Centralizes the control gains, timing, hardware paths and defaults.
//! Add new magic numbers here rather than inline.

use std::time::Duration;

/// System paths
pub mod paths {
    /// Platform device directory where the DHT overlay registers itself
    pub const PLATFORM_DEVICES: &str = "/sys/devices/platform";

    /// Prefix of the overlay device directory. The dht11 overlay serves
    /// DHT11, DHT21 and DHT22 alike.
    pub const DHT_DEVICE_PREFIX: &str = "dht11";

    /// IIO device directory below the overlay device
    pub const IIO_DEVICE: &str = "iio:device0";

    /// Temperature endpoint (millidegrees Celsius)
    pub const TEMP_INPUT: &str = "in_temp_input";

    /// Relative humidity endpoint (milli-percent)
    pub const HUMIDITY_INPUT: &str = "in_humidityrelative_input";

    /// System configuration file
    pub const SYSTEM_CONFIG: &str = "/etc/simplechamber/config.json";

    /// Environment variable overriding the configuration path
    pub const CONFIG_ENV: &str = "SIMPLECHAMBER_CONFIG";
}

/// PI control law
pub mod control {
    /// Proportional gain
    pub const KP: f64 = 30.0;

    /// Integral gain
    pub const KI: f64 = 0.2;

    /// Anti-windup bound on the integral accumulator (both signs)
    pub const INTEGRAL_LIMIT: f64 = 100.0;

    /// Duty cycles at or below this percentage cannot spin the fan
    pub const DEAD_ZONE_PCT: u8 = 10;

    /// Restarting or slowing below this percentage needs a kick
    pub const KICK_THRESHOLD_PCT: u8 = 50;

    /// Duty applied during the anti-stall kick
    pub const KICK_DUTY_PCT: u8 = 100;

    pub const MAX_DUTY_PCT: u8 = 100;
}

/// Reading filter
pub mod filter {
    /// A drop of this many degrees (or more) between two samples is a glitch
    pub const GLITCH_DROP_CELSIUS: f64 = 2.0;
}

/// Timing values
pub mod timing {
    use super::Duration;

    /// Scheduler period. DHT sensors deliver at most one reading every 1.5-2 s.
    pub const TICK_PERIOD: Duration = Duration::from_secs(2);

    /// Hold time at full power before settling to a low duty
    pub const KICK_HOLD: Duration = Duration::from_millis(500);

    /// Attempts per tick for a sensor read
    pub const SENSOR_ATTEMPTS: u8 = 2;

    /// Consecutive tick failures between repeated error logs
    pub const ERROR_LOG_EVERY: u32 = 10;
}

/// PWM output
pub mod pwm {
    /// Software PWM frequency for the fan line
    pub const FREQUENCY_HZ: f64 = 100.0;
}

/// DHT single-wire protocol
pub mod dht {
    use super::Duration;

    /// Host start signal for DHT11
    pub const START_PULSE_DHT11: Duration = Duration::from_millis(18);

    /// Host start signal for DHT21/DHT22
    pub const START_PULSE_DHT22: Duration = Duration::from_millis(1);

    /// Longest time spent capturing a frame
    pub const FRAME_TIMEOUT: Duration = Duration::from_millis(10);

    /// Data bits in a frame
    pub const FRAME_BITS: usize = 40;

    /// High pulses per frame: release, response, then one per bit
    pub const FRAME_HIGH_PULSES: usize = FRAME_BITS + 2;

    /// High pulses longer than this are a one bit (0 is ~27 us, 1 is ~70 us)
    pub const ONE_BIT_THRESHOLD: Duration = Duration::from_micros(50);

    /// Reads started closer than this to the last successful measurement
    /// return that measurement. Below `timing::TICK_PERIOD`, so every tick
    /// measures.
    pub const MIN_INTERVAL_DHT11: Duration = Duration::from_secs(1);
    pub const MIN_INTERVAL_DHT22: Duration = Duration::from_millis(1500);
}

/// Configuration defaults and validation bounds
pub mod defaults {
    pub const FAN_ENABLED: bool = true;
    pub const MAX_TEMP_CELSIUS: f64 = 30.0;
    pub const SENSOR_PIN: u8 = 23;
    pub const FAN_PIN: i32 = 19;
    pub const SETTINGS_VERSION: u32 = 1;

    pub const MIN_SETPOINT_CELSIUS: f64 = -20.0;
    pub const MAX_SETPOINT_CELSIUS: f64 = 100.0;

    /// Highest BCM line exposed on the 40-pin header
    pub const MAX_BCM_LINE: u8 = 27;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kick_fits_inside_tick() {
        assert!(timing::KICK_HOLD < timing::TICK_PERIOD);
    }

    #[test]
    fn test_sensor_rest_shorter_than_tick() {
        assert!(dht::MIN_INTERVAL_DHT11 < timing::TICK_PERIOD);
        assert!(dht::MIN_INTERVAL_DHT22 < timing::TICK_PERIOD);
    }

    #[test]
    fn test_dead_zone_below_kick_threshold() {
        assert!(control::DEAD_ZONE_PCT < control::KICK_THRESHOLD_PCT);
        assert!(control::KICK_THRESHOLD_PCT < control::KICK_DUTY_PCT);
    }

    #[test]
    fn test_sampling_interval_not_faster_than_sensor() {
        assert!(timing::TICK_PERIOD >= dht::MIN_INTERVAL_DHT22);
    }
}
