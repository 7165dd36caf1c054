//! Hardware access
//!
//! [`Hardware`] opens the physical resources a session needs. The Raspberry
//! Pi implementation lives in [`rpi`] behind the `rpi` feature; tests supply
//! their own.

use std::path::PathBuf;

use crate::config::SensorModel;
use crate::constants::paths;
use crate::error::Result;
use crate::pins::GpioMode;
use crate::pwm::PwmChannel;
use crate::sensor::SensorBackend;

pub trait Hardware: Send + Sync {
    /// Numbering the GPIO layer expects for line arguments
    fn numbering(&self) -> GpioMode;

    /// Start a PWM output on `line` at 0 % duty
    fn open_pwm(&self, line: u8, frequency_hz: f64) -> Result<Box<dyn PwmChannel>>;

    /// Open the direct DHT driver on `line`
    fn open_direct_sensor(&self, model: SensorModel, line: u8) -> Result<Box<dyn SensorBackend>>;

    /// Directory searched for the DHT overlay device
    fn platform_devices_root(&self) -> PathBuf {
        PathBuf::from(paths::PLATFORM_DEVICES)
    }
}

#[cfg(feature = "rpi")]
pub mod rpi {
    //! Raspberry Pi GPIO through rppal. rppal addresses lines by BCM number.

    use rppal::gpio::{Bias, Gpio, IoPin, Mode, OutputPin};
    use tracing::debug;

    use super::Hardware;
    use crate::config::SensorModel;
    use crate::error::{ChamberError, Result, SensorError};
    use crate::pins::GpioMode;
    use crate::pwm::{duty_ratio, PwmChannel};
    use crate::sensor::{DhtLine, DirectSensor, SensorBackend};

    pub struct RpiHardware {
        gpio: Gpio,
    }

    impl RpiHardware {
        pub fn new() -> Result<Self> {
            let gpio = Gpio::new().map_err(ChamberError::gpio)?;
            Ok(Self { gpio })
        }
    }

    impl Hardware for RpiHardware {
        fn numbering(&self) -> GpioMode {
            GpioMode::Bcm
        }

        fn open_pwm(&self, line: u8, frequency_hz: f64) -> Result<Box<dyn PwmChannel>> {
            let mut pin = self.gpio.get(line).map_err(ChamberError::gpio)?.into_output_low();
            pin.set_pwm_frequency(frequency_hz, 0.0).map_err(ChamberError::gpio)?;
            debug!(line, frequency_hz, "Software PWM started");
            Ok(Box::new(RpiPwm { pin, line, frequency_hz }))
        }

        fn open_direct_sensor(
            &self,
            model: SensorModel,
            line: u8,
        ) -> Result<Box<dyn SensorBackend>> {
            let mut pin = self.gpio.get(line).map_err(ChamberError::gpio)?.into_io(Mode::Input);
            pin.set_bias(Bias::PullUp);
            Ok(Box::new(DirectSensor::new(model, RpiDhtLine { pin })))
        }
    }

    struct RpiPwm {
        pin: OutputPin,
        line: u8,
        frequency_hz: f64,
    }

    impl PwmChannel for RpiPwm {
        fn line(&self) -> u8 {
            self.line
        }

        fn set_duty(&mut self, percent: u8) -> Result<()> {
            self.pin
                .set_pwm_frequency(self.frequency_hz, duty_ratio(percent))
                .map_err(|e| ChamberError::PwmWrite {
                    pin: self.line,
                    duty: percent,
                    reason: e.to_string(),
                })
        }

        fn stop(&mut self) -> Result<()> {
            self.pin.clear_pwm().map_err(ChamberError::gpio)?;
            self.pin.set_low();
            Ok(())
        }
    }

    struct RpiDhtLine {
        pin: IoPin,
    }

    impl DhtLine for RpiDhtLine {
        fn drive_low(&mut self) -> std::result::Result<(), SensorError> {
            self.pin.set_mode(Mode::Output);
            self.pin.set_low();
            Ok(())
        }

        fn release(&mut self) -> std::result::Result<(), SensorError> {
            self.pin.set_mode(Mode::Input);
            self.pin.set_bias(Bias::PullUp);
            Ok(())
        }

        fn is_high(&mut self) -> bool {
            self.pin.is_high()
        }
    }

}
