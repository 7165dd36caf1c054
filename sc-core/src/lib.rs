//! SimpleChamber Core Library
//!
//! Building blocks for a chamber fan controller: a DHT sensor is sampled,
//! glitches are filtered out and a PI controller turns the distance to the
//! setpoint into a PWM duty cycle.
//!
//! # Module Structure
//!
//! - `config` - JSON configuration and validation
//! - `pins` - 40-pin header to GPIO line translation
//! - `sensor/` - overlay and direct DHT backends, retrying reader
//! - `filter` - negative-jump glitch filter
//! - `controller` - PI law, dead zone, anti-stall kick
//! - `pwm`, `hardware` - output channel and hardware seams
//!
//! # Example
//!
//! ```
//! use sc_core::{ControllerState, FanController};
//!
//! let controller = FanController::default();
//! let mut state = ControllerState::new();
//! let plan = controller.step(Some(32.0), 30.0, &mut state, true).unwrap();
//! assert_eq!(plan.duty, 60);
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod filter;
pub mod hardware;
pub mod pins;
pub mod pwm;
pub mod sensor;

pub use sc_error as error;

pub use config::{
    config_path, load_config, parse_config, reload_config, validate_config, ChamberConfig,
    SensorBackendKind, SensorIdentity, SensorModel,
};
pub use controller::{needs_kick, ControllerState, DutyPlan, FanController};
pub use error::{ChamberError, Result, SensorError};
pub use hardware::Hardware;
pub use pins::{map_pin, resolve_pin, GpioMode};
pub use pwm::PwmChannel;
pub use sensor::{DirectSensor, OverlaySensor, Sample, SensorBackend, SensorReader};
