//! PI fan controller
//!
//! Maps the distance between chamber temperature and setpoint to a fan duty
//! cycle in percent.
//!
//! # How It Works
//!
//! 1. **PI law**: `duty = Kp * error + Ki * Σerror`, no derivative term.
//!    The accumulator is clamped to ±100 after each update (anti-windup).
//!
//! 2. **Dead zone**: duty cycles of 10 % or less cannot turn the fan and
//!    collapse to 0.
//!
//! 3. **Anti-stall kick**: a fan that is stopped, or already slow and being
//!    slowed further, may stall at a low target. Such transitions are first
//!    driven at 100 % for a short hold before settling.
//!
//! With a setpoint of 30 °C and a fresh accumulator, the temperature trace
//! `11 15 27 30 31 32 33 34 34 34 33 33 33 33 32 31 30 29 30` yields
//! `0 0 0 0 22 53 83 100 100 100 86 87 88 88 59 29 0 0 0`.

use tracing::info;

use crate::constants::control;

/// Controller memory carried across ticks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    /// Last accepted chamber temperature in °C
    pub last_temperature: Option<f64>,
    /// Accumulated error, clamped to ±INTEGRAL_LIMIT
    pub integral: f64,
    /// Duty cycle most recently commanded, 0..=100
    pub last_duty_cycle: u8,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything tied to the output channel. Called when the PWM
    /// channel is recreated, since a fresh channel starts at 0 %.
    pub fn reset_output(&mut self) {
        self.integral = 0.0;
        self.last_duty_cycle = 0;
    }
}

/// How to move the output to a new duty cycle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DutyPlan {
    /// Final duty cycle in percent
    pub duty: u8,
    /// Drive full power for the kick hold before applying `duty`
    pub kick: bool,
}

/// Proportional and integral gains
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FanController {
    kp: f64,
    ki: f64,
}

impl Default for FanController {
    fn default() -> Self {
        Self { kp: control::KP, ki: control::KI }
    }
}

impl FanController {
    /// Run the PI law once, updating the accumulator in place.
    ///
    /// The integral term uses the accumulator before clamping, exactly as
    /// the regression trace in the module docs expects.
    pub fn compute_duty(&self, temperature: f64, setpoint: f64, integral: &mut f64) -> u8 {
        let error = temperature - setpoint;
        *integral += error;
        let proportional = error * self.kp;
        let integral_term = *integral * self.ki;
        *integral = integral.clamp(-control::INTEGRAL_LIMIT, control::INTEGRAL_LIMIT);

        let raw = (proportional + integral_term).clamp(0.0, f64::from(control::MAX_DUTY_PCT));
        let duty = raw.floor() as u8;
        if duty <= control::DEAD_ZONE_PCT {
            0
        } else {
            duty
        }
    }

    /// Advance the controller by one sample.
    ///
    /// Returns `None` without touching `state` when there is no temperature.
    /// A disabled fan is forced to 0 % and the accumulator is cleared so a
    /// later re-enable starts from rest.
    pub fn step(
        &self,
        current_temp: Option<f64>,
        setpoint: f64,
        state: &mut ControllerState,
        enabled: bool,
    ) -> Option<DutyPlan> {
        let temperature = current_temp?;
        let previous = state.last_duty_cycle;

        let duty = if enabled {
            self.compute_duty(temperature, setpoint, &mut state.integral)
        } else {
            state.integral = 0.0;
            0
        };

        if duty != previous {
            info!(
                "Temperature is {:.2}C, target is {:.2}C, fan is now at {}%",
                temperature, setpoint, duty
            );
        }

        state.last_duty_cycle = duty;
        Some(DutyPlan { duty, kick: needs_kick(previous, duty) })
    }
}

/// Whether moving from `previous` to `next` needs a full power kick first
pub fn needs_kick(previous: u8, next: u8) -> bool {
    if next == 0 {
        return false;
    }
    let slowing_when_slow = previous < control::KICK_THRESHOLD_PCT && next < previous;
    let starting_slow = previous == 0 && next < control::KICK_THRESHOLD_PCT;
    slowing_when_slow || starting_slow
}
