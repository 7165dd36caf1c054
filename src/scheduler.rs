/*
 * This file is part of SimpleChamber.
 *
 * Copyright (C) 2025 SimpleChamber contributors
 *
 * SimpleChamber is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * SimpleChamber is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with SimpleChamber. If not, see <https://www.gnu.org/licenses/>.
 */

//! Chamber Control Loop
//!
//! Every tick reads the sensor, filters the reading, steps the PI
//! controller and applies the resulting duty cycle.
//!
//! # Fault handling
//! - **Per-tick isolation**: a failed tick is logged and the next one runs
//! - **Log suppression**: repeated failures are logged on the first
//!   occurrence and then every `ERROR_LOG_EVERY` ticks
//! - **Serialized reconfiguration**: reloads run on the loop task between
//!   ticks and hold the session lock while hardware is swapped

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use sc_core::constants::control::KICK_DUTY_PCT;
use sc_core::constants::timing::{ERROR_LOG_EVERY, KICK_HOLD, TICK_PERIOD};
use sc_core::{
    filter, validate_config, ChamberConfig, ChamberError, ControllerState, DutyPlan, FanController,
    Hardware, Result, SensorError,
};

use crate::session::HardwareSession;
use crate::telemetry::{self, ChamberStatus, StatusBoard, TemperatureMap};

const COMMAND_QUEUE: usize = 8;

#[derive(Debug)]
pub enum Command {
    Reconfigure(ChamberConfig),
    Shutdown,
}

pub struct Chamber {
    session: Arc<Mutex<HardwareSession>>,
    controller: FanController,
    state: ControllerState,
    status: Arc<StatusBoard>,
    consecutive_errors: u32,
}

impl Chamber {
    /// Set up hardware for `config` and start the control loop
    pub async fn start(
        hardware: Arc<dyn Hardware>,
        config: ChamberConfig,
    ) -> Result<ChamberHandle> {
        let chamber = Self::open(hardware, config).await?;
        let status = chamber.status.clone();
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        let task = tokio::spawn(chamber.run(rx));
        Ok(ChamberHandle { commands, status, task })
    }

    async fn open(hardware: Arc<dyn Hardware>, config: ChamberConfig) -> Result<Self> {
        validate_config(&config)?;
        let status = Arc::new(StatusBoard::new(&config));
        let session = tokio::task::spawn_blocking(move || {
            let mut session = HardwareSession::new(hardware);
            session.setup(config).map(|_| session)
        })
        .await
        .map_err(|e| ChamberError::Task(format!("hardware setup task failed: {}", e)))??;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            controller: FanController::default(),
            state: ControllerState::new(),
            status,
            consecutive_errors: 0,
        })
    }

    /// Run `f` on the blocking pool with the session locked. The guard is
    /// handed back so the caller can keep the lock.
    async fn with_session<T, F>(&self, f: F) -> Result<(OwnedMutexGuard<HardwareSession>, T)>
    where
        F: FnOnce(&mut HardwareSession) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.session.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let out = f(&mut *guard);
            (guard, out)
        })
        .await
        .map_err(|e| ChamberError::Task(format!("session task failed: {}", e)))
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(period_ms = TICK_PERIOD.as_millis() as u64, "Chamber control loop starting");

        let mut ticker = time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = self.tick().await;
                    self.track(result);
                }
                command = commands.recv() => match command {
                    Some(Command::Reconfigure(config)) => {
                        if let Err(e) = self.reconfigure(config).await {
                            error!("Reconfiguration failed: {}", e);
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        drop(ticker);
        match self.with_session(|s| s.shutdown()).await {
            Ok((_, Ok(()))) => {}
            Ok((_, Err(e))) | Err(e) => warn!("Session shutdown: {}", e),
        }
        info!("Chamber control loop stopped");
    }

    /// One sampling and control cycle
    async fn tick(&mut self) -> Result<()> {
        let (mut session, reading) = self.with_session(|s| s.read_sample()).await?;
        let sample = reading?;

        let accepted = filter::accept(sample.temperature, self.state.last_temperature);
        if accepted != Some(sample.temperature) {
            debug!(
                candidate = sample.temperature,
                kept = ?accepted,
                "Ignoring sudden temperature drop"
            );
        }
        self.state.last_temperature = accepted;

        let setpoint = session.config().max_temp;
        let enabled = session.config().fan_enabled;
        let plan = self.controller.step(accepted, setpoint, &mut self.state, enabled);
        self.status.record(accepted, sample.humidity, self.state.last_duty_cycle);

        if let Some(plan) = plan {
            apply_plan(&mut session, plan).await?;
        }
        Ok(())
    }

    async fn reconfigure(&mut self, config: ChamberConfig) -> Result<()> {
        let identity = config.sensor_identity();
        let published = config.clone();
        let (_session, previous) = self
            .with_session(move |s| {
                let previous = s.config().sensor_identity();
                s.reinitialize(config).map(|_| previous)
            })
            .await?;
        let previous = previous?;

        self.state.reset_output();
        if previous != identity {
            debug!("Sensor changed, discarding last temperature");
            self.state.last_temperature = None;
        }
        self.status.reconfigured(&published, self.state.last_temperature);
        self.consecutive_errors = 0;

        info!(
            fan_enabled = published.fan_enabled,
            max_temp = published.max_temp,
            driver = %published.dht_driver,
            "Configuration applied"
        );
        Ok(())
    }

    fn track(&mut self, result: Result<()>) {
        match result {
            Ok(()) => {
                if self.consecutive_errors > 0 {
                    debug!("Control loop recovered after {} errors", self.consecutive_errors);
                    self.consecutive_errors = 0;
                }
            }
            Err(e) => {
                self.consecutive_errors += 1;
                let count = self.consecutive_errors;
                if count == 1 || count % ERROR_LOG_EVERY == 0 {
                    report(&e, count);
                }
            }
        }
    }
}

fn report(e: &ChamberError, count: u32) {
    match e {
        ChamberError::Sensor(s) if s.is_retriable() => debug!(count, "Sensor reading error: {}", s),
        ChamberError::Sensor(SensorError::Unavailable(_)) => warn!(count, "{}", e),
        _ => error!(count, "Control tick failed: {}", e),
    }
}

/// Drive the fan to `plan.duty`, kicking it at full power first if asked
pub async fn apply_plan(session: &mut HardwareSession, plan: DutyPlan) -> Result<()> {
    if plan.kick {
        debug!(duty = plan.duty, "Kicking fan at {}% before settling", KICK_DUTY_PCT);
        session.set_duty(KICK_DUTY_PCT)?;
        time::sleep(KICK_HOLD).await;
    }
    session.set_duty(plan.duty)
}

/// Control surface for a running chamber loop
pub struct ChamberHandle {
    commands: mpsc::Sender<Command>,
    status: Arc<StatusBoard>,
    task: JoinHandle<()>,
}

impl ChamberHandle {
    /// Queue a new configuration. It is applied between ticks.
    pub async fn request_reload(&self, config: ChamberConfig) -> Result<()> {
        validate_config(&config)?;
        self.commands
            .send(Command::Reconfigure(config))
            .await
            .map_err(|_| ChamberError::Task("control loop is not running".to_string()))
    }

    pub fn fan_enabled(&self) -> bool {
        self.status.snapshot().fan_enabled
    }

    pub fn status(&self) -> ChamberStatus {
        self.status.snapshot()
    }

    pub fn inject_temperatures(&self, temps: &TemperatureMap) -> TemperatureMap {
        telemetry::inject_temperatures(&self.status.snapshot(), temps)
    }

    /// Stop the loop, then the fan, then release the sensor
    pub async fn shutdown(self) -> Result<()> {
        // A closed channel means the loop already ended
        let _ = self.commands.send(Command::Shutdown).await;
        self.task
            .await
            .map_err(|e| ChamberError::Task(format!("control loop failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_celsius, write_overlay, FakeHardware, MockPwm};
    use mockall::Sequence;
    use sc_core::{SensorBackendKind, SensorModel};
    use tempfile::TempDir;

    async fn chamber(hw: &Arc<FakeHardware>, config: ChamberConfig) -> Chamber {
        Chamber::open(hw.clone(), config).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_drives_pi_output() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let mut chamber = chamber(&hw, ChamberConfig::default()).await;

        write_celsius(dir.path(), 31);
        chamber.tick().await.unwrap();
        // 0 -> 30 starts a slow fan: kick, then settle
        assert_eq!(hw.duty_writes(), vec![100, 30]);
        assert_eq!(chamber.state.last_duty_cycle, 30);

        let status = chamber.status.snapshot();
        assert_eq!(status.temperature, Some(31.0));
        assert_eq!(status.duty_cycle, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_holds_full_power() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let chamber = chamber(&hw, ChamberConfig::default()).await;
        let mut session = chamber.session.clone().lock_owned().await;

        let mut mock = MockPwm::new();
        let mut seq = Sequence::new();
        mock.expect_set_duty()
            .withf(|d| *d == 100)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_set_duty()
            .withf(|d| *d == 22)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_stop().returning(|| Ok(()));
        mock.expect_line().return_const(10u8);
        session.replace_fan(Box::new(mock));

        let start = time::Instant::now();
        apply_plan(&mut session, DutyPlan { duty: 22, kick: true }).await.unwrap();
        assert!(start.elapsed() >= KICK_HOLD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_kick_writes_once() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let chamber = chamber(&hw, ChamberConfig::default()).await;
        let mut session = chamber.session.clone().lock_owned().await;

        let start = time::Instant::now();
        apply_plan(&mut session, DutyPlan { duty: 40, kick: false }).await.unwrap();
        assert_eq!(start.elapsed(), std::time::Duration::ZERO);
        assert_eq!(hw.duty_writes(), vec![40]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_sensor_leaves_state_alone() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let mut chamber = chamber(&hw, ChamberConfig::default()).await;
        chamber.state.last_temperature = Some(32.0);
        chamber.state.last_duty_cycle = 60;
        chamber.state.integral = 4.0;

        for _ in 0..3 {
            let err = chamber.tick().await.unwrap_err();
            assert!(matches!(err, ChamberError::Sensor(SensorError::Unavailable(_))));
        }
        assert_eq!(chamber.state.last_temperature, Some(32.0));
        assert_eq!(chamber.state.last_duty_cycle, 60);
        assert_eq!(chamber.state.integral, 4.0);
        assert!(hw.duty_writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_glitch_keeps_previous_temperature() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let mut chamber = chamber(&hw, ChamberConfig::default()).await;

        write_celsius(dir.path(), 32);
        chamber.tick().await.unwrap();
        write_celsius(dir.path(), 25);
        chamber.tick().await.unwrap();
        assert_eq!(chamber.state.last_temperature, Some(32.0));
        // the rejected drop still steps the controller with 32 °C
        assert_eq!(chamber.state.integral, 4.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_fan_forces_zero() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let config = ChamberConfig { fan_enabled: false, ..ChamberConfig::default() };
        let mut chamber = chamber(&hw, config).await;

        write_celsius(dir.path(), 40);
        chamber.tick().await.unwrap();
        assert_eq!(chamber.state.last_duty_cycle, 0);
        assert_eq!(chamber.state.integral, 0.0);
        assert!(hw.opened_lines().is_empty());
        assert_eq!(chamber.status.snapshot().temperature, Some(40.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_resets_output_keeps_temperature() {
        let dir = TempDir::new().unwrap();
        write_overlay(dir.path(), "32000", Some("50000"));
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let mut chamber = chamber(&hw, ChamberConfig::default()).await;
        chamber.tick().await.unwrap();
        assert!(chamber.state.last_duty_cycle > 0);

        let config = ChamberConfig { max_temp: 35.0, ..ChamberConfig::default() };
        chamber.reconfigure(config).await.unwrap();
        assert_eq!(chamber.state.integral, 0.0);
        assert_eq!(chamber.state.last_duty_cycle, 0);
        assert_eq!(chamber.state.last_temperature, Some(32.0));
        assert_eq!(hw.stops(), 1);

        let status = chamber.status.snapshot();
        assert_eq!(status.setpoint, 35.0);
        assert_eq!(status.temperature, Some(32.0));
        assert_eq!(status.humidity, Some(50.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_new_sensor_forgets_temperature() {
        let dir = TempDir::new().unwrap();
        write_celsius(dir.path(), 32);
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let mut chamber = chamber(&hw, ChamberConfig::default()).await;
        chamber.tick().await.unwrap();

        let config = ChamberConfig {
            dht_driver: SensorBackendKind::Direct,
            sensor_type: SensorModel::Dht11,
            ..ChamberConfig::default()
        };
        chamber.reconfigure(config).await.unwrap();
        assert_eq!(chamber.state.last_temperature, None);
        assert_eq!(chamber.status.snapshot().temperature, None);

        // the fake direct driver reads 25 °C, accepted as a fresh start
        chamber.tick().await.unwrap();
        assert_eq!(chamber.state.last_temperature, Some(25.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_counter_resets_on_success() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let mut chamber = chamber(&hw, ChamberConfig::default()).await;

        for _ in 0..12 {
            let result = chamber.tick().await;
            chamber.track(result);
        }
        assert_eq!(chamber.consecutive_errors, 12);

        write_celsius(dir.path(), 20);
        let result = chamber.tick().await;
        chamber.track(result);
        assert_eq!(chamber.consecutive_errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_reload_is_rejected_by_handle() {
        let dir = TempDir::new().unwrap();
        let hw = Arc::new(FakeHardware::new(dir.path()));
        let handle = Chamber::start(hw.clone(), ChamberConfig::default()).await.unwrap();

        let bad = ChamberConfig { max_temp: f64::NAN, ..ChamberConfig::default() };
        assert!(handle.request_reload(bad).await.unwrap_err().is_config_invalid());
        handle.shutdown().await.unwrap();
        assert_eq!(hw.stops(), 1);
    }
}
