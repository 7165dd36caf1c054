/*
 * Test utilities and fake hardware for SimpleChamber
 *
 * FakeHardware hands out recording PWM channels and direct-driver sensors
 * and points the overlay backend at a temporary sysfs tree.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mockall::mock;
use parking_lot::Mutex;

use sc_core::{
    GpioMode, Hardware, PwmChannel, Result, Sample, SensorBackend, SensorError, SensorModel,
};

mock! {
    pub Pwm {}

    impl PwmChannel for Pwm {
        fn line(&self) -> u8;
        fn set_duty(&mut self, percent: u8) -> Result<()>;
        fn stop(&mut self) -> Result<()>;
    }
}

/// Everything the fake hardware was asked to do
#[derive(Debug, Default)]
pub struct HardwareLog {
    pub opened_lines: Vec<u8>,
    pub duty_writes: Vec<u8>,
    pub stops: usize,
    pub direct_opens: Vec<(SensorModel, u8)>,
    pub direct_reads: usize,
    pub direct_releases: usize,
}

pub struct FakeHardware {
    platform_root: PathBuf,
    numbering: GpioMode,
    fail_direct: bool,
    log: Arc<Mutex<HardwareLog>>,
}

impl FakeHardware {
    pub fn new(platform_root: &Path) -> Self {
        Self {
            platform_root: platform_root.to_path_buf(),
            numbering: GpioMode::Bcm,
            fail_direct: false,
            log: Arc::new(Mutex::new(HardwareLog::default())),
        }
    }

    pub fn with_numbering(mut self, numbering: GpioMode) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn failing_direct(mut self) -> Self {
        self.fail_direct = true;
        self
    }

    pub fn opened_lines(&self) -> Vec<u8> {
        self.log.lock().opened_lines.clone()
    }

    pub fn duty_writes(&self) -> Vec<u8> {
        self.log.lock().duty_writes.clone()
    }

    pub fn stops(&self) -> usize {
        self.log.lock().stops
    }

    pub fn direct_opens(&self) -> Vec<(SensorModel, u8)> {
        self.log.lock().direct_opens.clone()
    }

    pub fn direct_reads(&self) -> usize {
        self.log.lock().direct_reads
    }

    pub fn direct_releases(&self) -> usize {
        self.log.lock().direct_releases
    }
}

impl Hardware for FakeHardware {
    fn numbering(&self) -> GpioMode {
        self.numbering
    }

    fn open_pwm(&self, line: u8, _frequency_hz: f64) -> Result<Box<dyn PwmChannel>> {
        self.log.lock().opened_lines.push(line);
        Ok(Box::new(RecordingPwm { line, log: self.log.clone() }))
    }

    fn open_direct_sensor(&self, model: SensorModel, line: u8) -> Result<Box<dyn SensorBackend>> {
        if self.fail_direct {
            return Err(sc_core::ChamberError::gpio("line 4 is already in use"));
        }
        self.log.lock().direct_opens.push((model, line));
        Ok(Box::new(FakeDirect { log: self.log.clone() }))
    }

    fn platform_devices_root(&self) -> PathBuf {
        self.platform_root.clone()
    }
}

struct RecordingPwm {
    line: u8,
    log: Arc<Mutex<HardwareLog>>,
}

impl PwmChannel for RecordingPwm {
    fn line(&self) -> u8 {
        self.line
    }

    fn set_duty(&mut self, percent: u8) -> Result<()> {
        self.log.lock().duty_writes.push(percent);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.lock().stops += 1;
        Ok(())
    }
}

/// Direct driver that always answers 25 °C / 40 %RH
struct FakeDirect {
    log: Arc<Mutex<HardwareLog>>,
}

impl SensorBackend for FakeDirect {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn read(&mut self) -> std::result::Result<Sample, SensorError> {
        self.log.lock().direct_reads += 1;
        Ok(Sample { temperature: 25.0, humidity: Some(40.0) })
    }

    fn release(&mut self) {
        self.log.lock().direct_releases += 1;
    }
}

/// Write overlay IIO files below `platform_root`, creating the device
/// directory on first use. Values are in thousandths.
pub fn write_overlay(platform_root: &Path, temp_milli: &str, humidity_milli: Option<&str>) {
    let iio = platform_root.join("dht11@17").join("iio:device0");
    fs::create_dir_all(&iio).unwrap();
    fs::write(iio.join("in_temp_input"), format!("{}\n", temp_milli)).unwrap();
    if let Some(h) = humidity_milli {
        fs::write(iio.join("in_humidityrelative_input"), format!("{}\n", h)).unwrap();
    }
}

/// Overlay temperature for a whole number of degrees
pub fn write_celsius(platform_root: &Path, celsius: i32) {
    write_overlay(platform_root, &(celsius * 1000).to_string(), None);
}
