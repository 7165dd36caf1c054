//! Kernel overlay backend
//!
//! With `dtoverlay=dht11,gpiopin=N` the kernel driver exposes readings as
//! IIO files below `/sys/devices/platform/dht11@N/iio:device0`. Values are
//! integers in thousandths of the physical unit.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Sample, SensorBackend};
use crate::constants::paths;
use crate::error::SensorError;

/// Find the overlay's IIO directory below `platform_root`.
///
/// Takes the first (lexicographically) device whose name starts with `dht11`.
pub fn find_overlay_device(platform_root: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(platform_root).ok()?;
    let mut devices: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with(paths::DHT_DEVICE_PREFIX))
        .map(|e| e.path())
        .collect();
    devices.sort();
    let iio = devices.first()?.join(paths::IIO_DEVICE);
    iio.is_dir().then_some(iio)
}

fn read_trimmed<P: AsRef<Path>>(p: P) -> io::Result<String> {
    let mut s = String::new();
    fs::File::open(p)?.read_to_string(&mut s)?;
    Ok(s.trim().to_string())
}

fn read_scaled(dir: &Path, file: &str) -> Result<f64, String> {
    let path = dir.join(file);
    let raw = read_trimmed(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let value = raw
        .parse::<i64>()
        .map_err(|e| format!("{}: cannot parse '{}': {}", path.display(), raw, e))?;
    Ok(value as f64 / 1000.0)
}

pub struct OverlaySensor {
    platform_root: PathBuf,
    device: Option<PathBuf>,
}

impl OverlaySensor {
    /// Look for the overlay device under `platform_root`.
    ///
    /// The backend is usable even when nothing is found yet; reads report
    /// the sensor as unavailable and discovery is retried on each read.
    pub fn discover(platform_root: impl Into<PathBuf>) -> Self {
        let platform_root = platform_root.into();
        let device = find_overlay_device(&platform_root);
        Self { platform_root, device }
    }

    pub fn device(&self) -> Option<&Path> {
        self.device.as_deref()
    }

    fn device_dir(&mut self) -> Result<PathBuf, SensorError> {
        if let Some(dir) = &self.device {
            if dir.is_dir() {
                return Ok(dir.clone());
            }
        }
        self.device = find_overlay_device(&self.platform_root);
        self.device
            .clone()
            .ok_or_else(|| SensorError::unavailable("no sensor detected by Device Tree Overlay"))
    }
}

impl SensorBackend for OverlaySensor {
    fn name(&self) -> &'static str {
        "dtoverlay"
    }

    fn read(&mut self) -> Result<Sample, SensorError> {
        let dir = self.device_dir()?;
        let temperature = read_scaled(&dir, paths::TEMP_INPUT).map_err(SensorError::Transient)?;
        let humidity = match read_scaled(&dir, paths::HUMIDITY_INPUT) {
            Ok(h) => Some(h),
            Err(e) => {
                debug!("Humidity unavailable: {}", e);
                None
            }
        };
        Ok(Sample { temperature, humidity })
    }
}
