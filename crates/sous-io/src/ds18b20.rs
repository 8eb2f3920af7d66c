//! DS18B20 1-Wire temperature sensor and a periodic sampler built on it.

use sous_core::{ControlError, ControlResult, Sample, SampleMessage, TemperatureTracker};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const W1_DEVICES_ROOT: &str = "/sys/bus/w1/devices";

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no 1-Wire sensor found under {0}")]
    NoDevice(PathBuf),

    #[error("malformed sensor output: {0}")]
    Malformed(&'static str),

    #[error("sensor reported a CRC mismatch")]
    CrcMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Thousandths of a degree Celsius, as reported by the kernel driver.
    pub raw: i64,
    pub celsius: f64,
    pub fahrenheit: f64,
}

impl Reading {
    pub fn from_raw(raw: i64) -> Self {
        let celsius = raw as f64 / 1000.0;
        Self {
            raw,
            celsius,
            fahrenheit: celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Parse the two-line `w1_slave` format:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(text: &str) -> Result<Reading, SensorError> {
    let mut lines = text.lines();
    let status = lines.next().ok_or(SensorError::Malformed("empty output"))?;
    if status.trim_end().ends_with("NO") {
        return Err(SensorError::CrcMismatch);
    }
    let data = lines
        .next()
        .ok_or(SensorError::Malformed("missing data line"))?;
    let token = data
        .split_whitespace()
        .last()
        .ok_or(SensorError::Malformed("empty data line"))?;
    let raw = token
        .strip_prefix("t=")
        .ok_or(SensorError::Malformed("missing t= field"))?
        .parse::<i64>()
        .map_err(|_| SensorError::Malformed("non-numeric temperature"))?;
    Ok(Reading::from_raw(raw))
}

#[derive(Debug, Clone)]
pub struct Ds18b20 {
    id: String,
    path: PathBuf,
}

impl Ds18b20 {
    /// Sensor ids under `root`, skipping bus masters.
    pub fn list_devices(root: &Path) -> Result<Vec<String>, SensorError> {
        let entries = fs::read_dir(root).map_err(|source| SensorError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with("w1_bus_master"))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Open sensor `id`, or the first sensor found when `id` is `None`.
    pub fn open(root: &Path, id: Option<&str>) -> Result<Self, SensorError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => Self::list_devices(root)?
                .into_iter()
                .next()
                .ok_or_else(|| SensorError::NoDevice(root.to_path_buf()))?,
        };
        let path = root.join(&id).join("w1_slave");
        Ok(Self { id, path })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn read(&self) -> Result<Reading, SensorError> {
        let text = fs::read_to_string(&self.path).map_err(|source| SensorError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_w1_slave(&text)
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub period: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
        }
    }
}

/// Reads the sensor every `period` and sends °F samples to the cooker.
pub struct Ds18b20Tracker {
    sensor: Ds18b20,
    config: SamplerConfig,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Ds18b20Tracker {
    pub fn new(sensor: Ds18b20, config: SamplerConfig) -> Self {
        Self {
            sensor,
            config,
            stop: None,
            worker: None,
        }
    }
}

impl TemperatureTracker for Ds18b20Tracker {
    fn start(&mut self, sink: Sender<SampleMessage>) -> ControlResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let sensor = self.sensor.clone();
        let period = self.config.period;
        let worker = thread::Builder::new()
            .name(format!("ds18b20-{}", sensor.id()))
            .spawn(move || loop {
                match sensor.read() {
                    Ok(reading) => {
                        debug!(sensor = sensor.id(), fahrenheit = reading.fahrenheit, "sample");
                        if sink
                            .send(SampleMessage::Sample(Sample::now(reading.fahrenheit)))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(err) => warn!(sensor = sensor.id(), error = %err, "sensor read failed"),
                }
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            })
            .map_err(|source| ControlError::Spawn {
                what: "ds18b20 sampler",
                source,
            })?;
        info!(sensor = self.sensor.id(), period_s = period.as_secs_f64(), "sampler started");
        self.stop = Some(stop_tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            info!(sensor = self.sensor.id(), "sampler stopped");
        }
    }
}

impl Drop for Ds18b20Tracker {
    fn drop(&mut self) {
        self.stop();
    }
}
