use crate::error::{ControlError, ControlResult, PinError};
use crate::hal::{Direction, PinHandle, PinProvider};
use crate::tracker::{Sample, SampleMessage, TemperatureTracker};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

/// One recorded level change of a simulated pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at: Instant,
    pub level: bool,
}

#[derive(Debug, Default)]
struct PinRecord {
    level: Option<bool>,
    transitions: Vec<Transition>,
    writes: u64,
    acquired: u64,
    released: u64,
}

#[derive(Debug, Default)]
struct Bank {
    exported: HashSet<u32>,
    claimed: HashSet<u32>,
    pins: HashMap<u32, PinRecord>,
}

/// In-memory stand-in for the GPIO export mechanism.
///
/// Cloning shares the same bank, so a test can hand one clone to an engine and
/// inspect pin activity through another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPins {
    bank: Arc<Mutex<Bank>>,
}

impl SimulatedPins {
    pub fn new() -> Self {
        Self::default()
    }

    fn bank(&self) -> MutexGuard<'_, Bank> {
        self.bank.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a pin as owned by someone else, like a device-tree claim.
    pub fn claim(&self, pin: u32) {
        self.bank().claimed.insert(pin);
    }

    pub fn is_exported(&self, pin: u32) -> bool {
        self.bank().exported.contains(&pin)
    }

    /// Level last written to the pin, or `None` while it is not exported.
    pub fn level(&self, pin: u32) -> Option<bool> {
        let bank = self.bank();
        if !bank.exported.contains(&pin) {
            return None;
        }
        bank.pins.get(&pin).and_then(|record| record.level)
    }

    pub fn transitions(&self, pin: u32) -> Vec<Transition> {
        self.bank()
            .pins
            .get(&pin)
            .map(|record| record.transitions.clone())
            .unwrap_or_default()
    }

    pub fn writes(&self, pin: u32) -> u64 {
        self.bank().pins.get(&pin).map_or(0, |record| record.writes)
    }

    pub fn acquire_count(&self, pin: u32) -> u64 {
        self.bank().pins.get(&pin).map_or(0, |record| record.acquired)
    }

    pub fn release_count(&self, pin: u32) -> u64 {
        self.bank().pins.get(&pin).map_or(0, |record| record.released)
    }
}

impl PinProvider for SimulatedPins {
    type Handle = SimulatedPin;

    fn acquire(&self, pin: u32, direction: Direction) -> Result<SimulatedPin, PinError> {
        let mut bank = self.bank();
        if bank.claimed.contains(&pin) || !bank.exported.insert(pin) {
            return Err(PinError::Busy { pin });
        }
        let record = bank.pins.entry(pin).or_default();
        record.acquired += 1;
        record.level = None;
        debug!("simulated pin {} exported as {}", pin, direction.as_str());
        Ok(SimulatedPin {
            pin,
            direction,
            pins: self.clone(),
        })
    }
}

#[derive(Debug)]
pub struct SimulatedPin {
    pin: u32,
    direction: Direction,
    pins: SimulatedPins,
}

impl PinHandle for SimulatedPin {
    fn pin(&self) -> u32 {
        self.pin
    }

    fn set(&mut self, high: bool) -> Result<(), PinError> {
        if self.direction != Direction::Out {
            return Err(PinError::WrongDirection { pin: self.pin });
        }
        let mut bank = self.pins.bank();
        let record = bank.pins.entry(self.pin).or_default();
        record.writes += 1;
        if record.level != Some(high) {
            record.transitions.push(Transition {
                at: Instant::now(),
                level: high,
            });
        }
        record.level = Some(high);
        Ok(())
    }

    fn get(&mut self) -> Result<bool, PinError> {
        let bank = self.pins.bank();
        Ok(bank
            .pins
            .get(&self.pin)
            .and_then(|record| record.level)
            .unwrap_or(false))
    }
}

impl Drop for SimulatedPin {
    fn drop(&mut self) {
        let mut bank = self.pins.bank();
        bank.exported.remove(&self.pin);
        bank.pins.entry(self.pin).or_default().released += 1;
        debug!("simulated pin {} unexported", self.pin);
    }
}

/// Lumped thermal model of a water bath heated through a relay, in °F.
#[derive(Debug, Clone)]
pub struct BathModel {
    pub temperature_f: f64,
    pub ambient_f: f64,
    /// Temperature rise per second with the heater on and no losses.
    pub heating_rate: f64,
    /// Fraction of the excess over ambient lost per second.
    pub loss_rate: f64,
}

impl BathModel {
    pub fn new(ambient_f: f64) -> Self {
        Self {
            temperature_f: ambient_f,
            ambient_f,
            heating_rate: 0.05,
            loss_rate: 0.0005,
        }
    }

    pub fn step(&mut self, dt_s: f64, heater_on: bool) {
        let heat_in = if heater_on { self.heating_rate } else { 0.0 };
        let heat_out = self.loss_rate * (self.temperature_f - self.ambient_f);
        self.temperature_f += (heat_in - heat_out) * dt_s;
    }
}

impl Default for BathModel {
    fn default() -> Self {
        Self::new(70.0)
    }
}

#[derive(Debug, Clone)]
pub struct BathConfig {
    /// Pin whose level powers the simulated heater.
    pub relay_pin: u32,
    /// Interval between emitted samples.
    pub period: Duration,
    /// Model integration step.
    pub step: Duration,
    /// Simulated seconds per real second.
    pub time_scale: f64,
}

impl Default for BathConfig {
    fn default() -> Self {
        Self {
            relay_pin: 17,
            period: Duration::from_secs(10),
            step: Duration::from_millis(50),
            time_scale: 1.0,
        }
    }
}

/// Temperature tracker backed by a [`BathModel`] heated from a simulated relay pin.
pub struct SimulatedBath {
    pins: SimulatedPins,
    config: BathConfig,
    model: Arc<Mutex<BathModel>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedBath {
    pub fn new(pins: SimulatedPins, model: BathModel, config: BathConfig) -> Self {
        Self {
            pins,
            config,
            model: Arc::new(Mutex::new(model)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .temperature_f
    }
}

impl TemperatureTracker for SimulatedBath {
    fn start(&mut self, sink: Sender<SampleMessage>) -> ControlResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.stop.store(false, Ordering::Relaxed);

        let pins = self.pins.clone();
        let config = self.config.clone();
        let model = Arc::clone(&self.model);
        let stop = Arc::clone(&self.stop);
        let worker = thread::Builder::new()
            .name("simulated-bath".to_string())
            .spawn(move || {
                let dt_s = config.step.as_secs_f64() * config.time_scale;
                let mut since_sample = config.period;
                while !stop.load(Ordering::Relaxed) {
                    let heater_on = pins.level(config.relay_pin).unwrap_or(false);
                    let temperature = {
                        let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
                        model.step(dt_s, heater_on);
                        model.temperature_f
                    };
                    if since_sample >= config.period {
                        since_sample = Duration::ZERO;
                        let sample = Sample::new(SystemTime::now(), temperature);
                        if sink.send(SampleMessage::Sample(sample)).is_err() {
                            warn!("simulated bath: sample channel closed");
                            break;
                        }
                    }
                    thread::sleep(config.step);
                    since_sample += config.step;
                }
            })
            .map_err(|source| ControlError::Spawn {
                what: "simulated bath",
                source,
            })?;
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SimulatedBath {
    fn drop(&mut self) {
        self.stop();
    }
}
