//! Proportional-integral temperature control around a [`Heater`].
//!
//! The [`Cooker`] keeps its whole control state, the heater and the state history
//! behind one mutex. Samples arrive from a [`TemperatureTracker`] over a channel
//! and are relayed into [`Cooker::pid`] by a dedicated sampling worker.

use crate::error::{ControlError, ControlResult};
use crate::heater::Heater;
use crate::hal::PinProvider;
use crate::tags;
use crate::timebase;
use crate::tracker::{Sample, SampleMessage, TemperatureTracker};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Gains and anti-windup settings of the control law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidTuning {
    pub kp: f64,
    pub ki: f64,
    /// Integral accumulates only while `|error|` is below this band; outside it
    /// the integral term is reset.
    pub windup_band: f64,
    /// Lower bound on the integral term. `Some(0.0)` never lets the integral pull
    /// power below the proportional term; `None` removes the bound.
    pub integral_floor: Option<f64>,
}

impl Default for PidTuning {
    fn default() -> Self {
        Self {
            // Full power once the bath is 5°F or more below target.
            kp: 0.2,
            ki: 0.004,
            windup_band: 2.0,
            integral_floor: Some(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CookerConfig {
    /// Target temperature in °F.
    pub target: f64,
    pub tuning: PidTuning,
    /// Most recent distinct states kept in memory.
    pub history_limit: usize,
}

impl Default for CookerConfig {
    fn default() -> Self {
        Self {
            target: 78.0,
            tuning: PidTuning::default(),
            history_limit: 8_640,
        }
    }
}

/// Flat numeric state of the controller, as exchanged with the front end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CookerState {
    /// Unix seconds of the last sample.
    pub sample_time: Option<f64>,
    /// Last sampled temperature in °F.
    pub temperature: Option<f64>,
    pub target: f64,
    pub setting: f64,
    pub proportional: f64,
    pub offset: f64,
    pub kp: f64,
    pub ki: f64,
}

impl CookerState {
    fn new(config: &CookerConfig) -> Self {
        Self {
            sample_time: None,
            temperature: None,
            target: config.target,
            setting: 0.0,
            proportional: 0.0,
            offset: 0.0,
            kp: config.tuning.kp,
            ki: config.tuning.ki,
        }
    }

    pub fn error(&self) -> Option<f64> {
        self.temperature.map(|temperature| self.target - temperature)
    }

    /// Assign one tunable field by its key.
    pub fn set_field(&mut self, key: &str, value: f64) -> ControlResult<()> {
        if !value.is_finite() {
            return Err(ControlError::InvalidStateValue {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        let field = match key {
            k if k == tags::TARGET.key => &mut self.target,
            k if k == tags::PROPORTIONAL.key => &mut self.proportional,
            k if k == tags::OFFSET.key => &mut self.offset,
            k if k == tags::KP.key => &mut self.kp,
            k if k == tags::KI.key => &mut self.ki,
            _ => {
                return Err(ControlError::UnknownStateField {
                    key: key.to_string(),
                })
            }
        };
        *field = value;
        Ok(())
    }

    /// The tunable fields as `(key, value)` pairs.
    pub fn tunables(&self) -> [(&'static str, f64); 5] {
        [
            (tags::TARGET.key, self.target),
            (tags::PROPORTIONAL.key, self.proportional),
            (tags::OFFSET.key, self.offset),
            (tags::KP.key, self.kp),
            (tags::KI.key, self.ki),
        ]
    }
}

impl fmt::Display for CookerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sample_time {
            Some(at) => {
                let (h, m, s) = timebase::utc_clock(at);
                let ago = timebase::now_unix_seconds() - at;
                writeln!(f, "Cooker: ({h:02}:{m:02}:{s:02} UTC, {ago:0.2} seconds ago):")?;
            }
            None => writeln!(f, "Cooker: (no samples yet):")?,
        }
        match (self.temperature, self.error()) {
            (Some(temperature), Some(error)) => writeln!(
                f,
                "  current: {:7.2}  target: {:7.2}  error: {:7.3}",
                temperature, self.target, error
            )?,
            _ => writeln!(f, "  current:     n/a  target: {:7.2}", self.target)?,
        }
        writeln!(f, "  setting: {:7.2}% {:6.4}", self.setting * 100.0, self.setting)?;
        writeln!(
            f,
            "    proportional: {:8.4}, kp: {:7.5}",
            self.proportional, self.kp
        )?;
        write!(f, "    offset: {:14.4}, ki: {:7.5}", self.offset, self.ki)
    }
}

struct CookerCore<P: PinProvider> {
    state: CookerState,
    windup_band: f64,
    integral_floor: Option<f64>,
    heater: Heater<P>,
    history: VecDeque<CookerState>,
    history_limit: usize,
    samples_applied: u64,
    samples_rejected: u64,
}

impl<P: PinProvider> CookerCore<P> {
    /// Run the control law on the latest temperature, optionally taking a new
    /// sample first.
    fn control(&mut self, sample: Option<Sample>) -> ControlResult<CookerState> {
        if let Some(sample) = sample {
            if !sample.temperature.is_finite() {
                self.samples_rejected += 1;
                return Err(ControlError::InvalidSample {
                    temperature: sample.temperature,
                });
            }
            self.state.temperature = Some(sample.temperature);
            self.state.sample_time = Some(sample.unix_seconds());
            self.samples_applied += 1;
        }
        let Some(temperature) = self.state.temperature else {
            return Ok(self.state);
        };

        let state = &mut self.state;
        let error = state.target - temperature;
        if error.abs() < self.windup_band {
            let accumulated = state.offset + state.ki * error;
            state.offset = match self.integral_floor {
                Some(floor) => accumulated.max(floor),
                None => accumulated,
            };
        } else {
            state.offset = 0.0;
        }
        state.proportional = state.kp * error;
        state.setting = (state.proportional + state.offset).clamp(0.0, 1.0);

        let snapshot = *state;
        self.record(snapshot);
        self.heater.set(snapshot.setting)?;
        debug!("{}", snapshot);
        Ok(snapshot)
    }

    fn record(&mut self, state: CookerState) {
        if self.history.back() == Some(&state) {
            return;
        }
        if self.history_limit > 0 && self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(state);
    }

    fn assign(&mut self, update: &CookerState) -> ControlResult<()> {
        let mut next = self.state;
        for (key, value) in update.tunables() {
            next.set_field(key, value)?;
        }
        self.state = next;
        Ok(())
    }
}

type SamplingWorker = JoinHandle<(Box<dyn TemperatureTracker>, Receiver<SampleMessage>)>;

enum SamplingSlot {
    Idle {
        tracker: Box<dyn TemperatureTracker>,
        samples: Receiver<SampleMessage>,
    },
    Running(SamplingWorker),
    Vacant,
}

/// PI controller driving one heater from a temperature tracker.
pub struct Cooker<P: PinProvider> {
    core: Arc<Mutex<CookerCore<P>>>,
    sample_tx: Sender<SampleMessage>,
    sampling: Mutex<SamplingSlot>,
}

impl<P: PinProvider> Cooker<P> {
    pub fn new(
        heater: Heater<P>,
        tracker: Box<dyn TemperatureTracker>,
        config: CookerConfig,
    ) -> Self {
        let (sample_tx, samples) = mpsc::channel();
        let core = CookerCore {
            state: CookerState::new(&config),
            windup_band: config.tuning.windup_band,
            integral_floor: config.tuning.integral_floor,
            heater,
            history: VecDeque::new(),
            history_limit: config.history_limit,
            samples_applied: 0,
            samples_rejected: 0,
        };
        Self {
            core: Arc::new(Mutex::new(core)),
            sample_tx,
            sampling: Mutex::new(SamplingSlot::Idle { tracker, samples }),
        }
    }

    fn core(&self) -> MutexGuard<'_, CookerCore<P>> {
        lock(&self.core)
    }

    /// Feed one `(time, temperature)` sample through the control law and push the
    /// resulting power to the heater.
    pub fn pid(&self, sample: Sample) -> ControlResult<CookerState> {
        self.core().control(Some(sample))
    }

    /// Re-run the control law on the last sample, e.g. after [`Cooker::set_state`].
    /// Before the first sample this leaves the heater untouched.
    pub fn reapply(&self) -> ControlResult<CookerState> {
        self.core().control(None)
    }

    pub fn get_state(&self) -> CookerState {
        self.core().state
    }

    /// Assign `target`, `proportional`, `offset`, `kp` and `ki` from `state`. Nothing
    /// is recomputed; call [`Cooker::reapply`] or wait for the next sample.
    pub fn set_state(&self, state: &CookerState) -> ControlResult<()> {
        self.core().assign(state)
    }

    /// Read-modify-write of the state under a single lock acquisition, followed by
    /// a reapply of the control law.
    pub fn modify_state<F>(&self, modify: F) -> ControlResult<CookerState>
    where
        F: FnOnce(&mut CookerState) -> ControlResult<()>,
    {
        let mut core = self.core();
        let mut next = core.state;
        modify(&mut next)?;
        core.assign(&next)?;
        core.control(None)
    }

    pub fn history(&self) -> Vec<CookerState> {
        self.core().history.iter().copied().collect()
    }

    /// Samples accepted by [`Cooker::pid`] since construction.
    pub fn samples_applied(&self) -> u64 {
        self.core().samples_applied
    }

    pub fn samples_rejected(&self) -> u64 {
        self.core().samples_rejected
    }

    pub fn heater_running(&self) -> bool {
        self.core().heater.is_running()
    }

    pub fn start_heater(&self) -> ControlResult<()> {
        self.core().heater.start()
    }

    pub fn stop_heater(&self) {
        self.core().heater.stop();
    }

    pub fn set_cycle_time(&self, seconds: f64) -> ControlResult<()> {
        self.core().heater.set_cycle_time(seconds)
    }

    /// Run `f` against the heater under the state lock.
    pub fn with_heater<R>(&self, f: impl FnOnce(&Heater<P>) -> R) -> R {
        f(&self.core().heater)
    }

    pub fn is_sampling(&self) -> bool {
        matches!(*lock(&self.sampling), SamplingSlot::Running(_))
    }

    /// Start the tracker and a worker relaying its samples into [`Cooker::pid`].
    /// Does nothing when sampling is already running.
    pub fn start_sampling(&self) -> ControlResult<()> {
        let mut slot = lock(&self.sampling);
        let (mut tracker, samples) = match mem::replace(&mut *slot, SamplingSlot::Vacant) {
            SamplingSlot::Idle { tracker, samples } => (tracker, samples),
            running @ SamplingSlot::Running(_) => {
                *slot = running;
                return Ok(());
            }
            SamplingSlot::Vacant => return Err(ControlError::Tracker("tracker lost".to_string())),
        };

        if let Err(err) = tracker.start(self.sample_tx.clone()) {
            *slot = SamplingSlot::Idle { tracker, samples };
            return Err(err);
        }

        let core = Arc::clone(&self.core);
        let spawned = thread::Builder::new()
            .name("cooker-sampling".to_string())
            .spawn(move || relay_samples(core, samples, tracker));
        match spawned {
            Ok(worker) => {
                *slot = SamplingSlot::Running(worker);
                info!("sampling started");
                Ok(())
            }
            Err(source) => Err(ControlError::Spawn {
                what: "sampling",
                source,
            }),
        }
    }

    /// Stop the sampling worker and its tracker, waiting for the worker to exit.
    pub fn stop_sampling(&self) {
        let mut slot = lock(&self.sampling);
        match mem::replace(&mut *slot, SamplingSlot::Vacant) {
            SamplingSlot::Running(worker) => {
                let _ = self.sample_tx.send(SampleMessage::Shutdown);
                match worker.join() {
                    Ok((tracker, samples)) => *slot = SamplingSlot::Idle { tracker, samples },
                    Err(_) => warn!("sampling worker panicked; tracker dropped"),
                }
                info!("sampling stopped");
            }
            other => *slot = other,
        }
    }

    /// Stop sampling, then stop the heater and release its pin.
    pub fn close(&self) {
        self.stop_sampling();
        self.stop_heater();
    }
}

impl<P: PinProvider> Drop for Cooker<P> {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn relay_samples<P: PinProvider>(
    core: Arc<Mutex<CookerCore<P>>>,
    samples: Receiver<SampleMessage>,
    mut tracker: Box<dyn TemperatureTracker>,
) -> (Box<dyn TemperatureTracker>, Receiver<SampleMessage>) {
    while let Ok(message) = samples.recv() {
        match message {
            SampleMessage::Sample(sample) => {
                if let Err(err) = lock(&core).control(Some(sample)) {
                    warn!("sample at {:.3} not applied: {}", sample.unix_seconds(), err);
                }
            }
            SampleMessage::Shutdown => break,
        }
    }
    tracker.stop();
    // Readings that raced the shutdown would be stale by the next start.
    while samples.try_recv().is_ok() {}
    (tracker, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle_engine::CycleEngine;
    use crate::duty_cycle::DutyCycleSpec;
    use crate::hal_sim::SimulatedPins;
    use crate::heater::HeaterConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    const RELAY: u32 = 17;

    /// Tracker that replays a fixed list of readings once per start.
    struct ScriptedTracker {
        readings: Vec<f64>,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl TemperatureTracker for ScriptedTracker {
        fn start(&mut self, sink: Sender<SampleMessage>) -> ControlResult<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            for (i, temperature) in self.readings.iter().enumerate() {
                let time = UNIX_EPOCH + Duration::from_secs(1_700_000_000 + i as u64 * 10);
                let _ = sink.send(SampleMessage::Sample(Sample::new(time, *temperature)));
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        cooker: Cooker<SimulatedPins>,
        pins: SimulatedPins,
        starts: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    fn fixture(readings: Vec<f64>) -> Fixture {
        let pins = SimulatedPins::new();
        let heater = Heater::new(
            CycleEngine::new(pins.clone(), RELAY),
            HeaterConfig::default(),
        )
        .unwrap();
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let tracker = ScriptedTracker {
            readings,
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        };
        let cooker = Cooker::new(heater, Box::new(tracker), CookerConfig::default());
        Fixture {
            cooker,
            pins,
            starts,
            stops,
        }
    }

    fn sample(temperature: f64) -> Sample {
        Sample::new(SystemTime::now(), temperature)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn large_error_saturates_and_resets_integral() {
        let f = fixture(vec![]);
        let state = f.cooker.pid(sample(70.0)).unwrap();
        assert_eq!(state.offset, 0.0);
        assert!((state.proportional - 1.6).abs() < 1e-12);
        assert_eq!(state.setting, 1.0);
        assert_eq!(
            f.cooker.with_heater(|h| h.config().spec_for(state.setting)),
            DutyCycleSpec::ON
        );
    }

    #[test]
    fn small_error_accumulates_integral() {
        let f = fixture(vec![]);
        let state = f.cooker.pid(sample(77.0)).unwrap();
        assert!((state.offset - 0.004).abs() < 1e-12);
        assert!((state.proportional - 0.2).abs() < 1e-12);
        assert!((state.setting - 0.204).abs() < 1e-12);

        let spec = f.cooker.with_heater(|h| h.config().spec_for(state.setting));
        assert!((spec.hi_time - 4.08).abs() < 1e-9);
        assert!((spec.low_time - 15.92).abs() < 1e-9);
        assert!((f.cooker.with_heater(|h| h.setting()) - 0.204).abs() < 1e-12);
    }

    #[test]
    fn integral_never_goes_negative_by_default() {
        let f = fixture(vec![]);
        let state = f.cooker.pid(sample(79.0)).unwrap();
        assert_eq!(state.offset, 0.0);
        assert_eq!(state.setting, 0.0);
    }

    #[test]
    fn integral_floor_can_be_removed() {
        let pins = SimulatedPins::new();
        let heater = Heater::new(CycleEngine::new(pins, RELAY), HeaterConfig::default()).unwrap();
        let tracker = ScriptedTracker {
            readings: vec![],
            starts: Arc::default(),
            stops: Arc::default(),
        };
        let config = CookerConfig {
            tuning: PidTuning {
                integral_floor: None,
                ..PidTuning::default()
            },
            ..CookerConfig::default()
        };
        let cooker = Cooker::new(heater, Box::new(tracker), config);
        let state = cooker.pid(sample(79.0)).unwrap();
        assert!((state.offset + 0.004).abs() < 1e-12);
    }

    #[test]
    fn non_finite_sample_is_rejected() {
        let f = fixture(vec![]);
        assert!(matches!(
            f.cooker.pid(sample(f64::NAN)),
            Err(ControlError::InvalidSample { .. })
        ));
        assert_eq!(f.cooker.get_state().temperature, None);
        assert_eq!(f.cooker.samples_rejected(), 1);
    }

    #[test]
    fn every_applied_sample_is_counted() {
        let f = fixture(vec![]);
        let at = SystemTime::now();
        for _ in 0..5 {
            f.cooker.pid(Sample::new(at, 77.0)).unwrap();
        }
        assert!(f.cooker.pid(sample(f64::INFINITY)).is_err());
        assert_eq!(f.cooker.samples_applied(), 5);
        assert_eq!(f.cooker.samples_rejected(), 1);
        f.cooker.reapply().unwrap();
        assert_eq!(f.cooker.samples_applied(), 5);
    }

    #[test]
    fn set_cycle_time_reaches_heater() {
        let f = fixture(vec![]);
        f.cooker.set_cycle_time(10.0).unwrap();
        assert!(matches!(
            f.cooker.set_cycle_time(0.0),
            Err(ControlError::InvalidCycleTime { .. })
        ));
        let state = f.cooker.pid(sample(77.0)).unwrap();
        let spec = f.cooker.with_heater(|heater| {
            assert_eq!(heater.config().cycle_time, 10.0);
            heater.config().spec_for(state.setting)
        });
        assert!((spec.hi_time - 2.04).abs() < 1e-9);
        assert!((spec.low_time - 7.96).abs() < 1e-9);
    }

    #[test]
    fn history_records_only_distinct_states() {
        let f = fixture(vec![]);
        let at = SystemTime::now();
        f.cooker.pid(Sample::new(at, 70.0)).unwrap();
        f.cooker.pid(Sample::new(at, 70.0)).unwrap();
        assert_eq!(f.cooker.history().len(), 1);
        f.cooker.pid(Sample::new(at, 77.0)).unwrap();
        assert_eq!(f.cooker.history().len(), 2);
    }

    #[test]
    fn history_is_bounded() {
        let pins = SimulatedPins::new();
        let heater = Heater::new(CycleEngine::new(pins, RELAY), HeaterConfig::default()).unwrap();
        let tracker = ScriptedTracker {
            readings: vec![],
            starts: Arc::default(),
            stops: Arc::default(),
        };
        let config = CookerConfig {
            history_limit: 3,
            ..CookerConfig::default()
        };
        let cooker = Cooker::new(heater, Box::new(tracker), config);
        for t in [60.0, 61.0, 62.0, 63.0, 64.0] {
            cooker.pid(sample(t)).unwrap();
        }
        let history = cooker.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].temperature, Some(62.0));
    }

    #[test]
    fn set_state_round_trips_tunables() {
        let f = fixture(vec![]);
        f.cooker.pid(sample(77.0)).unwrap();
        let mut wanted = f.cooker.get_state();
        wanted.target = 131.0;
        wanted.proportional = 0.5;
        wanted.offset = 0.01;
        wanted.kp = 0.3;
        wanted.ki = 0.002;
        f.cooker.set_state(&wanted).unwrap();

        let got = f.cooker.get_state();
        assert_eq!(got.tunables(), wanted.tunables());
        // Assignment only: the heater setting is not recomputed.
        assert!((got.setting - 0.204).abs() < 1e-12);
    }

    #[test]
    fn set_state_rejects_non_finite_values() {
        let f = fixture(vec![]);
        let mut wanted = f.cooker.get_state();
        wanted.kp = f64::INFINITY;
        assert!(matches!(
            f.cooker.set_state(&wanted),
            Err(ControlError::InvalidStateValue { .. })
        ));
        assert_eq!(f.cooker.get_state().kp, 0.2);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut state = fixture(vec![]).cooker.get_state();
        assert!(matches!(
            state.set_field("temperature", 3.0),
            Err(ControlError::UnknownStateField { .. })
        ));
    }

    #[test]
    fn modify_state_reapplies_control() {
        let f = fixture(vec![]);
        f.cooker.pid(sample(77.0)).unwrap();
        let state = f
            .cooker
            .modify_state(|s| s.set_field("target", 90.0))
            .unwrap();
        assert_eq!(state.target, 90.0);
        assert_eq!(state.offset, 0.0);
        assert_eq!(state.setting, 1.0);
    }

    #[test]
    fn reapply_before_first_sample_keeps_heater_idle() {
        let f = fixture(vec![]);
        let state = f.cooker.reapply().unwrap();
        assert_eq!(state.temperature, None);
        assert_eq!(state.setting, 0.0);
        assert!(f.cooker.history().is_empty());
    }

    #[test]
    fn sampling_relays_tracker_readings() {
        let f = fixture(vec![70.0, 77.0]);
        f.cooker.start_heater().unwrap();
        f.cooker.start_sampling().unwrap();
        assert!(f.cooker.is_sampling());
        assert!(wait_for(|| f.cooker.get_state().temperature == Some(77.0)));
        assert!(wait_for(|| f.pins.level(RELAY) == Some(true)));

        f.cooker.stop_sampling();
        assert!(!f.cooker.is_sampling());
        assert_eq!(f.stops.load(Ordering::SeqCst), 1);
        assert_eq!(f.cooker.history().len(), 2);
    }

    #[test]
    fn start_sampling_is_idempotent_and_restartable() {
        let f = fixture(vec![75.0]);
        f.cooker.start_sampling().unwrap();
        f.cooker.start_sampling().unwrap();
        assert_eq!(f.starts.load(Ordering::SeqCst), 1);
        f.cooker.stop_sampling();
        f.cooker.stop_sampling();
        assert_eq!(f.stops.load(Ordering::SeqCst), 1);

        f.cooker.start_sampling().unwrap();
        assert_eq!(f.starts.load(Ordering::SeqCst), 2);
        f.cooker.stop_sampling();
    }

    #[test]
    fn close_releases_relay() {
        let f = fixture(vec![70.0]);
        f.cooker.start_heater().unwrap();
        f.cooker.start_sampling().unwrap();
        assert!(wait_for(|| f.pins.level(RELAY) == Some(true)));
        f.cooker.close();
        assert!(!f.cooker.heater_running());
        assert!(!f.pins.is_exported(RELAY));
    }

    #[test]
    fn state_serializes_as_flat_mapping() {
        let f = fixture(vec![]);
        let value = serde_json::to_value(f.cooker.get_state()).unwrap();
        let map = value.as_object().unwrap();
        for tag in tags::STATE {
            assert!(map.contains_key(tag.key), "missing {}", tag.key);
        }
        assert!(map["temperature"].is_null());
        assert_eq!(map["target"], 78.0);
    }

    #[test]
    fn display_renders_state() {
        let f = fixture(vec![]);
        let text = f.cooker.pid(sample(77.0)).unwrap().to_string();
        assert!(text.starts_with("Cooker: ("));
        assert!(text.contains("target:   78.00"));
        assert!(text.contains("20.40%"));
    }
}
