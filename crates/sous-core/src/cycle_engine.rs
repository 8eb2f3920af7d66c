//! Software time-slicing of one output pin.
//!
//! A [`CycleEngine`] owns a pin provider and, while started, a single worker thread
//! that owns the pin handle. Duty-cycle updates reach the worker only through an
//! ordered channel; the worker keeps the elapsed time of the current phase across
//! updates, so a live change never restarts or drops a phase timer.

use crate::duty_cycle::{DutyCycleSpec, Mode};
use crate::error::{ControlError, ControlResult};
use crate::hal::{Direction, PinHandle, PinProvider};
use log::{debug, info, trace, warn};
use std::mem;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Messages consumed by the engine worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    Apply(DutyCycleSpec),
    Shutdown,
}

/// Snapshot published by the worker for observers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStatus {
    pub active_spec: DutyCycleSpec,
    /// Last level written to the pin; `None` while no pin is held.
    pub level: Option<bool>,
    pub transitions: u64,
    pub specs_applied: u64,
    pub write_failures: u64,
}

enum WorkerSlot {
    Idle(Receiver<EngineCommand>),
    Running(JoinHandle<Receiver<EngineCommand>>),
    Vacant,
}

pub struct CycleEngine<P: PinProvider> {
    provider: P,
    pin: u32,
    commands: Sender<EngineCommand>,
    worker: WorkerSlot,
    status: Arc<Mutex<EngineStatus>>,
}

impl<P: PinProvider> CycleEngine<P> {
    pub fn new(provider: P, pin: u32) -> Self {
        let (commands, receiver) = mpsc::channel();
        Self {
            provider,
            pin,
            commands,
            worker: WorkerSlot::Idle(receiver),
            status: Arc::new(Mutex::new(EngineStatus::default())),
        }
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_running(&self) -> bool {
        matches!(self.worker, WorkerSlot::Running(_))
    }

    /// Acquire the pin and spawn the worker. A busy pin fails here, before any
    /// worker exists. Calling `start` on a running engine does nothing.
    pub fn start(&mut self) -> ControlResult<()> {
        if self.is_running() {
            debug!("cycle engine on pin {} already running", self.pin);
            return Ok(());
        }

        let handle = self.provider.acquire(self.pin, Direction::Out)?;
        let receiver = self.take_receiver();
        let status = Arc::clone(&self.status);
        let spawned = thread::Builder::new()
            .name(format!("cycle-engine-{}", self.pin))
            .spawn(move || run_worker(handle, receiver, status));

        match spawned {
            Ok(join) => {
                self.worker = WorkerSlot::Running(join);
                info!("cycle engine started on pin {}", self.pin);
                Ok(())
            }
            Err(source) => {
                self.reset_channel();
                Err(ControlError::Spawn {
                    what: "cycle engine",
                    source,
                })
            }
        }
    }

    /// Queue a new duty cycle. Returns as soon as the spec is enqueued; the worker
    /// applies it in order. Invalid specs are rejected without touching the queue.
    pub fn update(&self, spec: DutyCycleSpec) -> ControlResult<()> {
        spec.validate()?;
        self.commands
            .send(EngineCommand::Apply(spec))
            .map_err(|_| ControlError::WorkerExited)
    }

    /// Ask the worker to exit and wait until it has released the pin.
    pub fn stop(&mut self) {
        match mem::replace(&mut self.worker, WorkerSlot::Vacant) {
            WorkerSlot::Running(join) => {
                let _ = self.commands.send(EngineCommand::Shutdown);
                match join.join() {
                    Ok(receiver) => self.worker = WorkerSlot::Idle(receiver),
                    Err(_) => {
                        warn!("cycle engine worker on pin {} panicked", self.pin);
                        self.reset_channel();
                    }
                }
                info!("cycle engine stopped on pin {}", self.pin);
            }
            WorkerSlot::Vacant => self.reset_channel(),
            idle => self.worker = idle,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The spec the worker is currently executing.
    pub fn active_spec(&self) -> DutyCycleSpec {
        self.status().active_spec
    }

    fn take_receiver(&mut self) -> Receiver<EngineCommand> {
        match mem::replace(&mut self.worker, WorkerSlot::Vacant) {
            WorkerSlot::Idle(receiver) => receiver,
            _ => {
                let (commands, receiver) = mpsc::channel();
                self.commands = commands;
                receiver
            }
        }
    }

    fn reset_channel(&mut self) {
        let (commands, receiver) = mpsc::channel();
        self.commands = commands;
        self.worker = WorkerSlot::Idle(receiver);
    }
}

impl<P: PinProvider> Drop for CycleEngine<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    High,
    Low,
}

enum Hold {
    /// Phase satisfied; the next phase is timed from this instant.
    Done(Instant),
    Shutdown,
}

struct Worker<H: PinHandle> {
    pin: H,
    spec: DutyCycleSpec,
    status: Arc<Mutex<EngineStatus>>,
}

fn run_worker<H: PinHandle>(
    pin: H,
    commands: Receiver<EngineCommand>,
    status: Arc<Mutex<EngineStatus>>,
) -> Receiver<EngineCommand> {
    let mut worker = Worker {
        pin,
        spec: DutyCycleSpec::OFF,
        status,
    };
    worker.publish(|status| {
        status.active_spec = DutyCycleSpec::OFF;
        status.level = None;
    });
    worker.run(&commands);
    commands
}

impl<H: PinHandle> Worker<H> {
    fn run(&mut self, commands: &Receiver<EngineCommand>) {
        let mut phase_start = Instant::now();
        loop {
            match self.spec.mode() {
                Mode::OffLatch | Mode::OnLatch => {
                    self.drive(self.spec.mode() == Mode::OnLatch);
                    match commands.recv() {
                        Ok(EngineCommand::Apply(spec)) => self.apply(spec),
                        Ok(EngineCommand::Shutdown) | Err(_) => return,
                    }
                    phase_start = Instant::now();
                }
                Mode::Oscillate { .. } => {
                    self.drive(true);
                    match self.hold(commands, phase_start, Phase::High) {
                        Hold::Done(next) => phase_start = next,
                        Hold::Shutdown => return,
                    }
                    if !self.spec.is_oscillating() {
                        continue;
                    }

                    self.drive(false);
                    match self.hold(commands, phase_start, Phase::Low) {
                        Hold::Done(next) => phase_start = next,
                        Hold::Shutdown => return,
                    }
                }
            }
        }
    }

    /// Keep the current level until the phase duration of the active spec has
    /// elapsed since `phase_start`, applying updates as they arrive.
    fn hold(&mut self, commands: &Receiver<EngineCommand>, phase_start: Instant, phase: Phase) -> Hold {
        loop {
            let target = self.phase_duration(phase);
            let remaining = target.saturating_sub(phase_start.elapsed());
            match commands.recv_timeout(remaining) {
                Ok(EngineCommand::Apply(spec)) => {
                    self.apply(spec);
                    // A latch request ends the phase at once.
                    if !self.spec.is_oscillating() {
                        return Hold::Done(Instant::now());
                    }
                    let now = Instant::now();
                    if self.phase_duration(phase) <= now.duration_since(phase_start) {
                        return Hold::Done(now);
                    }
                }
                Ok(EngineCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    return Hold::Shutdown;
                }
                Err(RecvTimeoutError::Timeout) => {
                    let deadline = phase_start + target;
                    // Resync after a stall longer than the phase itself instead of
                    // racing through the backlog.
                    if deadline.elapsed() > target {
                        return Hold::Done(Instant::now());
                    }
                    return Hold::Done(deadline);
                }
            }
        }
    }

    fn phase_duration(&self, phase: Phase) -> Duration {
        match phase {
            Phase::High => self.spec.high_duration(),
            Phase::Low => self.spec.low_duration(),
        }
    }

    fn apply(&mut self, spec: DutyCycleSpec) {
        trace!(
            "pin {}: applying hi_time={} low_time={}",
            self.pin.pin(),
            spec.hi_time,
            spec.low_time
        );
        self.spec = spec;
        self.publish(|status| {
            status.active_spec = spec;
            status.specs_applied += 1;
        });
    }

    fn drive(&mut self, high: bool) {
        match self.pin.set(high) {
            Ok(()) => self.publish(|status| {
                if status.level != Some(high) {
                    status.transitions += 1;
                }
                status.level = Some(high);
            }),
            Err(err) => {
                warn!("pin {}: failed to drive {}: {}", self.pin.pin(), high, err);
                self.publish(|status| status.write_failures += 1);
            }
        }
    }

    fn publish(&self, update: impl FnOnce(&mut EngineStatus)) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut status);
    }
}

impl<H: PinHandle> Drop for Worker<H> {
    fn drop(&mut self) {
        self.publish(|status| status.level = None);
        trace!("pin {}: worker exiting, releasing pin", self.pin.pin());
    }
}
