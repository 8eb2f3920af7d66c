pub mod controller;
pub mod cycle_engine;
pub mod duty_cycle;
pub mod error;
pub mod hal;
#[cfg(feature = "simulation")]
pub mod hal_sim;
pub mod heater;
mod heater_proptest;
pub mod tags;
pub mod timebase;
pub mod tracker;

pub use controller::{Cooker, CookerConfig, CookerState, PidTuning};
pub use cycle_engine::{CycleEngine, EngineCommand, EngineStatus};
pub use duty_cycle::{DutyCycleSpec, Mode};
pub use error::{ControlError, ControlResult, PinError};
pub use hal::{Direction, PinHandle, PinProvider};
#[cfg(feature = "simulation")]
pub use hal_sim::{BathConfig, BathModel, SimulatedBath, SimulatedPin, SimulatedPins};
pub use heater::{Heater, HeaterConfig};
pub use tracker::{Sample, SampleMessage, TemperatureTracker};
