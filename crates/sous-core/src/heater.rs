//! Heater power as time-proportional output on a relay pin.

use crate::cycle_engine::CycleEngine;
use crate::duty_cycle::DutyCycleSpec;
use crate::error::{ControlError, ControlResult};
use crate::hal::PinProvider;
use log::{debug, warn};
use std::time::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeaterConfig {
    /// Length of one on/off period, in seconds.
    pub cycle_time: f64,
    /// Shortest on or off stretch worth switching the relay for, in seconds.
    pub minimum_duration: f64,
    /// Last requested power fraction.
    pub setting: f64,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            cycle_time: 20.0,
            minimum_duration: 1.0,
            setting: 0.0,
        }
    }
}

impl HeaterConfig {
    pub fn validate(&self) -> ControlResult<()> {
        validate_cycle_time(self.cycle_time)?;
        if !is_duration(self.minimum_duration) {
            return Err(ControlError::InvalidMinimumDuration {
                seconds: self.minimum_duration,
            });
        }
        validate_fraction(self.setting)
    }

    /// Whether some fraction yields an oscillating spec. When the cycle is shorter
    /// than two minimum durations every fraction latches, and the on-latch check
    /// wins: `set(0.0)` keeps the relay on.
    pub fn can_cycle(&self) -> bool {
        self.cycle_time >= 2.0 * self.minimum_duration
    }

    fn warn_if_latching(&self) {
        if !self.can_cycle() {
            warn!(
                "cycle_time {}s is shorter than twice minimum_duration {}s; every setting latches",
                self.cycle_time, self.minimum_duration
            );
        }
    }

    /// Duty cycle for `fraction` of full power. Stretches shorter than
    /// `minimum_duration` collapse into a latch.
    pub fn spec_for(&self, fraction: f64) -> DutyCycleSpec {
        let time_on = self.cycle_time * fraction;
        let time_off = self.cycle_time - time_on;
        if time_off < self.minimum_duration {
            DutyCycleSpec::ON
        } else if time_on < self.minimum_duration {
            DutyCycleSpec::OFF
        } else {
            DutyCycleSpec {
                hi_time: time_on,
                low_time: time_off,
            }
        }
    }
}

fn validate_fraction(fraction: f64) -> ControlResult<()> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(ControlError::InvalidPowerFraction { fraction })
    }
}

/// Positive and representable as a [`Duration`].
fn is_duration(seconds: f64) -> bool {
    seconds > 0.0 && Duration::try_from_secs_f64(seconds).is_ok()
}

fn validate_cycle_time(seconds: f64) -> ControlResult<()> {
    if is_duration(seconds) {
        Ok(())
    } else {
        Err(ControlError::InvalidCycleTime { seconds })
    }
}

pub struct Heater<P: PinProvider> {
    engine: CycleEngine<P>,
    config: HeaterConfig,
}

impl<P: PinProvider> Heater<P> {
    pub fn new(engine: CycleEngine<P>, config: HeaterConfig) -> ControlResult<Self> {
        config.validate()?;
        config.warn_if_latching();
        Ok(Self { engine, config })
    }

    pub fn start(&mut self) -> ControlResult<()> {
        self.engine.start()
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Set heater power to `fraction` of full power, in `[0, 1]`.
    pub fn set(&mut self, fraction: f64) -> ControlResult<DutyCycleSpec> {
        validate_fraction(fraction)?;
        let spec = self.config.spec_for(fraction);
        self.engine.update(spec)?;
        self.config.setting = fraction;
        debug!(
            "heater set to {:.4}: hi_time={:.3} low_time={:.3} duty={:.3}",
            fraction,
            spec.hi_time,
            spec.low_time,
            spec.duty()
        );
        Ok(spec)
    }

    /// Change the period used by subsequent [`Heater::set`] calls.
    pub fn set_cycle_time(&mut self, seconds: f64) -> ControlResult<()> {
        validate_cycle_time(seconds)?;
        self.config.cycle_time = seconds;
        self.config.warn_if_latching();
        Ok(())
    }

    pub fn setting(&self) -> f64 {
        self.config.setting
    }

    pub fn config(&self) -> &HeaterConfig {
        &self.config
    }

    pub fn engine(&self) -> &CycleEngine<P> {
        &self.engine
    }
}
