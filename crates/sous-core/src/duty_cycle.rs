use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// High/low durations of a repeating pin pattern, in seconds.
///
/// A negative `hi_time` latches the pin low, a zero `hi_time` latches it high,
/// and a positive `hi_time` oscillates `hi_time` high then `low_time` low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DutyCycleSpec {
    pub hi_time: f64,
    pub low_time: f64,
}

/// How the cycle engine drives the pin for a given spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    OffLatch,
    OnLatch,
    Oscillate { high: Duration, low: Duration },
}

impl DutyCycleSpec {
    pub const OFF: Self = Self {
        hi_time: -1.0,
        low_time: 0.0,
    };

    pub const ON: Self = Self {
        hi_time: 0.0,
        low_time: 0.0,
    };

    pub fn new(hi_time: f64, low_time: f64) -> ControlResult<Self> {
        let spec = Self { hi_time, low_time };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> ControlResult<()> {
        let invalid = ControlError::InvalidDutyCycle {
            hi_time: self.hi_time,
            low_time: self.low_time,
        };
        if !self.hi_time.is_finite() {
            return Err(invalid);
        }
        if self.hi_time > 0.0 {
            if self.low_time.is_nan() || self.low_time <= 0.0 {
                return Err(invalid);
            }
            if Duration::try_from_secs_f64(self.hi_time).is_err()
                || Duration::try_from_secs_f64(self.low_time).is_err()
            {
                return Err(invalid);
            }
        }
        Ok(())
    }

    pub fn is_oscillating(&self) -> bool {
        self.hi_time > 0.0
    }

    pub fn mode(&self) -> Mode {
        if self.hi_time < 0.0 {
            Mode::OffLatch
        } else if self.hi_time == 0.0 {
            Mode::OnLatch
        } else {
            Mode::Oscillate {
                high: self.high_duration(),
                low: self.low_duration(),
            }
        }
    }

    pub fn high_duration(&self) -> Duration {
        seconds(self.hi_time)
    }

    pub fn low_duration(&self) -> Duration {
        seconds(self.low_time)
    }

    /// Fraction of each period spent high.
    pub fn duty(&self) -> f64 {
        match self.mode() {
            Mode::OffLatch => 0.0,
            Mode::OnLatch => 1.0,
            Mode::Oscillate { .. } => self.hi_time / (self.hi_time + self.low_time),
        }
    }
}

impl Default for DutyCycleSpec {
    fn default() -> Self {
        Self::OFF
    }
}

fn seconds(value: f64) -> Duration {
    if value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}
