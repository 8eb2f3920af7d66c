//! Error types for the pin handle and the control stack.

use thiserror::Error;

/// Result type for engine, heater and cooker operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Failures of an OS-level pin handle.
#[derive(Debug, Error)]
pub enum PinError {
    /// The pin is already exported, or claimed by the device tree.
    #[error("pin {pin} is already exported or in use")]
    Busy { pin: u32 },

    #[error("pin {pin}: {op} failed: {source}")]
    Io {
        pin: u32,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("pin {pin}: cannot drive a pin configured as input")]
    WrongDirection { pin: u32 },

    #[error("pin {pin}: impossible value {value:?} read back")]
    InvalidValue { pin: u32, value: Vec<u8> },
}

impl PinError {
    pub fn pin(&self) -> u32 {
        match self {
            Self::Busy { pin }
            | Self::Io { pin, .. }
            | Self::WrongDirection { pin }
            | Self::InvalidValue { pin, .. } => *pin,
        }
    }
}

/// Errors surfaced synchronously by the cycle engine, heater and cooker.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("pin {pin} is busy; refusing to start")]
    PinBusy { pin: u32 },

    #[error(transparent)]
    Pin(PinError),

    #[error("invalid duty cycle: hi_time={hi_time}s requires a positive low_time, got {low_time}s")]
    InvalidDutyCycle { hi_time: f64, low_time: f64 },

    #[error("cycle engine worker exited unexpectedly")]
    WorkerExited,

    #[error("failed to spawn {what} worker: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("heater power must be between 0 and 1, got {fraction}")]
    InvalidPowerFraction { fraction: f64 },

    #[error("heater cycle time must be positive, got {seconds}s")]
    InvalidCycleTime { seconds: f64 },

    #[error("minimum switch duration must be positive, got {seconds}s")]
    InvalidMinimumDuration { seconds: f64 },

    #[error("rejected temperature sample {temperature}")]
    InvalidSample { temperature: f64 },

    #[error("unknown state field {key:?}")]
    UnknownStateField { key: String },

    #[error("state field {key:?} must be a finite number, got {value:?}")]
    InvalidStateValue { key: String, value: String },

    #[error("temperature tracker failed: {0}")]
    Tracker(String),
}

impl From<PinError> for ControlError {
    fn from(err: PinError) -> Self {
        match err {
            PinError::Busy { pin } => ControlError::PinBusy { pin },
            other => ControlError::Pin(other),
        }
    }
}
