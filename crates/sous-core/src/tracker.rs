use crate::error::ControlResult;
use crate::timebase;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

/// A timestamped temperature reading in °F.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: SystemTime,
    pub temperature: f64,
}

impl Sample {
    pub fn new(time: SystemTime, temperature: f64) -> Self {
        Self { time, temperature }
    }

    pub fn now(temperature: f64) -> Self {
        Self::new(SystemTime::now(), temperature)
    }

    pub fn unix_seconds(&self) -> f64 {
        timebase::unix_seconds(self.time)
    }
}

/// Items on the sample channel. `Shutdown` tells the consumer to stop reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleMessage {
    Sample(Sample),
    Shutdown,
}

/// Producer of temperature samples. `start` begins feeding `sink`; `stop` halts the
/// producer and may be followed by another `start`.
pub trait TemperatureTracker: Send {
    fn start(&mut self, sink: Sender<SampleMessage>) -> ControlResult<()>;
    fn stop(&mut self);
}
