use crate::error::PinError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// Exclusive handle to one exported pin. Dropping the handle releases the pin.
pub trait PinHandle: Send + 'static {
    fn pin(&self) -> u32;
    fn set(&mut self, high: bool) -> Result<(), PinError>;
    fn get(&mut self) -> Result<bool, PinError>;
}

/// Source of pin handles; acquisition fails with [`PinError::Busy`] when the pin
/// is already exported elsewhere.
pub trait PinProvider: Send + 'static {
    type Handle: PinHandle;

    fn acquire(&self, pin: u32, direction: Direction) -> Result<Self::Handle, PinError>;
}
