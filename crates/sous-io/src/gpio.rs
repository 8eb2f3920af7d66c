//! Linux sysfs GPIO pin handles.
//!
//! A pin is exported by writing its number to `<root>/export`, configured through
//! `<root>/gpio<N>/direction` and driven through `<root>/gpio<N>/value`. The handle
//! unexports the pin when dropped, including when acquisition fails halfway.

use sous_core::{Direction, PinError, PinHandle, PinProvider};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// `EBUSY`: the pin is already exported or claimed by the device tree.
const EBUSY: i32 = 16;

#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
    /// Wait after export before touching the pin files; udev needs a moment to
    /// fix their permissions.
    settle: Duration,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settle: Duration::from_millis(200),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new(SYSFS_GPIO_ROOT)
    }
}

impl PinProvider for SysfsGpio {
    type Handle = SysfsPin;

    fn acquire(&self, pin: u32, direction: Direction) -> Result<SysfsPin, PinError> {
        write_control(&self.root.join("export"), pin).map_err(|err| export_error(pin, err))?;
        let export = Export {
            root: self.root.clone(),
            pin,
        };
        debug!(pin, "gpio exported");

        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }

        let pin_dir = self.root.join(format!("gpio{pin}"));
        std::fs::write(pin_dir.join("direction"), direction.as_str()).map_err(|source| {
            PinError::Io {
                pin,
                op: "set direction",
                source,
            }
        })?;

        let value = OpenOptions::new()
            .read(true)
            .write(direction == Direction::Out)
            .open(pin_dir.join("value"))
            .map_err(|source| PinError::Io {
                pin,
                op: "open value",
                source,
            })?;

        Ok(SysfsPin {
            value,
            direction,
            export,
        })
    }
}

fn write_control(path: &Path, pin: u32) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(pin.to_string().as_bytes())
}

fn export_error(pin: u32, err: io::Error) -> PinError {
    if err.raw_os_error() == Some(EBUSY) {
        PinError::Busy { pin }
    } else {
        PinError::Io {
            pin,
            op: "export",
            source: err,
        }
    }
}

/// Unexports the pin on drop.
#[derive(Debug)]
struct Export {
    root: PathBuf,
    pin: u32,
}

impl Drop for Export {
    fn drop(&mut self) {
        match write_control(&self.root.join("unexport"), self.pin) {
            Ok(()) => debug!(pin = self.pin, "gpio unexported"),
            Err(err) => warn!(pin = self.pin, error = %err, "failed to unexport gpio"),
        }
    }
}

/// An exported sysfs pin. Fields drop in order: the value file closes before
/// the pin is unexported.
#[derive(Debug)]
pub struct SysfsPin {
    value: File,
    direction: Direction,
    export: Export,
}

impl SysfsPin {
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl PinHandle for SysfsPin {
    fn pin(&self) -> u32 {
        self.export.pin
    }

    fn set(&mut self, high: bool) -> Result<(), PinError> {
        let pin = self.pin();
        if self.direction != Direction::Out {
            return Err(PinError::WrongDirection { pin });
        }
        self.value
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value.write_all(if high { b"1" } else { b"0" }))
            .map_err(|source| PinError::Io {
                pin,
                op: "write value",
                source,
            })
    }

    fn get(&mut self) -> Result<bool, PinError> {
        let pin = self.pin();
        let mut byte = [0u8; 1];
        self.value
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value.read_exact(&mut byte))
            .map_err(|source| PinError::Io {
                pin,
                op: "read value",
                source,
            })?;
        match &byte {
            b"1" => Ok(true),
            b"0" => Ok(false),
            other => Err(PinError::InvalidValue {
                pin,
                value: other.to_vec(),
            }),
        }
    }
}
