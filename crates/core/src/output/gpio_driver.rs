//! Relay outputs on Linux GPIO through the sysfs interface.
//!
//! Each pin is exported under `<root>/gpio<N>`, configured as an output with
//! its de-energized level applied atomically (`direction = high|low`), and
//! switched by writing `value`. Releasing turns the pin back into an input
//! and unexports it, so a fail-open relay board drops to its own default.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::driver::{DriverError, OutputDriver, PinLevel};
use crate::OutputId;

pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// udev may need a moment to fix permissions on a freshly exported pin
const EXPORT_TIMEOUT: Duration = Duration::from_millis(500);
const EXPORT_POLL: Duration = Duration::from_millis(10);

pub struct GpioDriver {
    root: PathBuf,
    outputs: Vec<OutputId>,
    exported: Vec<OutputId>,
    active_low: bool,
}

impl GpioDriver {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            outputs: Vec::new(),
            exported: Vec::new(),
            active_low: false,
        }
    }

    fn pin_dir(&self, output: OutputId) -> PathBuf {
        self.root.join(format!("gpio{}", output.0))
    }

    fn write_attr(path: &Path, value: &str, output: OutputId) -> Result<(), DriverError> {
        fs::write(path, value).map_err(|source| DriverError::Io { output, source })
    }

    fn export(&self, output: OutputId) -> Result<(), DriverError> {
        let pin_dir = self.pin_dir(output);
        if !pin_dir.exists() {
            log::debug!("Exporting {}", output);
            Self::write_attr(&self.root.join("export"), &output.0.to_string(), output)?;
        }

        let direction = pin_dir.join("direction");
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).open(&direction) {
                Ok(_) => return Ok(()),
                Err(e) if started.elapsed() < EXPORT_TIMEOUT => {
                    log::trace!("Waiting for {} to appear: {}", direction.display(), e);
                    thread::sleep(EXPORT_POLL);
                }
                Err(source) => return Err(DriverError::Io { output, source }),
            }
        }
    }
}

impl OutputDriver for GpioDriver {
    fn initialize(&mut self, outputs: &[OutputId], active_low: bool) -> Result<(), DriverError> {
        self.active_low = active_low;
        self.outputs = outputs.to_vec();

        let initial = match PinLevel::for_state(false, active_low) {
            PinLevel::High => "high",
            _ => "low",
        };

        for &output in outputs {
            self.export(output)?;
            if !self.exported.contains(&output) {
                self.exported.push(output);
            }
            Self::write_attr(&self.pin_dir(output).join("direction"), initial, output)?;
        }

        log::info!(
            "GPIO relay board ready on {} with {} outputs (active_low={})",
            self.root.display(),
            outputs.len(),
            active_low
        );
        Ok(())
    }

    fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    fn set(&mut self, output: OutputId, energized: bool) -> Result<(), DriverError> {
        if !self.exported.contains(&output) {
            return Err(DriverError::UnknownOutput(output));
        }
        let value = match PinLevel::for_state(energized, self.active_low) {
            PinLevel::High => "1",
            _ => "0",
        };
        Self::write_attr(&self.pin_dir(output).join("value"), value, output)
    }

    fn release_all(&mut self) -> Result<(), DriverError> {
        let mut first_error = None;
        for output in std::mem::take(&mut self.exported) {
            let released = Self::write_attr(&self.pin_dir(output).join("direction"), "in", output)
                .and_then(|_| {
                    Self::write_attr(&self.root.join("unexport"), &output.0.to_string(), output)
                });
            if let Err(e) = released {
                log::error!("Failed to release {}: {}", output, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
