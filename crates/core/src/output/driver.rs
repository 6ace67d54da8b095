use std::io;

use thiserror::Error;

use crate::OutputId;

/// Failures raised by an output driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0} is not an initialized output")]
    UnknownOutput(OutputId),

    #[error("I/O error on {output}: {source}")]
    Io {
        output: OutputId,
        #[source]
        source: io::Error,
    },

    #[error("{output} failed: {reason}")]
    Hardware { output: OutputId, reason: String },
}

impl DriverError {
    /// The output the failure happened on.
    pub fn output(&self) -> OutputId {
        match self {
            DriverError::UnknownOutput(output)
            | DriverError::Io { output, .. }
            | DriverError::Hardware { output, .. } => *output,
        }
    }
}

/// Electrical level of a pin, independent of relay polarity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
    /// Pin handed back as an input; the relay board falls to its own default.
    Released,
}

impl PinLevel {
    /// Level that energizes (or de-energizes) a relay on a board with the given polarity.
    pub fn for_state(energized: bool, active_low: bool) -> Self {
        if energized != active_low {
            PinLevel::High
        } else {
            PinLevel::Low
        }
    }
}

/// Owns the physical (or simulated) state of the controlled outputs.
pub trait OutputDriver {
    /// Claim `outputs` and drive each to its de-energized level.
    fn initialize(&mut self, outputs: &[OutputId], active_low: bool) -> Result<(), DriverError>;

    /// Outputs claimed by the last `initialize`.
    fn outputs(&self) -> &[OutputId];

    fn set(&mut self, output: OutputId, energized: bool) -> Result<(), DriverError>;

    /// Return every output to an uncontrolled, high-impedance state.
    ///
    /// Must be idempotent.
    fn release_all(&mut self) -> Result<(), DriverError>;

    /// De-energize every initialized output, attempting all of them even if
    /// one fails. Returns the first failure.
    fn de_energize_all(&mut self) -> Result<(), DriverError> {
        self.set_all(false)
    }

    fn set_all(&mut self, energized: bool) -> Result<(), DriverError> {
        let outputs = self.outputs().to_vec();
        let mut first_error = None;
        for output in outputs {
            if let Err(e) = self.set(output, energized) {
                log::error!("Failed to switch {} during bulk update: {}", output, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<D: OutputDriver + ?Sized> OutputDriver for Box<D> {
    fn initialize(&mut self, outputs: &[OutputId], active_low: bool) -> Result<(), DriverError> {
        (**self).initialize(outputs, active_low)
    }

    fn outputs(&self) -> &[OutputId] {
        (**self).outputs()
    }

    fn set(&mut self, output: OutputId, energized: bool) -> Result<(), DriverError> {
        (**self).set(output, energized)
    }

    fn release_all(&mut self) -> Result<(), DriverError> {
        (**self).release_all()
    }

    fn de_energize_all(&mut self) -> Result<(), DriverError> {
        (**self).de_energize_all()
    }

    fn set_all(&mut self, energized: bool) -> Result<(), DriverError> {
        (**self).set_all(energized)
    }
}
