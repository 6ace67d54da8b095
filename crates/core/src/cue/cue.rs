use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single controllable channel. On the relay board this is the BCM GPIO number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(pub u32);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO {}", self.0)
    }
}

impl From<u32> for OutputId {
    fn from(pin: u32) -> Self {
        OutputId(pin)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputState {
    Energized,
    DeEnergized,
}

impl OutputState {
    pub fn is_energized(&self) -> bool {
        matches!(self, Self::Energized)
    }
}

impl From<bool> for OutputState {
    fn from(energized: bool) -> Self {
        if energized {
            Self::Energized
        } else {
            Self::DeEnergized
        }
    }
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Energized => write!(f, "ON"),
            Self::DeEnergized => write!(f, "OFF"),
        }
    }
}

/// Unvalidated cue as it comes out of a show file: seconds from start, output, state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawCue {
    pub offset_secs: f64,
    pub output: OutputId,
    pub state: OutputState,
}

impl RawCue {
    pub fn new(offset_secs: f64, output: impl Into<OutputId>, state: impl Into<OutputState>) -> Self {
        Self {
            offset_secs,
            output: output.into(),
            state: state.into(),
        }
    }
}

impl From<(f64, u32, bool)> for RawCue {
    fn from((offset_secs, pin, on): (f64, u32, bool)) -> Self {
        RawCue::new(offset_secs, pin, on)
    }
}

/// One scheduled transition, relative to the start of a run.
///
/// Cues are independent: an `Energized` cue is not paired with the next
/// `DeEnergized` cue for the same output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cue {
    pub offset: Duration,
    pub output: OutputId,
    pub state: OutputState,
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:6.2}s | {} -> {}",
            self.offset.as_secs_f64(),
            self.output,
            self.state
        )
    }
}
