use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{OutputId, OutputState};

/// A cue as it was actually applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FiredCue {
    /// Position in the cue table.
    pub index: usize,
    pub scheduled: Duration,
    pub output: OutputId,
    pub state: OutputState,
    /// Elapsed time since run start when the output was switched.
    pub actual: Duration,
}

impl FiredCue {
    pub fn lateness(&self) -> Duration {
        self.actual.saturating_sub(self.scheduled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    Completed,
    Cancelled,
    Faulted,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}

/// Everything observable about a run, in the order it happened.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    CycleStarted { cues: usize, span: Duration },
    OutputsReset,
    OutputsHeld { state: OutputState },
    AudioStarted { track: PathBuf },
    AudioStartFailed { track: PathBuf, reason: String },
    CueFired(FiredCue),
    Fault { output: OutputId, reason: String },
    CuesFinished { outcome: OutcomeKind, fired: usize, total: usize },
    AudioFinished,
    AudioTerminated,
    AudioError { reason: String },
    CleanupComplete,
}

/// Receives progress from the engine and supervisor. Formatting is the
/// sink's business.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        // a dropped receiver just means nobody is watching
        let _ = self.send(event);
    }
}

/// Writes progress to the log, one line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::CycleStarted { cues, span } => {
                log::info!(
                    "Starting light sync: {} cues over {:.2}s",
                    cues,
                    span.as_secs_f64()
                );
            }
            ProgressEvent::OutputsReset => log::debug!("All outputs OFF"),
            ProgressEvent::OutputsHeld { state } => log::info!("Turning everything {}", state),
            ProgressEvent::AudioStarted { track } => {
                log::info!("Audio started: {}", track.display());
            }
            ProgressEvent::AudioStartFailed { track, reason } => {
                log::warn!(
                    "Audio failed to start ({}): {}; running lights without it",
                    track.display(),
                    reason
                );
            }
            ProgressEvent::CueFired(fired) => {
                log::info!(
                    "{:6.2}s | {} -> {}",
                    fired.scheduled.as_secs_f64(),
                    fired.output,
                    fired.state
                );
                log::debug!(
                    "cue {} fired {:.3}ms late",
                    fired.index,
                    fired.lateness().as_secs_f64() * 1000.0
                );
            }
            ProgressEvent::Fault { output, reason } => {
                log::error!("Output fault on {}: {}", output, reason);
            }
            ProgressEvent::CuesFinished {
                outcome,
                fired,
                total,
            } => match outcome {
                OutcomeKind::Completed => log::info!("All cues completed"),
                OutcomeKind::Cancelled => {
                    log::warn!("Cue run cancelled after {}/{} cues", fired, total)
                }
                OutcomeKind::Faulted => {
                    log::error!("Cue run aborted after {}/{} cues", fired, total)
                }
            },
            ProgressEvent::AudioFinished => log::info!("Audio finished."),
            ProgressEvent::AudioTerminated => log::info!("Audio stopped."),
            ProgressEvent::AudioError { reason } => log::error!("Audio error: {}", reason),
            ProgressEvent::CleanupComplete => log::info!("Outputs de-energized and released"),
        }
    }
}
